//! Page rasterization
//!
//! Extraction needs pixels, and `lopdf` only knows objects. Pages are rasterized by an
//! external renderer behind the [`PageRenderer`] trait so tests can swap in canned frames.

use crate::error::{GhostmarkError, Result};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Turns a PDF byte stream into one raster frame per page
pub trait PageRenderer: Send + Sync {
    fn render(&self, pdf: &[u8], dpi: u32) -> Result<Vec<DynamicImage>>;
}

/// Renders pages with poppler's `pdftoppm`
#[derive(Debug, Clone)]
pub struct PdftoppmRenderer {
    binary: PathBuf,
}

impl PdftoppmRenderer {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("pdftoppm"),
        }
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for PdftoppmRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRenderer for PdftoppmRenderer {
    fn render(&self, pdf: &[u8], dpi: u32) -> Result<Vec<DynamicImage>> {
        if dpi == 0 {
            return Err(GhostmarkError::InvalidParameters(
                "DPI must be greater than zero".to_string(),
            ));
        }

        let workdir = tempfile::Builder::new()
            .prefix("ghostmark-render-")
            .tempdir()?;
        let input = workdir.path().join("input.pdf");
        std::fs::write(&input, pdf)?;
        let prefix = workdir.path().join("page");

        let output = Command::new(&self.binary)
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-png")
            .arg(&input)
            .arg(&prefix)
            .output()
            .map_err(|e| {
                GhostmarkError::RenderingFailure(format!(
                    "unable to run {}: {e}",
                    self.binary.display()
                ))
            })?;

        if !output.status.success() {
            return Err(GhostmarkError::RenderingFailure(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let frames = read_frames(workdir.path())?;
        if frames.is_empty() {
            return Err(GhostmarkError::RenderingFailure(
                "renderer produced no pages".to_string(),
            ));
        }
        debug!(pages = frames.len(), dpi, "rendered PDF pages");
        Ok(frames)
    }
}

/// What an extraction input turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Png,
    Jpeg,
}

impl InputKind {
    /// Detect by magic bytes
    pub fn sniff(bytes: &[u8]) -> Option<InputKind> {
        if bytes.starts_with(b"%PDF-") {
            Some(InputKind::Pdf)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(InputKind::Png)
        } else if bytes.starts_with(b"\xFF\xD8\xFF") {
            Some(InputKind::Jpeg)
        } else {
            None
        }
    }

    /// Detect by file extension, case-insensitively
    pub fn from_path(path: &Path) -> Option<InputKind> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(InputKind::Pdf),
            "png" => Some(InputKind::Png),
            "jpg" | "jpeg" => Some(InputKind::Jpeg),
            _ => None,
        }
    }
}

/// Frames to analyse for an input: every rendered page of a PDF, or the image itself
pub fn frames_for(
    bytes: &[u8],
    kind: InputKind,
    renderer: &dyn PageRenderer,
    dpi: u32,
) -> Result<Vec<DynamicImage>> {
    match kind {
        InputKind::Pdf => renderer.render(bytes, dpi),
        InputKind::Png => Ok(vec![image::load_from_memory_with_format(
            bytes,
            image::ImageFormat::Png,
        )?]),
        InputKind::Jpeg => Ok(vec![image::load_from_memory_with_format(
            bytes,
            image::ImageFormat::Jpeg,
        )?]),
    }
}

/// [`frames_for`] with the kind sniffed from the bytes
pub fn frames_from_bytes(
    bytes: &[u8],
    renderer: &dyn PageRenderer,
    dpi: u32,
) -> Result<Vec<DynamicImage>> {
    let kind = InputKind::sniff(bytes).ok_or_else(|| {
        GhostmarkError::UnsupportedFormat("expected a PDF, PNG or JPEG file".to_string())
    })?;
    frames_for(bytes, kind, renderer, dpi)
}

/// Load `page-*.png` files in page order. pdftoppm zero-pads page numbers to a common
/// width, so lexical order matches page order.
fn read_frames(dir: &Path) -> Result<Vec<DynamicImage>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension().is_some_and(|ext| ext == "png")
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("page"))
        })
        .collect();
    paths.sort();

    paths
        .iter()
        .map(|path| image::open(path).map_err(GhostmarkError::from))
        .collect()
}
