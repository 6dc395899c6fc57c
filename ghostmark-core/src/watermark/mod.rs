//! Near-invisible text watermarks
//!
//! Embedding draws the obfuscated text in Helvetica, filled with a color one or two steps
//! off white, at a top-left and a bottom-left anchor on each page. Extraction rasterizes the
//! input, keeps only pixels within a narrow tolerance box around that color and hands the
//! result to OCR. Readings from all frames are reconciled into one string.

pub mod mask;
pub mod reconcile;

pub use reconcile::{WatermarkReading, NOT_FOUND};

use crate::config::{ExtractionConfig, GhostmarkConfig, WatermarkConfig};
use crate::error::{GhostmarkError, Result};
use crate::ocr::{OcrOptions, OcrProvider};
use crate::pdf::{PageGeometry, PageOverlay, PdfDocument};
use crate::render::{self, InputKind, PageRenderer};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

/// Replace `@` and `.` so viewers do not turn the mark into a link
pub fn obfuscate(text: &str) -> String {
    text.replace('@', "AT").replace('.', "DOT")
}

/// Inverse of [`obfuscate`]. `DOT` is restored before `AT`.
pub fn deobfuscate(text: &str) -> String {
    text.replace("DOT", ".").replace("AT", "@")
}

pub struct WatermarkEngine {
    watermark: WatermarkConfig,
    extraction: ExtractionConfig,
}

impl WatermarkEngine {
    pub fn new(config: &GhostmarkConfig) -> Self {
        Self {
            watermark: config.watermark.clone(),
            extraction: config.extraction.clone(),
        }
    }

    /// Baseline anchors on a page: top-left first, then bottom-left
    pub fn anchors(&self, page: &PageGeometry) -> [(f32, f32); 2] {
        let x = page.origin_x + self.watermark.inset_x;
        [
            (x, page.top() - self.watermark.top_offset),
            (x, page.origin_y + self.watermark.bottom_offset),
        ]
    }

    /// Stamp `text` on every page, optionally leaving the first page clean.
    /// Returns the number of marked pages.
    pub fn embed(&self, document: &mut PdfDocument, text: &str, skip_first_page: bool) -> Result<usize> {
        if text.trim().is_empty() {
            return Err(GhostmarkError::InvalidParameters(
                "watermark text must not be empty".to_string(),
            ));
        }
        let mark = obfuscate(text);
        let marked = document.apply(|page| {
            if skip_first_page && page.is_first() {
                return None;
            }
            let mut overlay = PageOverlay::new();
            for (x, y) in self.anchors(page) {
                overlay.text(&mark, x, y, self.watermark.font_size, self.watermark.color);
            }
            Some(overlay)
        })?;
        info!(pages = marked, skip_first_page, "embedded watermark");
        Ok(marked)
    }

    /// Recover a watermark from PDF, PNG or JPEG bytes, detected by magic number
    pub fn extract(
        &self,
        bytes: &[u8],
        renderer: &dyn PageRenderer,
        ocr: &dyn OcrProvider,
    ) -> Result<WatermarkReading> {
        let frames = render::frames_from_bytes(bytes, renderer, self.extraction.dpi)?;
        self.read_frames(&frames, ocr)
    }

    /// Recover a watermark from a file, choosing the decoder by extension
    pub fn extract_path(
        &self,
        path: &Path,
        renderer: &dyn PageRenderer,
        ocr: &dyn OcrProvider,
    ) -> Result<WatermarkReading> {
        let kind = InputKind::from_path(path).ok_or_else(|| {
            GhostmarkError::UnsupportedFormat(format!(
                "{}: use PDF, PNG or JPG",
                path.display()
            ))
        })?;
        let bytes = std::fs::read(path)?;
        let frames = render::frames_for(&bytes, kind, renderer, self.extraction.dpi)?;
        self.read_frames(&frames, ocr)
    }

    /// Isolate, OCR and reconcile a set of frames
    pub fn read_frames(&self, frames: &[DynamicImage], ocr: &dyn OcrProvider) -> Result<WatermarkReading> {
        let options = OcrOptions {
            language: self.extraction.ocr_language.clone(),
            ..OcrOptions::default()
        };

        let mut candidates = Vec::new();
        for (index, frame) in frames.iter().enumerate() {
            let binary = mask::prepare_frame(frame, self.watermark.color, &self.extraction);
            let mut png = Vec::new();
            DynamicImage::ImageLuma8(binary).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

            match ocr.process_image(&png, &options) {
                Ok(result) => {
                    let candidate = reconcile::normalize(&result.text);
                    debug!(frame = index + 1, candidate = %candidate, "OCR reading");
                    if !candidate.is_empty() {
                        candidates.push(candidate);
                    }
                }
                Err(e) => warn!(frame = index + 1, "OCR failed, skipping frame: {e}"),
            }
        }

        let reading = match reconcile::choose(&candidates, self.extraction.min_frequent_len) {
            Some(chosen) => WatermarkReading::Found {
                text: deobfuscate(chosen),
                candidates,
            },
            None => WatermarkReading::NotFound { candidates },
        };
        info!(found = reading.is_found(), frames = frames.len(), "watermark extraction finished");
        Ok(reading)
    }
}
