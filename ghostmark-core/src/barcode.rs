//! QR identity payloads
//!
//! An identity is framed by the substitution cipher, rendered as a QR code and stamped into
//! one corner of every page. Reading goes the other way: find a QR code in a raster frame,
//! then decode the cipher framing.

use crate::cipher::{CipherPayload, SubstitutionCipher};
use crate::config::{BarcodeConfig, Corner, GhostmarkConfig};
use crate::error::{GhostmarkError, Result};
use crate::pdf::{BoundingBox, PageGeometry, PageOverlay, PdfDocument};
use crate::render::{self, PageRenderer};
use image::{DynamicImage, GrayImage, Luma};
use qrcode::types::Color;
use qrcode::{EcLevel, QrCode};
use quircs::Quirc;
use tracing::{debug, info};

/// Longest identity accepted for a QR payload, the length limit of an email address
pub const MAX_IDENTITY_LEN: usize = 254;

/// Produces a 2D barcode raster for a payload
pub trait BarcodeGenerator: Send + Sync {
    fn render(&self, payload: &str, module_size: u32, border: u32) -> Result<GrayImage>;
}

/// Finds and decodes a 2D barcode in a still frame
pub trait BarcodeReader: Send + Sync {
    fn read(&self, frame: &DynamicImage) -> Option<String>;
}

/// QR codes at error correction level L
#[derive(Debug, Clone, Copy, Default)]
pub struct QrGenerator;

impl BarcodeGenerator for QrGenerator {
    fn render(&self, payload: &str, module_size: u32, border: u32) -> Result<GrayImage> {
        if module_size == 0 {
            return Err(GhostmarkError::InvalidParameters(
                "module size must be greater than zero".to_string(),
            ));
        }
        let qr = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::L)
            .map_err(|e| GhostmarkError::Barcode(format!("QR encode failed: {e}")))?;

        let width = qr.width() as u32;
        let size_px = (width + border * 2) * module_size;
        let mut image = GrayImage::from_pixel(size_px, size_px, Luma([255]));

        for y in 0..width {
            for x in 0..width {
                if qr[(x as usize, y as usize)] != Color::Dark {
                    continue;
                }
                let x0 = (x + border) * module_size;
                let y0 = (y + border) * module_size;
                for yy in 0..module_size {
                    for xx in 0..module_size {
                        image.put_pixel(x0 + xx, y0 + yy, Luma([0]));
                    }
                }
            }
        }
        Ok(image)
    }
}

/// QR detection through `quircs`
#[derive(Debug, Clone, Copy, Default)]
pub struct QuircReader;

impl BarcodeReader for QuircReader {
    fn read(&self, frame: &DynamicImage) -> Option<String> {
        let gray = frame.to_luma8();
        let mut decoder = Quirc::default();
        let codes = decoder.identify(gray.width() as usize, gray.height() as usize, gray.as_raw());

        for code in codes {
            let Ok(code) = code else { continue };
            let Ok(decoded) = code.decode() else { continue };
            match String::from_utf8(decoded.payload) {
                Ok(text) => return Some(text),
                Err(e) => debug!("skipping QR code with non UTF-8 payload: {e}"),
            }
        }
        None
    }
}

/// Lower-left corner of a `size` x `size` square placed in `corner` of the page
fn corner_origin(page: &PageGeometry, corner: Corner, size: f32, margin: f32) -> (f32, f32) {
    let left = page.origin_x + margin;
    let right = page.right() - margin - size;
    let bottom = page.origin_y + margin;
    let top = page.top() - margin - size;
    match corner {
        Corner::TopLeft => (left, top),
        Corner::TopRight => (right, top),
        Corner::BottomLeft => (left, bottom),
        Corner::BottomRight => (right, bottom),
    }
}

/// Square a barcode of edge `size` occupies in `corner` of the page
pub fn corner_rect(page: &PageGeometry, corner: Corner, size: f32, margin: f32) -> BoundingBox {
    let (x, y) = corner_origin(page, corner, size, margin);
    BoundingBox {
        x0: x,
        y0: y,
        x1: x + size,
        y1: y + size,
    }
}

/// Composite `image` at a fixed size into one corner of every page.
/// The image is stored once and shared by all pages.
pub fn place(
    document: &mut PdfDocument,
    image: &GrayImage,
    corner: Corner,
    size_pt: f32,
    margin_pt: f32,
) -> Result<usize> {
    if size_pt <= 0.0 {
        return Err(GhostmarkError::InvalidParameters(
            "barcode size must be positive".to_string(),
        ));
    }
    let handle = document.add_image(image)?;
    document.apply(|page| {
        let (x, y) = corner_origin(page, corner, size_pt, margin_pt);
        let mut overlay = PageOverlay::new();
        overlay.image(&handle, x, y, size_pt, size_pt);
        Some(overlay)
    })
}

/// Identity payloads: cipher framing plus QR rendering and detection
pub struct BarcodeEngine {
    config: BarcodeConfig,
    cipher: SubstitutionCipher,
    dpi: u32,
    generator: Box<dyn BarcodeGenerator>,
    reader: Box<dyn BarcodeReader>,
}

impl BarcodeEngine {
    pub fn new(config: &GhostmarkConfig) -> Self {
        Self::with_backends(config, Box::new(QrGenerator), Box::new(QuircReader))
    }

    pub fn with_backends(
        config: &GhostmarkConfig,
        generator: Box<dyn BarcodeGenerator>,
        reader: Box<dyn BarcodeReader>,
    ) -> Self {
        Self {
            config: config.barcode.clone(),
            cipher: SubstitutionCipher::new(&config.cipher),
            dpi: config.extraction.dpi,
            generator,
            reader,
        }
    }

    /// Render a payload with the configured module size and quiet zone
    pub fn render(&self, payload: &str) -> Result<GrayImage> {
        self.generator
            .render(payload, self.config.module_size, self.config.border)
    }

    /// Cipher-encode `identity` and stamp it on every page
    pub fn embed_identity(&self, document: &mut PdfDocument, identity: &str) -> Result<CipherPayload> {
        if identity.chars().count() > MAX_IDENTITY_LEN {
            return Err(GhostmarkError::InvalidParameters(format!(
                "identity must be at most {MAX_IDENTITY_LEN} characters"
            )));
        }
        let payload = self.cipher.encode(identity);
        let image = self.render(payload.as_str())?;
        let pages = place(
            document,
            &image,
            self.config.corner,
            self.config.size_pt,
            self.config.margin_pt,
        )?;
        info!(pages, corner = ?self.config.corner, "placed QR identity payload");
        Ok(payload)
    }

    pub fn read(&self, frame: &DynamicImage) -> Option<String> {
        self.reader.read(frame)
    }

    /// Read a QR payload from `frame` and undo the cipher framing
    pub fn recover_identity(&self, frame: &DynamicImage) -> Result<Option<String>> {
        match self.read(frame) {
            Some(payload) => self.cipher.decode(&payload).map(Some),
            None => Ok(None),
        }
    }

    /// First QR payload found on any page of a PDF, or in a PNG/JPEG image
    pub fn read_document(&self, bytes: &[u8], renderer: &dyn PageRenderer) -> Result<Option<String>> {
        let frames = render::frames_from_bytes(bytes, renderer, self.dpi)?;
        for (index, frame) in frames.iter().enumerate() {
            if let Some(payload) = self.read(frame) {
                debug!(frame = index + 1, "found QR payload");
                return Ok(Some(payload));
            }
        }
        Ok(None)
    }

    pub fn decode_payload(&self, payload: &str) -> Result<String> {
        self.cipher.decode(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> BarcodeEngine {
        BarcodeEngine::new(&GhostmarkConfig::default())
    }

    #[test]
    fn test_render_is_deterministic_with_quiet_zone() {
        let a = QrGenerator.render("<<hello>>##world", 4, 4).unwrap();
        let b = QrGenerator.render("<<hello>>##world", 4, 4).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.width(), a.height());
        // quiet zone is white
        assert_eq!(a.get_pixel(0, 0), &Luma([255]));
        assert_eq!(a.get_pixel(15, 15), &Luma([255]));
        // finder pattern starts right after the quiet zone
        assert_eq!(a.get_pixel(16, 16), &Luma([0]));
    }

    #[test]
    fn test_zero_module_size_rejected() {
        assert!(matches!(
            QrGenerator.render("x", 0, 4),
            Err(GhostmarkError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_rendered_code_reads_back() {
        let image = QrGenerator.render("<<tetmz>>##mfiqt.kwu", 10, 4).unwrap();
        let frame = DynamicImage::ImageLuma8(image);
        assert_eq!(QuircReader.read(&frame).as_deref(), Some("<<tetmz>>##mfiqt.kwu"));
    }

    #[test]
    fn test_blank_frame_reads_nothing() {
        let frame = DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 200, Luma([255])));
        assert_eq!(QuircReader.read(&frame), None);
    }

    #[test]
    fn test_recover_identity_round_trip() {
        let engine = engine();
        let payload = SubstitutionCipher::new(&GhostmarkConfig::default().cipher)
            .encode("alice@example.com");
        let frame = DynamicImage::ImageLuma8(engine.render(payload.as_str()).unwrap());
        assert_eq!(
            engine.recover_identity(&frame).unwrap().as_deref(),
            Some("alice@example.com")
        );
    }

    #[test]
    fn test_recover_identity_rejects_unframed_code() {
        let engine = engine();
        let frame = DynamicImage::ImageLuma8(engine.render("https://example.com").unwrap());
        assert!(matches!(
            engine.recover_identity(&frame),
            Err(GhostmarkError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_corner_origin() {
        let page = PageGeometry {
            index: 0,
            count: 1,
            origin_x: 0.0,
            origin_y: 0.0,
            width: 612.0,
            height: 792.0,
        };
        assert_eq!(corner_origin(&page, Corner::BottomRight, 72.0, 20.0), (520.0, 20.0));
        assert_eq!(corner_origin(&page, Corner::TopLeft, 72.0, 20.0), (20.0, 700.0));
    }

    #[test]
    fn test_embed_identity_rejects_overlong_identity() {
        let bytes = PdfDocument::blank(1, 612.0, 792.0).unwrap();
        let mut doc = PdfDocument::load(&bytes).unwrap();
        let identity = format!("{}@example.org", "a".repeat(MAX_IDENTITY_LEN));
        let result = engine().embed_identity(&mut doc, &identity);
        assert!(matches!(result, Err(GhostmarkError::InvalidParameters(_))));
        assert!(result.unwrap_err().is_client_error());
    }

    #[test]
    fn test_embed_identity_marks_every_page() {
        let bytes = PdfDocument::blank(3, 612.0, 792.0).unwrap();
        let mut doc = PdfDocument::load(&bytes).unwrap();
        let payload = engine().embed_identity(&mut doc, "bob@example.org").unwrap();
        assert!(payload.as_str().starts_with("<<"));

        let reloaded = PdfDocument::load(&doc.to_bytes().unwrap()).unwrap();
        for index in 0..3 {
            let ops = reloaded.page_operations(index).unwrap();
            assert!(ops.iter().any(|op| op.operator == "Do"), "page {index}");
        }
    }
}
