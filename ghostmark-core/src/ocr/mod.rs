//! OCR collaborators
//!
//! Watermark extraction hands binarized PNG frames to an [`OcrProvider`] and treats the
//! answer as a best-effort reading. Three providers ship with the crate:
//!
//! - [`MockOcrProvider`]: scripted answers for tests and offline runs
//! - [`TesseractCommandProvider`]: runs the `tesseract` binary on a temporary file
//! - `TesseractOcrProvider`: in-process bindings, behind the `ocr-tesseract` feature
//!
//! # Example
//!
//! ```rust
//! use ghostmark::ocr::{MockOcrProvider, OcrOptions, OcrProvider};
//!
//! let provider = MockOcrProvider::with_responses(vec!["userATexampleDOTcom".to_string()]);
//! let png = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
//! let result = provider.process_image(&png, &OcrOptions::default()).unwrap();
//! assert_eq!(result.text, "userATexampleDOTcom");
//! ```

mod command;
#[cfg(feature = "ocr-tesseract")]
mod tesseract_provider;

pub use command::TesseractCommandProvider;
#[cfg(feature = "ocr-tesseract")]
pub use tesseract_provider::{PageSegmentationMode, TesseractConfig, TesseractOcrProvider};

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Result type for OCR operations
pub type OcrResult<T> = std::result::Result<T, OcrError>;

/// Errors that can occur during OCR processing
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    /// OCR provider is not available or not configured
    #[error("OCR provider not available: {0}")]
    ProviderNotAvailable(String),

    /// Unsupported image format for OCR processing
    #[error("Unsupported image format: {0:?}")]
    UnsupportedImageFormat(ImageFormat),

    /// Invalid or corrupted image data
    #[error("Invalid image data: {0}")]
    InvalidImageData(String),

    /// OCR processing failed
    #[error("OCR processing failed: {0}")]
    ProcessingFailed(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Raster formats an OCR engine may accept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Tiff,
}

impl ImageFormat {
    /// Detect a format from magic bytes
    pub fn sniff(data: &[u8]) -> Option<ImageFormat> {
        if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if data.starts_with(b"\xFF\xD8\xFF") {
            Some(ImageFormat::Jpeg)
        } else if data.starts_with(b"II\x2A\x00") || data.starts_with(b"MM\x00\x2A") {
            Some(ImageFormat::Tiff)
        } else {
            None
        }
    }
}

/// OCR processing options
#[derive(Debug, Clone)]
pub struct OcrOptions {
    /// Tesseract language code (e.g. "eng", "eng+spa")
    pub language: String,
    /// Treat each frame as a single line of text
    pub single_line: bool,
    /// Timeout for OCR operations (in seconds)
    pub timeout_seconds: u32,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            single_line: false,
            timeout_seconds: 30,
        }
    }
}

/// Complete result of OCR processing
#[derive(Debug, Clone)]
pub struct OcrProcessingResult {
    /// The complete extracted text
    pub text: String,
    /// Overall confidence score (0.0 to 1.0), when the engine reports one
    pub confidence: Option<f64>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
    pub engine_name: String,
}

/// OCR engine families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrEngine {
    Mock,
    Tesseract,
}

impl OcrEngine {
    pub fn name(&self) -> &'static str {
        match self {
            OcrEngine::Mock => "Mock OCR",
            OcrEngine::Tesseract => "Tesseract",
        }
    }
}

impl fmt::Display for OcrEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Trait for OCR providers
pub trait OcrProvider: Send + Sync {
    /// Recognize text in an encoded raster image (PNG, JPEG or TIFF bytes)
    fn process_image(&self, image_data: &[u8], options: &OcrOptions) -> OcrResult<OcrProcessingResult>;

    fn supported_formats(&self) -> Vec<ImageFormat>;

    fn engine_name(&self) -> &str;

    fn engine_type(&self) -> OcrEngine;

    fn supports_format(&self, format: ImageFormat) -> bool {
        self.supported_formats().contains(&format)
    }

    /// Basic magic-byte validation before handing data to an engine
    fn validate_image_data(&self, image_data: &[u8]) -> OcrResult<()> {
        if image_data.len() < 8 {
            return Err(OcrError::InvalidImageData(
                "Image data too short".to_string(),
            ));
        }

        let format = ImageFormat::sniff(image_data).ok_or_else(|| {
            OcrError::InvalidImageData("Unrecognized image format".to_string())
        })?;

        if !self.supports_format(format) {
            return Err(OcrError::UnsupportedImageFormat(format));
        }

        Ok(())
    }
}

/// Scripted OCR provider for tests and development
///
/// Answers cycle through the configured responses, one per call.
pub struct MockOcrProvider {
    responses: Vec<String>,
    confidence: f64,
    calls: AtomicUsize,
}

impl MockOcrProvider {
    pub fn new() -> Self {
        Self::with_responses(vec!["Mock OCR extracted text".to_string()])
    }

    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses,
            confidence: 0.85,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_text_and_confidence(text: String, confidence: f64) -> Self {
        Self {
            confidence: confidence.clamp(0.0, 1.0),
            ..Self::with_responses(vec![text])
        }
    }

    /// Number of images processed so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockOcrProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrProvider for MockOcrProvider {
    fn process_image(&self, image_data: &[u8], _options: &OcrOptions) -> OcrResult<OcrProcessingResult> {
        let started = Instant::now();
        self.validate_image_data(image_data)?;

        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let text = if self.responses.is_empty() {
            String::new()
        } else {
            self.responses[call % self.responses.len()].clone()
        };

        Ok(OcrProcessingResult {
            text,
            confidence: Some(self.confidence),
            processing_time_ms: started.elapsed().as_millis() as u64,
            engine_name: self.engine_name().to_string(),
        })
    }

    fn supported_formats(&self) -> Vec<ImageFormat> {
        vec![ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::Tiff]
    }

    fn engine_name(&self) -> &str {
        "Mock OCR"
    }

    fn engine_type(&self) -> OcrEngine {
        OcrEngine::Mock
    }
}
