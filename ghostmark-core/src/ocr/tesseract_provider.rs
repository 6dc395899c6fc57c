//! In-process Tesseract provider
//!
//! Requires the Tesseract and Leptonica development libraries at build time:
//!
//! ```bash
//! sudo apt-get install libtesseract-dev libleptonica-dev tesseract-ocr-eng
//! cargo build --features ocr-tesseract
//! ```

use super::{ImageFormat, OcrEngine, OcrError, OcrOptions, OcrProcessingResult, OcrProvider, OcrResult};
use std::collections::HashMap;
use std::time::Instant;
use tesseract::Tesseract;

/// Page Segmentation Mode for Tesseract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSegmentationMode {
    /// Fully automatic page segmentation, but no OSD
    #[default]
    Auto = 3,
    /// Assume a single uniform block of text
    SingleUniformBlock = 6,
    /// Treat the image as a single text line
    SingleLine = 7,
    /// Sparse text. Find as much text as possible in no particular order
    SparseText = 11,
}

impl PageSegmentationMode {
    pub fn to_psm_value(self) -> u8 {
        self as u8
    }
}

/// Configuration for the in-process Tesseract provider
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// Directory holding `*.traineddata`, `None` for the library default
    pub datapath: Option<String>,
    pub psm: PageSegmentationMode,
    /// Character whitelist (only recognize these characters)
    pub char_whitelist: Option<String>,
    /// Custom Tesseract variables
    pub variables: HashMap<String, String>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            datapath: None,
            psm: PageSegmentationMode::default(),
            char_whitelist: None,
            variables: HashMap::new(),
        }
    }
}

impl TesseractConfig {
    /// Watermarks are a single line of letters and digits
    pub fn for_watermarks() -> Self {
        Self {
            psm: PageSegmentationMode::SparseText,
            char_whitelist: Some(
                "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 _-+".to_string(),
            ),
            ..Default::default()
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

/// Tesseract OCR provider backed by libtesseract
pub struct TesseractOcrProvider {
    config: TesseractConfig,
}

impl TesseractOcrProvider {
    pub fn new() -> OcrResult<Self> {
        Self::with_config(TesseractConfig::default())
    }

    pub fn with_config(config: TesseractConfig) -> OcrResult<Self> {
        let provider = Self { config };
        provider.create_instance("eng", PageSegmentationMode::Auto)?;
        Ok(provider)
    }

    pub fn config(&self) -> &TesseractConfig {
        &self.config
    }

    fn create_instance(&self, language: &str, psm: PageSegmentationMode) -> OcrResult<Tesseract> {
        let mut tesseract = Tesseract::new(self.config.datapath.as_deref(), Some(language))
            .map_err(|e| {
                OcrError::ProviderNotAvailable(format!("Failed to initialize Tesseract: {e}"))
            })?
            .set_variable("tessedit_pageseg_mode", &psm.to_psm_value().to_string())
            .map_err(|e| OcrError::Configuration(format!("Failed to set PSM: {e}")))?;

        if let Some(ref whitelist) = self.config.char_whitelist {
            tesseract = tesseract
                .set_variable("tessedit_char_whitelist", whitelist)
                .map_err(|e| OcrError::Configuration(format!("Failed to set whitelist: {e}")))?;
        }

        for (name, value) in &self.config.variables {
            tesseract = tesseract.set_variable(name, value).map_err(|e| {
                OcrError::Configuration(format!("Failed to set variable {name}: {e}"))
            })?;
        }

        Ok(tesseract)
    }
}

impl OcrProvider for TesseractOcrProvider {
    fn process_image(&self, image_data: &[u8], options: &OcrOptions) -> OcrResult<OcrProcessingResult> {
        self.validate_image_data(image_data)?;
        let started = Instant::now();

        let psm = if options.single_line {
            PageSegmentationMode::SingleLine
        } else {
            self.config.psm
        };
        let mut tesseract = self
            .create_instance(&options.language, psm)?
            .set_image_from_mem(image_data)
            .map_err(|e| OcrError::InvalidImageData(format!("Failed to set image: {e}")))?;

        let text = tesseract
            .get_text()
            .map_err(|e| OcrError::ProcessingFailed(format!("Failed to extract text: {e}")))?;
        let confidence = f64::from(tesseract.mean_text_conf()) / 100.0;

        Ok(OcrProcessingResult {
            text,
            confidence: Some(confidence),
            processing_time_ms: started.elapsed().as_millis() as u64,
            engine_name: self.engine_name().to_string(),
        })
    }

    fn supported_formats(&self) -> Vec<ImageFormat> {
        vec![ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::Tiff]
    }

    fn engine_name(&self) -> &str {
        "Tesseract"
    }

    fn engine_type(&self) -> OcrEngine {
        OcrEngine::Tesseract
    }
}
