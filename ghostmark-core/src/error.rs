use crate::ocr::OcrError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GhostmarkError {
    #[error("Cover text too short! Your message needs {needed} characters but your cover text only has {available} non-space characters")]
    Capacity { needed: usize, available: usize },

    #[error("Cover text does not fit the footer: needs {lines_needed} lines but only {lines_available} are available")]
    LayoutOverflow {
        lines_needed: usize,
        lines_available: usize,
    },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Rendering failure: {0}")]
    RenderingFailure(String),

    #[error("Barcode error: {0}")]
    Barcode(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GhostmarkError {
    /// True for errors caused by caller input rather than by a collaborator.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GhostmarkError::Capacity { .. }
                | GhostmarkError::LayoutOverflow { .. }
                | GhostmarkError::MalformedPayload(_)
                | GhostmarkError::InvalidParameters(_)
        )
    }
}

impl From<lopdf::Error> for GhostmarkError {
    fn from(err: lopdf::Error) -> Self {
        GhostmarkError::RenderingFailure(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GhostmarkError>;
