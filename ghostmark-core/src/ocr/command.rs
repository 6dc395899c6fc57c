//! OCR through the `tesseract` command line tool.

use super::{ImageFormat, OcrEngine, OcrError, OcrOptions, OcrProcessingResult, OcrProvider, OcrResult};
use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;

/// Runs `tesseract <image> stdout` once per frame
#[derive(Debug, Clone)]
pub struct TesseractCommandProvider {
    binary: PathBuf,
}

impl TesseractCommandProvider {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
        }
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Check that the binary can be started
    pub fn check_availability(&self) -> OcrResult<()> {
        let status = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map_err(|e| {
                OcrError::ProviderNotAvailable(format!(
                    "Unable to run {}: {e}",
                    self.binary.display()
                ))
            })?
            .status;
        if !status.success() {
            return Err(OcrError::ProviderNotAvailable(format!(
                "{} --version exited with {status}",
                self.binary.display()
            )));
        }
        Ok(())
    }
}

impl Default for TesseractCommandProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrProvider for TesseractCommandProvider {
    fn process_image(&self, image_data: &[u8], options: &OcrOptions) -> OcrResult<OcrProcessingResult> {
        self.validate_image_data(image_data)?;
        let started = Instant::now();

        let extension = match ImageFormat::sniff(image_data) {
            Some(ImageFormat::Jpeg) => "jpg",
            Some(ImageFormat::Tiff) => "tif",
            _ => "png",
        };
        let input = tempfile::Builder::new()
            .prefix("ghostmark-ocr-")
            .suffix(&format!(".{extension}"))
            .tempfile()?;
        std::fs::write(input.path(), image_data)?;

        let psm = if options.single_line { "7" } else { "3" };
        let output = Command::new(&self.binary)
            .arg(input.path())
            .arg("stdout")
            .args(["-l", &options.language, "--psm", psm])
            .output()
            .map_err(|e| {
                OcrError::ProviderNotAvailable(format!(
                    "Unable to run {}: {e}",
                    self.binary.display()
                ))
            })?;

        if !output.status.success() {
            return Err(OcrError::ProcessingFailed(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(OcrProcessingResult {
            text: String::from_utf8_lossy(&output.stdout).into_owned(),
            confidence: None,
            processing_time_ms: started.elapsed().as_millis() as u64,
            engine_name: self.engine_name().to_string(),
        })
    }

    fn supported_formats(&self) -> Vec<ImageFormat> {
        vec![ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::Tiff]
    }

    fn engine_name(&self) -> &str {
        "Tesseract (command)"
    }

    fn engine_type(&self) -> OcrEngine {
        OcrEngine::Tesseract
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_reported() {
        let provider = TesseractCommandProvider::with_binary("/nonexistent/ghostmark-tesseract");
        assert!(matches!(
            provider.check_availability(),
            Err(OcrError::ProviderNotAvailable(_))
        ));

        let png = b"\x89PNG\r\n\x1a\n\0\0\0\0";
        let result = provider.process_image(png, &OcrOptions::default());
        assert!(matches!(result, Err(OcrError::ProviderNotAvailable(_))));
    }

    #[test]
    fn test_rejects_non_image_before_spawning() {
        let provider = TesseractCommandProvider::with_binary("/nonexistent/ghostmark-tesseract");
        let result = provider.process_image(b"%PDF-1.7 not an image", &OcrOptions::default());
        assert!(matches!(result, Err(OcrError::InvalidImageData(_))));
    }

    #[test]
    fn test_engine_info() {
        let provider = TesseractCommandProvider::new();
        assert_eq!(provider.engine_type(), OcrEngine::Tesseract);
        assert!(provider.supports_format(ImageFormat::Png));
    }
}
