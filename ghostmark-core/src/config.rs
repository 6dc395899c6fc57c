//! Immutable configuration shared by every codec.
//!
//! A [`GhostmarkConfig`] is built once (defaults, or a JSON document) and handed to each
//! engine at construction. Nothing in the crate reads global constants, so tests can run
//! side by side with different parameter sets.

use crate::error::{GhostmarkError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GhostmarkConfig {
    pub watermark: WatermarkConfig,
    pub cipher: CipherConfig,
    pub barcode: BarcodeConfig,
    pub font_stego: FontStegoConfig,
    pub border: BorderConfig,
    pub extraction: ExtractionConfig,
}

/// Near-invisible watermark rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    /// Fill color as 8-bit RGB
    pub color: [u8; 3],
    /// Helvetica size in points
    pub font_size: f32,
    /// Horizontal inset of both anchors from the left page edge
    pub inset_x: f32,
    /// Baseline distance of the top anchor from the top page edge
    pub top_offset: f32,
    /// Baseline distance of the bottom anchor from the bottom page edge
    pub bottom_offset: f32,
    pub skip_first_page: bool,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            color: [255, 254, 250],
            font_size: 10.0,
            inset_x: 20.0,
            top_offset: 30.0,
            bottom_offset: 20.0,
            skip_first_page: true,
        }
    }
}

/// Substitution cipher used for barcode payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    pub charset: String,
    pub shift: usize,
    pub prefix: String,
    pub suffix: String,
    pub separator: String,
    pub default_domain: String,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            charset: "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-+=".to_string(),
            shift: 8,
            prefix: "<<".to_string(),
            suffix: ">>".to_string(),
            separator: "##".to_string(),
            default_domain: "gmail.com".to_string(),
        }
    }
}

/// Page corner used for barcode placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarcodeConfig {
    /// Pixels per QR module in the rendered raster
    pub module_size: u32,
    /// Quiet zone width in modules
    pub border: u32,
    /// Edge length of the placed image in points
    pub size_pt: f32,
    pub margin_pt: f32,
    pub corner: Corner,
}

impl Default for BarcodeConfig {
    fn default() -> Self {
        Self {
            module_size: 10,
            border: 4,
            size_pt: 72.0,
            margin_pt: 20.0,
            corner: Corner::BottomRight,
        }
    }
}

/// Font-size steganography layout and size buckets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontStegoConfig {
    pub neutral_size: f32,
    pub low_size: f32,
    pub high_size: f32,
    /// Maximum distance in points for a measured size to match a bucket
    pub size_tolerance: f32,
    /// Decoy line written above the cover text
    pub cover_story: String,
    pub left_margin: f32,
    pub right_margin: f32,
    pub bottom_margin: f32,
    pub line_height: f32,
    /// Fraction of the page height treated as header and as footer
    pub region_fraction: f32,
}

impl Default for FontStegoConfig {
    fn default() -> Self {
        Self {
            neutral_size: 8.0,
            low_size: 7.5,
            high_size: 8.5,
            size_tolerance: 0.05,
            cover_story: "This document is provided for the intended recipient only.".to_string(),
            left_margin: 36.0,
            right_margin: 36.0,
            bottom_margin: 14.0,
            line_height: 9.5,
            region_fraction: 0.15,
        }
    }
}

/// Stepped page border fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BorderConfig {
    /// Distance of the border from every page edge
    pub margin: f32,
    pub line_width: f32,
    /// Share of the right edge, measured from the top, that carries the steps
    pub step_fraction: f32,
    /// Indent per digit in points (half a centimetre)
    pub step_unit: f32,
    /// Stroke color as 8-bit RGB
    pub color: [u8; 3],
}

impl Default for BorderConfig {
    fn default() -> Self {
        Self {
            margin: 36.0,
            line_width: 1.0,
            step_fraction: 0.125,
            step_unit: 14.173_228,
            color: [0, 0, 0],
        }
    }
}

/// Watermark recovery parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub dpi: u32,
    /// Allowed distance below the watermark color, per channel
    pub tolerance_below: u8,
    /// Allowed distance above the watermark color, per channel
    pub tolerance_above: u8,
    pub dilate_iterations: u32,
    /// Candidates must be longer than this to count for the frequency rule
    pub min_frequent_len: usize,
    /// Tesseract language code
    pub ocr_language: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            tolerance_below: 5,
            tolerance_above: 3,
            dilate_iterations: 1,
            min_frequent_len: 3,
            ocr_language: "eng".to_string(),
        }
    }
}

impl GhostmarkConfig {
    /// Parse and validate a JSON document. Missing keys fall back to defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: GhostmarkConfig = serde_json::from_str(json)
            .map_err(|e| GhostmarkError::Configuration(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        let cipher = &self.cipher;
        if cipher.charset.is_empty() {
            return Err(GhostmarkError::Configuration(
                "cipher charset must not be empty".to_string(),
            ));
        }
        if cipher.separator.is_empty() || cipher.prefix.is_empty() || cipher.suffix.is_empty() {
            return Err(GhostmarkError::Configuration(
                "cipher framing literals must not be empty".to_string(),
            ));
        }
        let framing = format!("{}{}{}", cipher.prefix, cipher.suffix, cipher.separator);
        if framing.chars().any(|c| cipher.charset.contains(c)) {
            return Err(GhostmarkError::Configuration(
                "cipher framing literals must not use charset characters".to_string(),
            ));
        }

        let stego = &self.font_stego;
        let sizes = [stego.neutral_size, stego.low_size, stego.high_size];
        if sizes.iter().any(|s| *s <= 0.0) {
            return Err(GhostmarkError::Configuration(
                "font sizes must be positive".to_string(),
            ));
        }
        let min_gap = 2.0 * stego.size_tolerance;
        if (stego.neutral_size - stego.low_size).abs() <= min_gap
            || (stego.neutral_size - stego.high_size).abs() <= min_gap
            || (stego.low_size - stego.high_size).abs() <= min_gap
        {
            return Err(GhostmarkError::Configuration(
                "neutral, low and high font sizes must be distinguishable".to_string(),
            ));
        }
        if !(0.0..0.5).contains(&stego.region_fraction) {
            return Err(GhostmarkError::Configuration(
                "region fraction must lie in [0, 0.5)".to_string(),
            ));
        }

        let border = &self.border;
        if border.margin < 0.0 || border.line_width <= 0.0 || border.step_unit <= 0.0 {
            return Err(GhostmarkError::Configuration(
                "border margin, line width and step unit must be positive".to_string(),
            ));
        }
        if !(border.step_fraction > 0.0 && border.step_fraction <= 1.0) {
            return Err(GhostmarkError::Configuration(
                "border step fraction must lie in (0, 1]".to_string(),
            ));
        }

        if self.extraction.dpi == 0 {
            return Err(GhostmarkError::Configuration(
                "extraction DPI must be positive".to_string(),
            ));
        }
        if self.barcode.module_size == 0 {
            return Err(GhostmarkError::Configuration(
                "barcode module size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
