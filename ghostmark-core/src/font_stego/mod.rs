//! Font-size steganography
//!
//! A secret is carried by the point sizes of a cover text appended to the footer of the last
//! page. Every non-space character consumes one bit of the secret: a slightly smaller size
//! for `0`, a slightly larger one for `1`. A fixed cover story line at the neutral size sits
//! above the cover text and carries nothing.
//!
//! # Example
//!
//! ```rust
//! use ghostmark::config::GhostmarkConfig;
//! use ghostmark::font_stego::FontStegoEngine;
//! use ghostmark::pdf::PdfDocument;
//!
//! let engine = FontStegoEngine::new(&GhostmarkConfig::default());
//! let mut doc = PdfDocument::load(&PdfDocument::blank(2, 612.0, 792.0).unwrap()).unwrap();
//! engine.encode(&mut doc, "HI", "meet me by the old oak tree at noon").unwrap();
//!
//! let doc = PdfDocument::load(&doc.to_bytes().unwrap()).unwrap();
//! let report = engine.decode(&doc).unwrap().unwrap();
//! assert_eq!(report.message(), "HI");
//! ```

pub mod layout;
pub mod region;

pub use layout::{CoverLayout, CoverUnit, KeepOut};
pub use region::PageRegion;

use crate::bits::{self, Bitstream, DecodedBytes};
use crate::config::{BarcodeConfig, FontStegoConfig, GhostmarkConfig, WatermarkConfig};
use crate::error::{GhostmarkError, Result};
use crate::pdf::{PageOverlay, PdfDocument, SpanReader};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Size classes of cover characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSizeClass {
    /// Spaces, the cover story and characters after the secret ran out
    Neutral,
    /// Bit 0
    Low,
    /// Bit 1
    High,
}

impl FontSizeClass {
    pub fn size(self, config: &FontStegoConfig) -> f32 {
        match self {
            FontSizeClass::Neutral => config.neutral_size,
            FontSizeClass::Low => config.low_size,
            FontSizeClass::High => config.high_size,
        }
    }

    /// Match a measured size against the configured sizes within the tolerance
    pub fn classify(size: f32, config: &FontStegoConfig) -> Option<FontSizeClass> {
        [FontSizeClass::Neutral, FontSizeClass::Low, FontSizeClass::High]
            .into_iter()
            .find(|class| (class.size(config) - size).abs() <= config.size_tolerance)
    }

    pub fn bit(self) -> Option<bool> {
        match self {
            FontSizeClass::Neutral => None,
            FontSizeClass::Low => Some(false),
            FontSizeClass::High => Some(true),
        }
    }
}

/// Bits recovered from the last page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FontStegoReport {
    pub header_bits: Bitstream,
    pub body_bits: Bitstream,
    /// The only bits that feed the message
    pub footer_bits: Bitstream,
    pub decoded: DecodedBytes,
    /// Footer spans whose size matched no class
    pub unrecognized_spans: usize,
}

impl FontStegoReport {
    pub fn message(&self) -> String {
        self.decoded.text()
    }

    pub fn bits(&self, region: PageRegion) -> &Bitstream {
        match region {
            PageRegion::Header => &self.header_bits,
            PageRegion::Body => &self.body_bits,
            PageRegion::Footer => &self.footer_bits,
        }
    }
}

pub struct FontStegoEngine {
    config: FontStegoConfig,
    watermark: WatermarkConfig,
    barcode: BarcodeConfig,
    reader: SpanReader,
}

impl FontStegoEngine {
    pub fn new(config: &GhostmarkConfig) -> Self {
        Self {
            config: config.font_stego.clone(),
            watermark: config.watermark.clone(),
            barcode: config.barcode.clone(),
            reader: SpanReader::new(),
        }
    }

    /// Number of bits `cover` can carry: one per character other than the ASCII space.
    /// Tabs and line breaks count and are drawn as `?`.
    pub fn capacity(cover: &str) -> usize {
        cover.chars().filter(|c| *c != ' ').count()
    }

    /// Hide `secret` in the font sizes of `cover` on the last page.
    /// Returns the number of bits embedded.
    pub fn encode(&self, document: &mut PdfDocument, secret: &str, cover: &str) -> Result<usize> {
        if secret.is_empty() {
            return Err(GhostmarkError::InvalidParameters(
                "secret message must not be empty".to_string(),
            ));
        }
        let bits = bits::encode(secret.as_bytes());
        let available = Self::capacity(cover);
        if bits.len() > available {
            return Err(GhostmarkError::Capacity {
                needed: bits.len(),
                available,
            });
        }

        let page = document.last_page().ok_or_else(|| {
            GhostmarkError::InvalidParameters("document has no pages".to_string())
        })?;
        let units = layout::plan_units(&bits, cover);
        let keep_out = KeepOut::for_page(&page, &self.config, &self.watermark, &self.barcode);
        let placed = layout::layout(&units, &page, &self.config, &keep_out)?;
        debug!(
            bits = bits.len(),
            available,
            lines = placed.lines.len(),
            page = page.index + 1,
            "planned cover text"
        );

        let mut pending = Some(placed);
        document.apply(|geometry| {
            if geometry.index != page.index {
                return None;
            }
            let placed = pending.take()?;
            let mut overlay = PageOverlay::new();
            overlay.text_object([0, 0, 0], [placed.story]);
            overlay.text_object([0, 0, 0], placed.lines.into_iter().flatten());
            Some(overlay)
        })?;

        info!(bits = bits.len(), "embedded font-size payload");
        Ok(bits.len())
    }

    /// Recover the secret from the footer of the last page.
    /// `None` when no footer text carries a bit.
    pub fn decode(&self, document: &PdfDocument) -> Result<Option<FontStegoReport>> {
        let Some(page) = document.last_page() else {
            return Ok(None);
        };
        let blocks = self.reader.read_page(document, page.index)?;

        let mut header_bits = Bitstream::new();
        let mut body_bits = Bitstream::new();
        let mut footer_bits = Bitstream::new();
        let mut unrecognized_spans = 0;

        for block in &blocks {
            let region = PageRegion::classify(&block.bbox, &page, self.config.region_fraction);
            for span in &block.spans {
                let class = FontSizeClass::classify(span.font_size, &self.config);
                if region == PageRegion::Footer && class.is_none() {
                    warn!(size = span.font_size, text = %span.text, "unrecognized font size in footer");
                    unrecognized_spans += 1;
                }
                let Some(bit) = class.and_then(FontSizeClass::bit) else {
                    continue;
                };
                let target = match region {
                    PageRegion::Header => &mut header_bits,
                    PageRegion::Body => &mut body_bits,
                    PageRegion::Footer => &mut footer_bits,
                };
                for _ in 0..span.non_space_count() {
                    target.push(bit);
                }
            }
        }

        if footer_bits.is_empty() {
            debug!(blocks = blocks.len(), "no encoded footer spans");
            return Ok(None);
        }

        let decoded = bits::decode(&footer_bits);
        info!(
            bits = footer_bits.len(),
            bytes = decoded.bytes.len(),
            truncated = decoded.is_truncated(),
            "decoded font-size payload"
        );
        Ok(Some(FontStegoReport {
            header_bits,
            body_bits,
            footer_bits,
            decoded,
            unrecognized_spans,
        }))
    }

    /// [`FontStegoEngine::decode`] over serialized PDF bytes
    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<Option<FontStegoReport>> {
        self.decode(&PdfDocument::load(bytes)?)
    }
}
