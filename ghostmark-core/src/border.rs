//! Stepped page border fingerprint
//!
//! An identity is folded into ten decimal digits. Every page gets a rectangular border whose
//! right edge carries ten steps near the top, each indented by its digit times a fixed unit.
//! Folding is one-way: reading a border yields the digits, and a candidate identity is
//! checked by folding it again.
//!
//! # Example
//!
//! ```rust
//! use ghostmark::border::{BorderEngine, BorderNumber};
//! use ghostmark::config::GhostmarkConfig;
//! use ghostmark::pdf::PdfDocument;
//!
//! let engine = BorderEngine::new(&GhostmarkConfig::default());
//! let mut doc = PdfDocument::load(&PdfDocument::blank(1, 612.0, 792.0).unwrap()).unwrap();
//! let number = engine.embed_identity(&mut doc, "bob@x.io").unwrap();
//! assert_eq!(number.to_string(), "5076045300");
//!
//! let read = engine.read_bytes(&doc.to_bytes().unwrap()).unwrap();
//! assert_eq!(read, Some(number));
//! ```

use crate::barcode::MAX_IDENTITY_LEN;
use crate::config::{BorderConfig, GhostmarkConfig};
use crate::error::{GhostmarkError, Result};
use crate::pdf::{read_segments, LineSegment, PageGeometry, PageOverlay, PdfDocument};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Number of steps, one per digit
pub const DIGITS: usize = 10;

/// Distance in points within which a drawn segment matches an expected one
const MATCH_TOLERANCE: f32 = 0.5;

/// Ten decimal digits carried by a border
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BorderNumber([u8; DIGITS]);

impl BorderNumber {
    pub fn digits(&self) -> &[u8; DIGITS] {
        &self.0
    }

    /// Fold an identity into ten digits.
    ///
    /// Each character becomes a two-digit code (`a`-`z` 01-26, `.` 27, `@` 28, `_` 29, `-` 30,
    /// `0`-`9` 31-40, anything else 00). Up to ten digits are used as is and padded with
    /// zeros. Longer code strings are folded: digit `i` of every even position is added to its
    /// mirror from the end, modulo 10, for at most ten positions.
    pub fn from_identity(identity: &str) -> Self {
        let codes: Vec<u8> = identity
            .to_lowercase()
            .chars()
            .flat_map(|c| {
                let code = char_code(c);
                [code / 10, code % 10]
            })
            .collect();

        let mut digits = [0u8; DIGITS];
        if codes.len() > DIGITS {
            let last = codes.len() - 1;
            for (slot, i) in digits.iter_mut().zip((0..last).step_by(2)) {
                *slot = (codes[i] + codes[last - i]) % 10;
            }
        } else {
            digits[..codes.len()].copy_from_slice(&codes);
        }
        Self(digits)
    }
}

fn char_code(c: char) -> u8 {
    match c {
        'a'..='z' => c as u8 - b'a' + 1,
        '.' => 27,
        '@' => 28,
        '_' => 29,
        '-' => 30,
        '0'..='9' => c as u8 - b'0' + 31,
        _ => 0,
    }
}

impl fmt::Display for BorderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for digit in self.0 {
            write!(f, "{digit}")?;
        }
        Ok(())
    }
}

impl FromStr for BorderNumber {
    type Err = GhostmarkError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != DIGITS || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(GhostmarkError::InvalidParameters(format!(
                "border number must be exactly {DIGITS} digits, got '{s}'"
            )));
        }
        let mut digits = [0u8; DIGITS];
        for (slot, b) in digits.iter_mut().zip(s.bytes()) {
            *slot = b - b'0';
        }
        Ok(Self(digits))
    }
}

impl Serialize for BorderNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Where the steps sit on one page
struct StepGrid {
    right_x: f32,
    bottom: f32,
    height: f32,
    top: f32,
}

impl StepGrid {
    fn row(&self, index: usize) -> f32 {
        self.bottom + index as f32 * self.height
    }
}

/// Draws and reads stepped borders
pub struct BorderEngine {
    config: BorderConfig,
}

impl BorderEngine {
    pub fn new(config: &GhostmarkConfig) -> Self {
        Self {
            config: config.border.clone(),
        }
    }

    fn grid(&self, page: &PageGeometry) -> Result<StepGrid> {
        let margin = self.config.margin;
        let deepest = 9.0 * self.config.step_unit;
        if page.width <= 2.0 * margin + deepest || page.height <= 2.0 * margin {
            return Err(GhostmarkError::InvalidParameters(format!(
                "page {} is too small for a stepped border",
                page.index + 1
            )));
        }
        let top = page.top() - margin;
        let steps = (page.height - 2.0 * margin) * self.config.step_fraction;
        Ok(StepGrid {
            right_x: page.right() - margin,
            bottom: top - steps,
            height: steps / DIGITS as f32,
            top,
        })
    }

    /// Border outline for one page: bottom, top and left edges, the plain lower part of the
    /// right edge, then the steps and the closing run back to the top corner
    pub fn segments(&self, page: &PageGeometry, number: &BorderNumber) -> Result<Vec<LineSegment>> {
        let grid = self.grid(page)?;
        let left = page.origin_x + self.config.margin;
        let bottom = page.origin_y + self.config.margin;
        let right = grid.right_x;

        let mut segments = vec![
            LineSegment::new(left, bottom, right, bottom),
            LineSegment::new(left, grid.top, right, grid.top),
            LineSegment::new(left, bottom, left, grid.top),
            LineSegment::new(right, bottom, right, grid.bottom),
        ];

        let mut previous: Option<f32> = None;
        for (index, digit) in number.digits().iter().enumerate() {
            let x = right - f32::from(*digit) * self.config.step_unit;
            let y = grid.row(index);
            if let Some(prev_x) = previous {
                segments.push(LineSegment::new(prev_x, y, x, y));
            }
            segments.push(LineSegment::new(x, y, x, y + grid.height));
            previous = Some(x);
        }
        let last_x = previous.unwrap_or(right);
        let end = grid.row(DIGITS);
        segments.push(LineSegment::new(last_x, end, right, end));
        segments.push(LineSegment::new(right, end, right, grid.top));
        Ok(segments)
    }

    /// Draw the border for `number` on every page. Returns the number of pages drawn on.
    pub fn embed(&self, document: &mut PdfDocument, number: &BorderNumber) -> Result<usize> {
        let outlines = document
            .pages()
            .iter()
            .map(|page| self.segments(page, number))
            .collect::<Result<Vec<_>>>()?;

        let (width, color) = (self.config.line_width, self.config.color);
        let pages = document.apply(|page| {
            let segments = outlines.get(page.index)?;
            let mut overlay = PageOverlay::new();
            overlay.lines(segments, width, color);
            Some(overlay)
        })?;
        info!(pages, number = %number, "drew stepped border");
        Ok(pages)
    }

    /// Fold `identity` and draw its border
    pub fn embed_identity(&self, document: &mut PdfDocument, identity: &str) -> Result<BorderNumber> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(GhostmarkError::InvalidParameters(
                "email is required for a border".to_string(),
            ));
        }
        if identity.chars().count() > MAX_IDENTITY_LEN {
            return Err(GhostmarkError::InvalidParameters(format!(
                "email must be at most {MAX_IDENTITY_LEN} characters"
            )));
        }
        let number = BorderNumber::from_identity(identity);
        self.embed(document, &number)?;
        Ok(number)
    }

    /// Digits of the border drawn on page `index`, if all ten steps are present
    pub fn read_page(&self, document: &PdfDocument, index: usize) -> Result<Option<BorderNumber>> {
        let Some(page) = document.page(index) else {
            return Ok(None);
        };
        let Ok(grid) = self.grid(&page) else {
            return Ok(None);
        };
        let verticals: Vec<LineSegment> = read_segments(&document.page_operations(index)?)
            .into_iter()
            .filter(|s| s.is_vertical(MATCH_TOLERANCE))
            .collect();

        let mut digits = [0u8; DIGITS];
        for (index, slot) in digits.iter_mut().enumerate() {
            let low = grid.row(index);
            let high = low + grid.height;
            let found = verticals.iter().find_map(|segment| {
                let (y0, y1) = segment.y_range();
                if (y0 - low).abs() > MATCH_TOLERANCE || (y1 - high).abs() > MATCH_TOLERANCE {
                    return None;
                }
                let indent = grid.right_x - segment.x0;
                let digit = (indent / self.config.step_unit).round();
                let exact = (indent - digit * self.config.step_unit).abs() <= MATCH_TOLERANCE;
                (exact && (0.0..=9.0).contains(&digit)).then_some(digit as u8)
            });
            match found {
                Some(digit) => *slot = digit,
                None => {
                    debug!(step = index, "border step missing");
                    return Ok(None);
                }
            }
        }
        Ok(Some(BorderNumber(digits)))
    }

    /// Digits of the first page that carries a complete border
    pub fn read(&self, document: &PdfDocument) -> Result<Option<BorderNumber>> {
        for index in 0..document.page_count() {
            if let Some(number) = self.read_page(document, index)? {
                debug!(page = index + 1, number = %number, "found stepped border");
                return Ok(Some(number));
            }
        }
        Ok(None)
    }

    /// [`BorderEngine::read`] over serialized PDF bytes
    pub fn read_bytes(&self, bytes: &[u8]) -> Result<Option<BorderNumber>> {
        self.read(&PdfDocument::load(bytes)?)
    }

    /// Whether `identity` folds to `number`
    pub fn matches(identity: &str, number: &BorderNumber) -> bool {
        BorderNumber::from_identity(identity.trim()) == *number
    }
}
