//! Cover text placement
//!
//! Planning and placement are separate so the whole block can be checked against the footer
//! before the page is touched.

use super::FontSizeClass;
use crate::barcode;
use crate::bits::Bitstream;
use crate::config::{BarcodeConfig, FontStegoConfig, WatermarkConfig};
use crate::error::{GhostmarkError, Result};
use crate::font_stego::region::PageRegion;
use crate::pdf::{metrics, BoundingBox, PageGeometry, PlacedText};

/// One character of cover text and the size class it is drawn at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverUnit {
    pub ch: char,
    pub class: FontSizeClass,
}

/// Tag each cover character. Spaces stay neutral without consuming a bit; every other
/// character takes the next bit until the stream runs out.
pub fn plan_units(bits: &Bitstream, cover: &str) -> Vec<CoverUnit> {
    let mut remaining = bits.iter();
    cover
        .chars()
        .map(|ch| {
            let class = if ch == ' ' {
                FontSizeClass::Neutral
            } else {
                match remaining.next() {
                    Some(false) => FontSizeClass::Low,
                    Some(true) => FontSizeClass::High,
                    None => FontSizeClass::Neutral,
                }
            };
            CoverUnit { ch, class }
        })
        .collect()
}

/// Final positions of the cover story and the cover lines on a page
#[derive(Debug, Clone, PartialEq)]
pub struct CoverLayout {
    pub story: PlacedText,
    /// Single-character runs, line by line
    pub lines: Vec<Vec<PlacedText>>,
}

impl CoverLayout {
    pub fn runs(&self) -> impl Iterator<Item = &PlacedText> {
        self.lines.iter().flatten()
    }
}

/// Gap kept between cover glyphs and a reserved zone
const ZONE_GAP: f32 = 2.0;

/// Parts of the footer that other marks occupy
#[derive(Debug, Clone, PartialEq)]
pub struct KeepOut {
    /// Lowest allowed cover baseline
    pub floor: f32,
    /// Rectangles no cover glyph may touch
    pub zones: Vec<BoundingBox>,
}

impl KeepOut {
    /// Only the configured bottom margin, nothing reserved
    pub fn margins_only(page: &PageGeometry, config: &FontStegoConfig) -> Self {
        Self {
            floor: page.origin_y + config.bottom_margin,
            zones: Vec::new(),
        }
    }

    /// Stay above the bottom watermark anchor and clear of the barcode square
    pub fn for_page(
        page: &PageGeometry,
        config: &FontStegoConfig,
        watermark: &WatermarkConfig,
        barcode: &BarcodeConfig,
    ) -> Self {
        let watermark_top = watermark.bottom_offset + watermark.font_size;
        Self {
            floor: page.origin_y + config.bottom_margin.max(watermark_top),
            zones: vec![barcode::corner_rect(
                page,
                barcode.corner,
                barcode.size_pt,
                barcode.margin_pt,
            )],
        }
    }

    /// Horizontal extent left for a line at `baseline` once the zones it crosses are cut away.
    /// A zone right of the middle pulls the right bound in, one left of it pushes the left bound.
    fn row_bounds(&self, baseline: f32, left: f32, right: f32, config: &FontStegoConfig) -> (f32, f32) {
        let tallest = config.high_size.max(config.neutral_size);
        let band_bottom = baseline - tallest * 0.25;
        let band_top = baseline + tallest;
        let middle = (left + right) / 2.0;

        let (mut row_left, mut row_right) = (left, right);
        for zone in &self.zones {
            if zone.y1 < band_bottom || zone.y0 > band_top {
                continue;
            }
            if zone.x1 <= left || zone.x0 >= right {
                continue;
            }
            if (zone.x0 + zone.x1) / 2.0 >= middle {
                row_right = row_right.min(zone.x0 - ZONE_GAP);
            } else {
                row_left = row_left.max(zone.x1 + ZONE_GAP);
            }
        }
        (row_left, row_right)
    }
}

/// Number of cover lines that fit between the first cover baseline and `floor`
pub fn lines_available(first_baseline: f32, floor: f32, line_height: f32) -> usize {
    if first_baseline < floor || line_height <= 0.0 {
        return 0;
    }
    ((first_baseline - floor) / line_height).floor() as usize + 1
}

/// Place the cover story just inside the footer band and wrap the units below it,
/// narrowing every line that crosses a reserved zone
pub fn layout(
    units: &[CoverUnit],
    page: &PageGeometry,
    config: &FontStegoConfig,
    keep_out: &KeepOut,
) -> Result<CoverLayout> {
    let left = page.origin_x + config.left_margin;
    let right = page.right() - config.right_margin;
    if right <= left {
        return Err(GhostmarkError::LayoutOverflow {
            lines_needed: 1,
            lines_available: 0,
        });
    }

    let story_baseline =
        PageRegion::footer_top(page, config.region_fraction) - config.neutral_size - 2.0;
    let first_baseline = story_baseline - config.line_height;
    let available = lines_available(first_baseline, keep_out.floor, config.line_height);
    let baseline = |row: usize| first_baseline - row as f32 * config.line_height;
    // rows past the last usable one only count how many lines the cover would need
    let bounds = |row: usize| {
        if row < available {
            keep_out.row_bounds(baseline(row), left, right, config)
        } else {
            (left, right)
        }
    };

    let mut lines: Vec<Vec<PlacedText>> = vec![Vec::new()];
    let (mut row_left, mut row_right) = bounds(0);
    let mut x = row_left;
    for unit in units {
        let size = unit.class.size(config);
        let advance = metrics::char_width(unit.ch, size);
        loop {
            let line_empty = lines.last().map_or(true, Vec::is_empty);
            let open = row_right > row_left;
            if open && (x + advance <= row_right || line_empty) {
                break;
            }
            lines.push(Vec::new());
            (row_left, row_right) = bounds(lines.len() - 1);
            x = row_left;
        }
        let y = baseline(lines.len() - 1);
        if let Some(line) = lines.last_mut() {
            line.push(PlacedText {
                text: unit.ch.to_string(),
                x,
                y,
                font_size: size,
            });
        }
        x += advance;
    }
    while lines.last().is_some_and(Vec::is_empty) {
        lines.pop();
    }

    if lines.len() > available {
        return Err(GhostmarkError::LayoutOverflow {
            lines_needed: lines.len(),
            lines_available: available,
        });
    }
    lines.retain(|line| !line.is_empty());

    Ok(CoverLayout {
        story: PlacedText {
            text: config.cover_story.clone(),
            x: left,
            y: story_baseline,
            font_size: config.neutral_size,
        },
        lines,
    })
}
