use crate::pdf::{BoundingBox, PageGeometry};
use serde::Serialize;
use std::fmt;

/// Vertical band of a page a text block belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageRegion {
    Header,
    Body,
    Footer,
}

impl PageRegion {
    /// Header when the block lies entirely in the top `fraction` of the page, footer when it
    /// lies entirely in the bottom `fraction`, body otherwise.
    pub fn classify(bbox: &BoundingBox, page: &PageGeometry, fraction: f32) -> PageRegion {
        let band = page.height * fraction;
        if bbox.y0 >= page.top() - band {
            PageRegion::Header
        } else if bbox.y1 <= page.origin_y + band {
            PageRegion::Footer
        } else {
            PageRegion::Body
        }
    }

    /// Upper edge of the footer band in page coordinates
    pub fn footer_top(page: &PageGeometry, fraction: f32) -> f32 {
        page.origin_y + page.height * fraction
    }
}

impl fmt::Display for PageRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageRegion::Header => "header",
            PageRegion::Body => "body",
            PageRegion::Footer => "footer",
        };
        f.write_str(name)
    }
}
