//! PDF page access: overlay writer, span and line readers, Helvetica metrics

mod document;
pub mod metrics;
mod path;
mod text;

pub use document::{ImageHandle, PageGeometry, PageOverlay, PdfDocument, PlacedText, OVERLAY_FONT};
pub use path::{read_segments, LineSegment};
pub use text::{BoundingBox, SpanReader, TextBlock, TextSpan};
