//! Straight line segments drawn by path operators

use crate::pdf::text::{multiply_matrix, transform_point, IDENTITY};
use lopdf::content::Operation;
use lopdf::Object;

/// A straight segment in default user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl LineSegment {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn is_vertical(&self, tolerance: f32) -> bool {
        (self.x0 - self.x1).abs() <= tolerance
    }

    /// Lower and upper y of the segment
    pub fn y_range(&self) -> (f32, f32) {
        (self.y0.min(self.y1), self.y0.max(self.y1))
    }
}

/// Every `l`, `h` and `re` segment on a page, transformed by the CTM in effect.
/// Curves are skipped; they only move the current point.
pub fn read_segments(operations: &[Operation]) -> Vec<LineSegment> {
    let mut segments = Vec::new();
    let mut ctm = IDENTITY;
    let mut saved: Vec<[f64; 6]> = Vec::new();
    let mut current: Option<(f64, f64)> = None;
    let mut start: Option<(f64, f64)> = None;

    let mut push = |from: (f64, f64), to: (f64, f64), ctm: &[f64; 6]| {
        let (x0, y0) = transform_point(from.0, from.1, ctm);
        let (x1, y1) = transform_point(to.0, to.1, ctm);
        segments.push(LineSegment::new(x0 as f32, y0 as f32, x1 as f32, y1 as f32));
    };

    for op in operations {
        let numbers: Vec<f64> = op
            .operands
            .iter()
            .filter_map(|o: &Object| o.as_float().ok().map(f64::from))
            .collect();
        match (op.operator.as_str(), numbers.as_slice()) {
            ("q", _) => saved.push(ctm),
            ("Q", _) => {
                if let Some(previous) = saved.pop() {
                    ctm = previous;
                }
            }
            ("cm", [a, b, c, d, e, f]) => {
                ctm = multiply_matrix(&[*a, *b, *c, *d, *e, *f], &ctm);
            }
            ("m", [x, y]) => {
                current = Some((*x, *y));
                start = current;
            }
            ("l", [x, y]) => {
                if let Some(from) = current {
                    push(from, (*x, *y), &ctm);
                }
                current = Some((*x, *y));
            }
            ("c", [.., x, y]) | ("v", [.., x, y]) | ("y", [.., x, y]) => {
                current = Some((*x, *y));
            }
            ("h", _) => {
                if let (Some(from), Some(to)) = (current, start) {
                    if from != to {
                        push(from, to, &ctm);
                    }
                }
                current = start;
            }
            ("re", [x, y, w, h]) => {
                let corners = [(*x, *y), (x + w, *y), (x + w, y + h), (*x, y + h), (*x, *y)];
                for pair in corners.windows(2) {
                    push(pair[0], pair[1], &ctm);
                }
                current = Some((*x, *y));
                start = current;
            }
            _ => {}
        }
    }
    segments
}
