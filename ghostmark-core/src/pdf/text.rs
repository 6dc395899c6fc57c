//! Text span extraction from page content streams
//!
//! Runs the text-state machine (BT/ET, Tm/Td/TD/T*, Tf, q/Q/cm) over the decoded operations
//! of a page and reports, for every text object, the spans it shows together with their
//! effective font size and bounding box in default user space.

use crate::error::Result;
use crate::pdf::document::PdfDocument;
use crate::pdf::metrics;
use lopdf::content::Operation;
use lopdf::Object;

pub(crate) const IDENTITY: [f64; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Axis aligned box in page coordinates (y grows upward)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    fn union(self, other: BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// A run of text sharing one font size and baseline
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    /// Font size after applying the text and graphics matrices
    pub font_size: f32,
    pub bbox: BoundingBox,
}

impl TextSpan {
    pub fn non_space_count(&self) -> usize {
        self.text.chars().filter(|c| *c != ' ').count()
    }
}

/// Spans shown inside one BT/ET text object
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub spans: Vec<TextSpan>,
    pub bbox: BoundingBox,
}

impl TextBlock {
    fn from_spans(spans: Vec<TextSpan>) -> Option<Self> {
        let bbox = spans.iter().map(|s| s.bbox).reduce(BoundingBox::union)?;
        Some(Self { spans, bbox })
    }
}

#[derive(Debug, Clone)]
struct TextState {
    text_matrix: [f64; 6],
    text_line_matrix: [f64; 6],
    ctm: [f64; 6],
    leading: f64,
    char_space: f64,
    word_space: f64,
    horizontal_scale: f64,
    text_rise: f64,
    font_size: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            text_matrix: IDENTITY,
            text_line_matrix: IDENTITY,
            ctm: IDENTITY,
            leading: 0.0,
            char_space: 0.0,
            word_space: 0.0,
            horizontal_scale: 100.0,
            text_rise: 0.0,
            font_size: 0.0,
        }
    }
}

impl TextState {
    fn move_line(&mut self, tx: f64, ty: f64) {
        let matrix = multiply_matrix(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.text_line_matrix);
        self.text_matrix = matrix;
        self.text_line_matrix = matrix;
    }

    fn advance(&mut self, tx: f64) {
        self.text_matrix = multiply_matrix(&[1.0, 0.0, 0.0, 1.0, tx, 0.0], &self.text_matrix);
    }
}

/// Reads positioned text spans out of a page
#[derive(Debug)]
pub struct SpanReader {
    /// Baselines closer than this are merged into the same span
    baseline_tolerance: f32,
}

impl SpanReader {
    pub fn new() -> Self {
        Self {
            baseline_tolerance: 0.5,
        }
    }

    pub fn with_baseline_tolerance(baseline_tolerance: f32) -> Self {
        Self { baseline_tolerance }
    }

    pub fn read_page(&self, document: &PdfDocument, index: usize) -> Result<Vec<TextBlock>> {
        let operations = document.page_operations(index)?;
        Ok(self.read_operations(&operations))
    }

    pub fn read_operations(&self, operations: &[Operation]) -> Vec<TextBlock> {
        let mut blocks = Vec::new();
        let mut spans: Vec<TextSpan> = Vec::new();
        let mut state = TextState::default();
        let mut saved: Vec<TextState> = Vec::new();
        let mut in_text_object = false;

        for op in operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => saved.push(state.clone()),
                "Q" => {
                    // text parameters belong to the graphics state, the text matrices do not
                    if let Some(previous) = saved.pop() {
                        state = TextState {
                            text_matrix: state.text_matrix,
                            text_line_matrix: state.text_line_matrix,
                            ..previous
                        };
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_operands(operands) {
                        state.ctm = multiply_matrix(&m, &state.ctm);
                    }
                }
                "BT" => {
                    in_text_object = true;
                    state.text_matrix = IDENTITY;
                    state.text_line_matrix = IDENTITY;
                }
                "ET" => {
                    in_text_object = false;
                    blocks.extend(TextBlock::from_spans(std::mem::take(&mut spans)));
                }
                "Tm" => {
                    if let Some(m) = matrix_operands(operands) {
                        state.text_matrix = m;
                        state.text_line_matrix = m;
                    }
                }
                "Td" => state.move_line(number(operands, 0), number(operands, 1)),
                "TD" => {
                    state.leading = -number(operands, 1);
                    state.move_line(number(operands, 0), number(operands, 1));
                }
                "T*" => state.move_line(0.0, -state.leading),
                "TL" => state.leading = number(operands, 0),
                "Tc" => state.char_space = number(operands, 0),
                "Tw" => state.word_space = number(operands, 0),
                "Tz" => state.horizontal_scale = number(operands, 0),
                "Ts" => state.text_rise = number(operands, 0),
                "Tf" => state.font_size = number(operands, 1),
                "Tj" if in_text_object => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(&mut state, bytes, &mut spans);
                    }
                }
                "'" if in_text_object => {
                    state.move_line(0.0, -state.leading);
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(&mut state, bytes, &mut spans);
                    }
                }
                "\"" if in_text_object => {
                    state.word_space = number(operands, 0);
                    state.char_space = number(operands, 1);
                    state.move_line(0.0, -state.leading);
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        self.show(&mut state, bytes, &mut spans);
                    }
                }
                "TJ" if in_text_object => {
                    let Some(Object::Array(items)) = operands.first() else {
                        continue;
                    };
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show(&mut state, bytes, &mut spans),
                            other => {
                                if let Ok(adjustment) = other.as_float() {
                                    let tx = -f64::from(adjustment) / 1000.0
                                        * state.font_size
                                        * state.horizontal_scale
                                        / 100.0;
                                    state.advance(tx);
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        blocks.extend(TextBlock::from_spans(spans));
        blocks
    }

    fn show(&self, state: &mut TextState, bytes: &[u8], spans: &mut Vec<TextSpan>) {
        let text: String = bytes.iter().map(|b| char::from(*b)).collect();
        if text.is_empty() {
            return;
        }

        let rendering = multiply_matrix(&state.text_matrix, &state.ctm);
        let vertical_scale = rendering[2].hypot(rendering[3]);
        let horizontal_scale = rendering[0].hypot(rendering[1]);
        let font_size = (state.font_size * vertical_scale) as f32;

        let glyph_advance = f64::from(metrics::text_width(&text, 1.0)) * state.font_size;
        let spacing = state.char_space * text.chars().count() as f64
            + state.word_space * text.chars().filter(|c| *c == ' ').count() as f64;
        let advance = (glyph_advance + spacing) * state.horizontal_scale / 100.0;

        let (x, y) = transform_point(0.0, state.text_rise, &rendering);
        let width = (advance * horizontal_scale) as f32;
        let bbox = BoundingBox {
            x0: x as f32,
            y0: y as f32,
            x1: x as f32 + width,
            y1: y as f32 + font_size,
        };

        match spans.last_mut() {
            Some(last)
                if (last.font_size - font_size).abs() < 1e-3
                    && (last.bbox.y0 - bbox.y0).abs() < self.baseline_tolerance =>
            {
                last.text.push_str(&text);
                last.bbox = last.bbox.union(bbox);
            }
            _ => spans.push(TextSpan {
                text,
                font_size,
                bbox,
            }),
        }

        state.advance(advance);
    }
}

impl Default for SpanReader {
    fn default() -> Self {
        Self::new()
    }
}

fn number(operands: &[Object], index: usize) -> f64 {
    operands
        .get(index)
        .and_then(|o| o.as_float().ok())
        .map(f64::from)
        .unwrap_or(0.0)
}

fn matrix_operands(operands: &[Object]) -> Option<[f64; 6]> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = [0.0; 6];
    for (slot, operand) in m.iter_mut().zip(operands) {
        *slot = f64::from(operand.as_float().ok()?);
    }
    Some(m)
}

/// Multiply two transformation matrices
pub(crate) fn multiply_matrix(a: &[f64; 6], b: &[f64; 6]) -> [f64; 6] {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

/// Transform a point using a transformation matrix
pub(crate) fn transform_point(x: f64, y: f64, matrix: &[f64; 6]) -> (f64, f64) {
    let tx = matrix[0] * x + matrix[2] * y + matrix[4];
    let ty = matrix[1] * x + matrix[3] * y + matrix[5];
    (tx, ty)
}
