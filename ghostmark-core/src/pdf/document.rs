//! Page writer over an in-memory `lopdf` document.
//!
//! Codecs never edit content streams directly. They describe what to add to a page as a
//! [`PageOverlay`]; [`PdfDocument::apply`] evaluates a page transform over every page and
//! appends the resulting overlays in one pass. Existing content is wrapped in `q`/`Q` so the
//! overlay always starts from the default graphics state.

use crate::error::{GhostmarkError, Result};
use crate::pdf::path::LineSegment;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::GrayImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream, StringFormat};
use std::io::Write;

/// Resource name of the Helvetica font used by every overlay
pub const OVERLAY_FONT: &str = "GmHelv";

const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Position and size of one page in default user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// Zero based page index
    pub index: usize,
    pub count: usize,
    pub origin_x: f32,
    pub origin_y: f32,
    pub width: f32,
    pub height: f32,
}

impl PageGeometry {
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.count
    }

    pub fn top(&self) -> f32 {
        self.origin_y + self.height
    }

    pub fn right(&self) -> f32 {
        self.origin_x + self.width
    }
}

/// An image XObject stored once in the document and shared by all pages that draw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHandle {
    name: String,
    id: ObjectId,
}

impl ImageHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One glyph run positioned in absolute page coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
}

/// Content to append on top of a page
#[derive(Debug, Clone, Default)]
pub struct PageOverlay {
    operations: Vec<Operation>,
    uses_font: bool,
    images: Vec<ImageHandle>,
}

impl PageOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Draw a single line of Helvetica text with its baseline at (x, y)
    pub fn text(&mut self, text: &str, x: f32, y: f32, font_size: f32, color: [u8; 3]) -> &mut Self {
        self.text_object(
            color,
            [PlacedText {
                text: text.to_string(),
                x,
                y,
                font_size,
            }],
        )
    }

    /// Draw several runs inside one text object. Each run is placed with its own `Tm`,
    /// and `Tf` is only emitted when the size changes.
    pub fn text_object<I>(&mut self, color: [u8; 3], runs: I) -> &mut Self
    where
        I: IntoIterator<Item = PlacedText>,
    {
        let mut ops = vec![Operation::new("BT", vec![]), color_operation("rg", color)];
        let mut current_size: Option<f32> = None;

        for run in runs {
            if current_size != Some(run.font_size) {
                ops.push(Operation::new(
                    "Tf",
                    vec![
                        Object::Name(OVERLAY_FONT.as_bytes().to_vec()),
                        Object::Real(run.font_size),
                    ],
                ));
                current_size = Some(run.font_size);
            }
            ops.push(Operation::new(
                "Tm",
                vec![
                    Object::Real(1.0),
                    Object::Real(0.0),
                    Object::Real(0.0),
                    Object::Real(1.0),
                    Object::Real(run.x),
                    Object::Real(run.y),
                ],
            ));
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(
                    encode_win_ansi(&run.text),
                    StringFormat::Hexadecimal,
                )],
            ));
        }

        ops.push(Operation::new("ET", vec![]));
        // An object without runs is just BT, rg, ET
        if ops.len() > 3 {
            self.operations.extend(ops);
            self.uses_font = true;
        }
        self
    }

    /// Stroke straight segments as one path
    pub fn lines(&mut self, segments: &[LineSegment], width: f32, color: [u8; 3]) -> &mut Self {
        if segments.is_empty() {
            return self;
        }
        self.operations.push(Operation::new("q", vec![]));
        self.operations
            .push(Operation::new("w", vec![Object::Real(width)]));
        self.operations.push(color_operation("RG", color));
        for segment in segments {
            self.operations.push(Operation::new(
                "m",
                vec![Object::Real(segment.x0), Object::Real(segment.y0)],
            ));
            self.operations.push(Operation::new(
                "l",
                vec![Object::Real(segment.x1), Object::Real(segment.y1)],
            ));
        }
        self.operations.push(Operation::new("S", vec![]));
        self.operations.push(Operation::new("Q", vec![]));
        self
    }

    /// Draw a registered image scaled to `width` x `height` with its lower-left corner at (x, y)
    pub fn image(&mut self, handle: &ImageHandle, x: f32, y: f32, width: f32, height: f32) -> &mut Self {
        self.operations.push(Operation::new("q", vec![]));
        self.operations.push(Operation::new(
            "cm",
            vec![
                Object::Real(width),
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(height),
                Object::Real(x),
                Object::Real(y),
            ],
        ));
        self.operations.push(Operation::new(
            "Do",
            vec![Object::Name(handle.name.as_bytes().to_vec())],
        ));
        self.operations.push(Operation::new("Q", vec![]));
        if !self.images.contains(handle) {
            self.images.push(handle.clone());
        }
        self
    }
}

/// `rg` for fills, `RG` for strokes
fn color_operation(operator: &str, color: [u8; 3]) -> Operation {
    Operation::new(
        operator,
        color
            .iter()
            .map(|c| Object::Real(f32::from(*c) / 255.0))
            .collect(),
    )
}

/// Latin-1 characters map onto WinAnsi for the printable range we emit; anything else becomes '?'
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            code @ 0x20..=0x7E | code @ 0xA0..=0xFF => code as u8,
            _ => b'?',
        })
        .collect()
}

/// Where a page's resource dictionary lives
enum ResourceSlot {
    Shared(ObjectId),
    Inline,
}

/// A loaded PDF owned by the codec currently transforming it
#[derive(Debug)]
pub struct PdfDocument {
    inner: lopdf::Document,
    font_id: Option<ObjectId>,
    image_count: usize,
}

impl PdfDocument {
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let inner = lopdf::Document::load_mem(bytes)
            .map_err(|e| GhostmarkError::RenderingFailure(format!("failed to parse PDF: {e}")))?;
        Ok(Self {
            inner,
            font_id: None,
            image_count: 0,
        })
    }

    pub fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }

    fn page_ids(&self) -> Vec<ObjectId> {
        self.inner.get_pages().into_values().collect()
    }

    /// Geometry of every page in document order
    pub fn pages(&self) -> Vec<PageGeometry> {
        let ids = self.page_ids();
        let count = ids.len();
        ids.iter()
            .enumerate()
            .map(|(index, id)| {
                let [x0, y0, x1, y1] = self.media_box(*id);
                PageGeometry {
                    index,
                    count,
                    origin_x: x0.min(x1),
                    origin_y: y0.min(y1),
                    width: (x1 - x0).abs(),
                    height: (y1 - y0).abs(),
                }
            })
            .collect()
    }

    pub fn page(&self, index: usize) -> Option<PageGeometry> {
        self.pages().into_iter().nth(index)
    }

    pub fn last_page(&self) -> Option<PageGeometry> {
        self.pages().pop()
    }

    fn media_box(&self, page_id: ObjectId) -> [f32; 4] {
        let Some(object) = self.inherited(page_id, b"MediaBox") else {
            return DEFAULT_MEDIA_BOX;
        };
        let Ok(values) = object.as_array() else {
            return DEFAULT_MEDIA_BOX;
        };
        let numbers: Vec<f32> = values
            .iter()
            .filter_map(|v| self.resolve(v).as_float().ok())
            .collect();
        match numbers.as_slice() {
            [x0, y0, x1, y1] if (x1 - x0).abs() > 0.0 && (y1 - y0).abs() > 0.0 => {
                [*x0, *y0, *x1, *y1]
            }
            _ => DEFAULT_MEDIA_BOX,
        }
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        match object {
            Object::Reference(id) => self.inner.get_object(*id).unwrap_or(object),
            other => other,
        }
    }

    /// Look up an inheritable page attribute, walking the /Parent chain
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<Object> {
        let mut current = Some(page_id);
        let mut depth = 0;
        while let Some(id) = current {
            let dict = self.inner.get_dictionary(id).ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(self.resolve(value).clone());
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok();
            depth += 1;
            if depth > 64 {
                return None;
            }
        }
        None
    }

    /// Store a grayscale image as a Flate compressed XObject
    pub fn add_image(&mut self, image: &GrayImage) -> Result<ImageHandle> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(image.as_raw())?;
        let data = encoder.finish()?;

        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(image.width()),
            "Height" => i64::from(image.height()),
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };
        let id = self.inner.add_object(Stream::new(dict, data));
        self.image_count += 1;
        Ok(ImageHandle {
            name: format!("GmImg{}", self.image_count),
            id,
        })
    }

    fn font_id(&mut self) -> ObjectId {
        if let Some(id) = self.font_id {
            return id;
        }
        let id = self.inner.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        self.font_id = Some(id);
        id
    }

    /// Evaluate `transform` for every page and append the overlays it produces.
    /// Returns the number of pages that received an overlay.
    pub fn apply<F>(&mut self, mut transform: F) -> Result<usize>
    where
        F: FnMut(&PageGeometry) -> Option<PageOverlay>,
    {
        let ids = self.page_ids();
        let overlays: Vec<(ObjectId, PageOverlay)> = self
            .pages()
            .iter()
            .zip(ids)
            .filter_map(|(geometry, id)| transform(geometry).map(|overlay| (id, overlay)))
            .filter(|(_, overlay)| !overlay.is_empty())
            .collect();

        let touched = overlays.len();
        for (page_id, overlay) in overlays {
            self.append_overlay(page_id, overlay)?;
        }
        Ok(touched)
    }

    fn append_overlay(&mut self, page_id: ObjectId, overlay: PageOverlay) -> Result<()> {
        if overlay.uses_font {
            let font_id = self.font_id();
            self.register_resource(page_id, b"Font", OVERLAY_FONT, font_id)?;
        }
        for image in &overlay.images {
            self.register_resource(page_id, b"XObject", &image.name, image.id)?;
        }

        let existing = self.content_refs(page_id)?;
        let mut contents = Vec::with_capacity(existing.len() + 2);
        if !existing.is_empty() {
            let save = self.add_content(vec![Operation::new("q", vec![])])?;
            contents.push(Object::Reference(save));
            contents.extend(existing);
        }

        let mut operations = Vec::with_capacity(overlay.operations.len() + 1);
        if contents.len() > 1 {
            operations.push(Operation::new("Q", vec![]));
        }
        operations.extend(overlay.operations);
        let overlay_id = self.add_content(operations)?;
        contents.push(Object::Reference(overlay_id));

        self.inner
            .get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Contents", Object::Array(contents));
        Ok(())
    }

    fn add_content(&mut self, operations: Vec<Operation>) -> Result<ObjectId> {
        let bytes = Content { operations }.encode()?;
        Ok(self.inner.add_object(Stream::new(Dictionary::new(), bytes)))
    }

    /// Current /Contents of a page flattened into a list of stream references
    fn content_refs(&self, page_id: ObjectId) -> Result<Vec<Object>> {
        let page = self.inner.get_dictionary(page_id)?;
        let refs = match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match self.inner.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        Ok(refs)
    }

    fn register_resource(
        &mut self,
        page_id: ObjectId,
        category: &[u8],
        name: &str,
        target: ObjectId,
    ) -> Result<()> {
        let page = self.inner.get_dictionary(page_id)?;
        let (slot, mut resources) = match page.get(b"Resources") {
            Ok(Object::Reference(id)) => (
                ResourceSlot::Shared(*id),
                self.inner.get_dictionary(*id)?.clone(),
            ),
            Ok(Object::Dictionary(dict)) => (ResourceSlot::Inline, dict.clone()),
            _ => {
                let inherited = match self.inherited(page_id, b"Resources") {
                    Some(Object::Dictionary(dict)) => dict,
                    _ => Dictionary::new(),
                };
                (ResourceSlot::Inline, inherited)
            }
        };

        let mut entries = match resources.get(category) {
            Ok(Object::Reference(id)) => self
                .inner
                .get_dictionary(*id)
                .map(Dictionary::clone)
                .unwrap_or_else(|_| Dictionary::new()),
            Ok(Object::Dictionary(dict)) => dict.clone(),
            _ => Dictionary::new(),
        };
        entries.set(name, Object::Reference(target));
        resources.set(category.to_vec(), Object::Dictionary(entries));

        match slot {
            ResourceSlot::Shared(id) => {
                *self.inner.get_object_mut(id)? = Object::Dictionary(resources);
            }
            ResourceSlot::Inline => {
                self.inner
                    .get_object_mut(page_id)?
                    .as_dict_mut()?
                    .set("Resources", Object::Dictionary(resources));
            }
        }
        Ok(())
    }

    /// Decoded content operations of one page, stream by stream
    pub fn page_operations(&self, index: usize) -> Result<Vec<Operation>> {
        let page_id = self.page_ids().get(index).copied().ok_or_else(|| {
            GhostmarkError::RenderingFailure(format!("page {} does not exist", index + 1))
        })?;

        let mut operations = Vec::new();
        for stream_id in self.inner.get_page_contents(page_id) {
            let Ok(Object::Stream(stream)) = self.inner.get_object(stream_id) else {
                continue;
            };
            let data = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            operations.extend(Content::decode(&data)?.operations);
        }
        Ok(operations)
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.inner.save_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Build a document of `page_count` pages, each carrying one line of body text
    pub fn blank(page_count: usize, width: f32, height: f32) -> Result<Vec<u8>> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::with_capacity(page_count);
        for number in 1..=page_count {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), Object::Real(12.0)]),
                    Operation::new(
                        "Td",
                        vec![Object::Real(72.0), Object::Real(height / 2.0)],
                    ),
                    Operation::new(
                        "Tj",
                        vec![Object::string_literal(format!("Page {number} of {page_count}"))],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), Object::Real(width), Object::Real(height)],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)?;
        Ok(buffer)
    }
}
