//! Text and image watermarks
//!
//! Every page gets its original content wrapped in `q ... Q` followed by a
//! watermark stream drawn through a shared ExtGState, so the page's own
//! graphics state never leaks into the watermark.

use crate::document::{inherited_attribute, load, page_box, resolve, save, PageBox};
use crate::error::PdfOpsError;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegDecoder;
use image::{ColorType, DynamicImage, ExtendedColorType, GenericImageView, ImageDecoder, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use pdfsuite_core::options::{WatermarkKind, WatermarkOptions, WatermarkPosition};
use std::io::{Cursor, Write};

const GRAPHICS_STATE_NAME: &str = "GSWmk";
const FONT_NAME: &str = "FWmk";
const IMAGE_NAME: &str = "ImWmk";

/// Average Helvetica glyph width as a fraction of the font size
const GLYPH_WIDTH_RATIO: f32 = 0.5;
const MIN_FONT_SIZE: f32 = 6.0;
const MAX_FONT_SIZE: f32 = 300.0;

/// Parse a hex color string to RGB values (0-1)
fn parse_hex_color(color: &str) -> (f32, f32, f32) {
    let hex = color.trim_start_matches('#');
    if hex.len() >= 6 {
        let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0) as f32 / 255.0;
        let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0) as f32 / 255.0;
        let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0) as f32 / 255.0;
        (r, g, b)
    } else {
        (0.0, 0.0, 0.0)
    }
}

/// Anchor point of the watermark's center on the page
fn anchor(position: WatermarkPosition, page: PageBox) -> (f32, f32) {
    use WatermarkPosition::*;
    let fx = match position {
        TopLeft | CenterLeft | BottomLeft => 0.2,
        TopCenter | Center | BottomCenter => 0.5,
        TopRight | CenterRight | BottomRight => 0.8,
    };
    let fy = match position {
        TopLeft | TopCenter | TopRight => 0.85,
        CenterLeft | Center | CenterRight => 0.5,
        BottomLeft | BottomCenter | BottomRight => 0.15,
    };
    (page.x + page.width * fx, page.y + page.height * fy)
}

/// Helvetica with WinAnsiEncoding covers Latin-1; anything else becomes `?`
fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn real(value: f32) -> Object {
    Object::Real(value)
}

fn content_bytes(operations: Vec<Operation>) -> Result<Vec<u8>, PdfOpsError> {
    Content { operations }
        .encode()
        .map_err(|e| PdfOpsError::OperationError(format!("Failed to encode content: {}", e)))
}

/// An image XObject added to the document
struct EmbeddedImage {
    id: ObjectId,
    width: u32,
    height: u32,
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, PdfOpsError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| PdfOpsError::ImageError(format!("compression failed: {}", e)))
}

fn image_error(error: image::ImageError) -> PdfOpsError {
    PdfOpsError::ImageError(error.to_string())
}

/// Decoded pixels re-encoded as Flate streams, with an SMask when the image
/// carries alpha
fn embed_raster(doc: &mut Document, image: &DynamicImage) -> Result<EmbeddedImage, PdfOpsError> {
    let (width, height) = image.dimensions();
    let (color_space, color) = match image.color() {
        ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16 => {
            ("DeviceGray", image.to_luma8().into_raw())
        }
        _ => ("DeviceRGB", image.to_rgb8().into_raw()),
    };
    let alpha = image
        .color()
        .has_alpha()
        .then(|| image.to_rgba8().pixels().map(|pixel| pixel[3]).collect::<Vec<u8>>());

    let mut image_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };
    if let Some(alpha) = alpha {
        let smask_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(&alpha)?,
        ));
        image_dict.set("SMask", smask_id);
    }
    let id = doc.add_object(Stream::new(image_dict, deflate(&color)?));

    Ok(EmbeddedImage { id, width, height })
}

/// Gray and RGB JPEGs are stored as-is under DCTDecode; other layouts are
/// decoded and re-encoded
fn embed_jpeg(doc: &mut Document, bytes: &[u8]) -> Result<EmbeddedImage, PdfOpsError> {
    let decoder = JpegDecoder::new(Cursor::new(bytes)).map_err(image_error)?;
    let (width, height) = decoder.dimensions();
    let color_space = match decoder.original_color_type() {
        ExtendedColorType::L8 => "DeviceGray",
        ExtendedColorType::Rgb8 => "DeviceRGB",
        _ => {
            let image = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
                .map_err(image_error)?;
            return embed_raster(doc, &image);
        }
    };
    let id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        bytes.to_vec(),
    ));
    Ok(EmbeddedImage { id, width, height })
}

fn embed_image(doc: &mut Document, bytes: &[u8]) -> Result<EmbeddedImage, PdfOpsError> {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => {
            let image = image::load_from_memory_with_format(bytes, ImageFormat::Png)
                .map_err(image_error)?;
            embed_raster(doc, &image)
        }
        Ok(ImageFormat::Jpeg) => embed_jpeg(doc, bytes),
        _ => Err(PdfOpsError::ImageError("expected PNG or JPEG data".into())),
    }
}

/// What gets drawn on every page
enum Mark {
    Text { text: Vec<u8>, font_id: ObjectId },
    Image(EmbeddedImage),
}

impl Mark {
    fn operations(&self, options: &WatermarkOptions, page: PageBox) -> Vec<Operation> {
        let (ax, ay) = anchor(options.position, page);
        let theta = f32::from(options.rotation_degrees).to_radians();
        let (sin, cos) = theta.sin_cos();
        let scale = f32::from(options.size_percent) / 100.0;

        let mut ops = vec![
            Operation::new("q", vec![]),
            Operation::new("gs", vec![Object::Name(GRAPHICS_STATE_NAME.into())]),
        ];
        match self {
            Mark::Text { text, .. } => {
                let chars = text.len().max(1) as f32;
                let font_size = (page.width * scale / (GLYPH_WIDTH_RATIO * chars))
                    .clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
                // Offset of the text origin from its visual center, before rotation
                let half_width = GLYPH_WIDTH_RATIO * font_size * chars / 2.0;
                let half_height = 0.35 * font_size;
                let ox = ax - (half_width * cos - half_height * sin);
                let oy = ay - (half_width * sin + half_height * cos);
                let (r, g, b) = parse_hex_color(&options.color);

                ops.extend([
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![Object::Name(FONT_NAME.into()), real(font_size)]),
                    Operation::new("rg", vec![real(r), real(g), real(b)]),
                    Operation::new(
                        "Tm",
                        vec![real(cos), real(sin), real(-sin), real(cos), real(ox), real(oy)],
                    ),
                    Operation::new(
                        "Tj",
                        vec![Object::String(text.clone(), StringFormat::Literal)],
                    ),
                    Operation::new("ET", vec![]),
                ]);
            }
            Mark::Image(image) => {
                let width = page.width * scale;
                let height = width * image.height as f32 / image.width.max(1) as f32;
                ops.extend([
                    Operation::new(
                        "cm",
                        vec![real(cos), real(sin), real(-sin), real(cos), real(ax), real(ay)],
                    ),
                    Operation::new(
                        "cm",
                        vec![
                            real(width),
                            real(0.0),
                            real(0.0),
                            real(height),
                            real(-width / 2.0),
                            real(-height / 2.0),
                        ],
                    ),
                    Operation::new("Do", vec![Object::Name(IMAGE_NAME.into())]),
                ]);
            }
        }
        ops.push(Operation::new("Q", vec![]));
        ops
    }
}

/// Resolve a resource entry to an owned dictionary
fn owned_dictionary(doc: &Document, object: Option<&Object>) -> Dictionary {
    object
        .map(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

/// The page's effective resources plus the watermark's entries
fn page_resources(
    doc: &Document,
    page_id: ObjectId,
    gs_id: ObjectId,
    mark: &Mark,
) -> Dictionary {
    let inherited = inherited_attribute(doc, page_id, b"Resources");
    let mut resources = owned_dictionary(doc, inherited.as_ref());

    let mut graphics_states = owned_dictionary(doc, resources.get(b"ExtGState").ok());
    graphics_states.set(GRAPHICS_STATE_NAME, gs_id);
    resources.set("ExtGState", graphics_states);

    match mark {
        Mark::Text { font_id, .. } => {
            let mut fonts = owned_dictionary(doc, resources.get(b"Font").ok());
            fonts.set(FONT_NAME, *font_id);
            resources.set("Font", fonts);
        }
        Mark::Image(image) => {
            let mut xobjects = owned_dictionary(doc, resources.get(b"XObject").ok());
            xobjects.set(IMAGE_NAME, image.id);
            resources.set("XObject", xobjects);
        }
    }
    resources
}

fn existing_contents(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let contents = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .and_then(|page| page.get(b"Contents"))
        .ok();
    match contents.map(|c| resolve(doc, c)) {
        Some(Object::Array(items)) => items.clone(),
        Some(Object::Stream(_)) => contents.into_iter().cloned().collect(),
        _ => Vec::new(),
    }
}

/// Stamp a watermark onto every page
///
/// `image` carries the raw PNG or JPEG bytes for image watermarks.
pub fn watermark_document(
    bytes: &[u8],
    options: &WatermarkOptions,
    image: Option<&[u8]>,
) -> Result<Vec<u8>, PdfOpsError> {
    let mut doc = load(bytes)?;

    let mark = match options.kind {
        WatermarkKind::Text => {
            let text = options
                .text
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| PdfOpsError::OperationError("Watermark text is empty".into()))?;
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "Encoding" => "WinAnsiEncoding",
            });
            Mark::Text {
                text: encode_latin1(text),
                font_id,
            }
        }
        WatermarkKind::Image => {
            let data =
                image.ok_or_else(|| PdfOpsError::ImageError("no watermark image supplied".into()))?;
            Mark::Image(embed_image(&mut doc, data)?)
        }
    };

    let opacity = f32::from(options.opacity_percent) / 100.0;
    let gs_id = doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => real(opacity),
        "CA" => real(opacity),
    });
    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let restore_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));

    let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
    for page_id in page_ids {
        let page = page_box(&doc, page_id);
        let stamp = content_bytes(mark.operations(options, page))?;
        let stamp_id = doc.add_object(Stream::new(Dictionary::new(), stamp));
        let resources = page_resources(&doc, page_id, gs_id, &mark);

        let mut contents = vec![Object::Reference(save_id)];
        contents.extend(existing_contents(&doc, page_id));
        contents.push(Object::Reference(restore_id));
        contents.push(Object::Reference(stamp_id));

        match doc.get_object_mut(page_id) {
            Ok(Object::Dictionary(page_dict)) => {
                page_dict.set("Resources", resources);
                page_dict.set("Contents", contents);
            }
            _ => {
                return Err(PdfOpsError::OperationError(
                    "Page is not a dictionary".into(),
                ))
            }
        }
    }

    doc.compress();
    save(&mut doc)
}
