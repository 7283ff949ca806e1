//! Text and image watermarks
//!
//! The overlay is appended after the page's own content, inside its own
//! graphics state, with transparency set through an `ExtGState`. Placement
//! works in the page's visible box so cropped pages are watermarked where the
//! user can see it.

use crate::error::PdfSuiteError;
use crate::fonts::{FontSource, WatermarkFont};
use crate::page_tree::{
    add_resource, append_content, load, page_ids, save, visible_box, PageTarget,
};
use crate::placement::{place, rotation_matrix, Anchor, PageSize, Point, TextExtent};
use crate::template::{has_placeholders, render_page_text};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};

pub const DEFAULT_FONT_SIZE: f64 = 48.0;
pub const DEFAULT_COLOR: &str = "#808080";
pub const DEFAULT_OPACITY: f64 = 0.3;
pub const DEFAULT_ROTATION: f64 = 45.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextWatermark {
    /// May contain `{page}`, `{total}` and `{page:NN}`
    pub text: String,
    pub font_size: f64,
    /// `#rrggbb` or `#rgb`
    pub color: String,
    pub opacity: f64,
    /// Counter-clockwise, in degrees
    pub rotation: f64,
    pub anchor: Anchor,
    pub pages: PageTarget,
}

impl Default for TextWatermark {
    fn default() -> Self {
        Self {
            text: "CONFIDENTIAL".to_string(),
            font_size: DEFAULT_FONT_SIZE,
            color: DEFAULT_COLOR.to_string(),
            opacity: DEFAULT_OPACITY,
            rotation: DEFAULT_ROTATION,
            anchor: Anchor::CENTER,
            pages: PageTarget::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageWatermark {
    /// Drawn width in points; height follows the image's aspect ratio
    pub width: f64,
    pub opacity: f64,
    pub rotation: f64,
    pub anchor: Anchor,
    pub pages: PageTarget,
}

impl Default for ImageWatermark {
    fn default() -> Self {
        Self {
            width: 200.0,
            opacity: DEFAULT_OPACITY,
            rotation: 0.0,
            anchor: Anchor::CENTER,
            pages: PageTarget::All,
        }
    }
}

fn check_opacity(opacity: f64) -> Result<(), PdfSuiteError> {
    if !(0.0..=1.0).contains(&opacity) {
        return Err(PdfSuiteError::InvalidInput(
            "Opacity must be between 0 and 1".into(),
        ));
    }
    Ok(())
}

/// Parse `#rrggbb` or `#rgb` into RGB components in [0, 1].
pub fn parse_color(color: &str) -> Result<[f64; 3], PdfSuiteError> {
    let invalid = || PdfSuiteError::InvalidInput(format!("Invalid color \"{}\"", color));
    let hex = color.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return Err(invalid()),
    };
    let mut rgb = [0.0; 3];
    for (i, slot) in rgb.iter_mut().enumerate() {
        let byte = u8::from_str_radix(&expanded[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        *slot = byte as f64 / 255.0;
    }
    Ok(rgb)
}

fn install_opacity(doc: &mut Document, opacity: f64) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => Object::Real(opacity as f32),
        "CA" => Object::Real(opacity as f32),
    })
}

fn page_geometry(doc: &Document, page_id: ObjectId) -> ([f64; 4], PageSize) {
    let rect = visible_box(doc, page_id);
    let size = PageSize {
        width: rect[2] - rect[0],
        height: rect[3] - rect[1],
    };
    (rect, size)
}

fn reals(values: &[f64]) -> Vec<Object> {
    values.iter().map(|&v| Object::Real(v as f32)).collect()
}

fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

/// Stamp text on the targeted pages.
///
/// Fonts for text outside printable ASCII come from `fonts`.
pub fn watermark_text(
    bytes: &[u8],
    watermark: &TextWatermark,
    fonts: &dyn FontSource,
) -> Result<Vec<u8>, PdfSuiteError> {
    if watermark.text.trim().is_empty() {
        return Err(PdfSuiteError::InvalidInput(
            "Please enter watermark text".into(),
        ));
    }
    if watermark.font_size.is_nan() || watermark.font_size <= 0.0 {
        return Err(PdfSuiteError::InvalidInput(
            "Font size must be greater than zero".into(),
        ));
    }
    check_opacity(watermark.opacity)?;
    let color = parse_color(&watermark.color)?;

    let mut doc = load(bytes)?;
    let ids = page_ids(&doc);
    let total = ids.len();
    let targets = watermark.pages.indices(total)?;

    let texts: Vec<String> = if has_placeholders(&watermark.text) {
        targets
            .iter()
            .map(|&index| render_page_text(&watermark.text, index, total))
            .collect()
    } else {
        vec![watermark.text.clone(); targets.len()]
    };
    tracing::debug!(pages = targets.len(), "watermark text prepared");

    let font = WatermarkFont::for_texts(texts.iter().map(String::as_str), fonts)?;
    let font_id = font.install(&mut doc, texts.iter().map(String::as_str))?;
    let gs_id = install_opacity(&mut doc, watermark.opacity);
    let anchor = watermark.anchor.clamped();
    let descent = font.descent_at(watermark.font_size);
    let (sin, cos) = watermark.rotation.to_radians().sin_cos();

    for (&index, text) in targets.iter().zip(&texts) {
        let page_id = ids[index];
        let (rect, size) = page_geometry(&doc, page_id);
        let extent = font.extent(text, watermark.font_size)?;
        let corner = place(size, anchor, watermark.rotation, extent);

        // The extent's bottom edge is the descender line; lift to the baseline
        // along the rotated y axis and move into the box's coordinates.
        let baseline = Point {
            x: rect[0] + corner.x - descent * sin,
            y: rect[1] + corner.y + descent * cos,
        };

        let font_name = add_resource(&mut doc, page_id, b"Font", "WmF", font_id)?;
        let gs_name = add_resource(&mut doc, page_id, b"ExtGState", "WmGS", gs_id)?;

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new("gs", vec![name(&gs_name)]),
                Operation::new("rg", reals(&color)),
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![name(&font_name), Object::Real(watermark.font_size as f32)],
                ),
                Operation::new("Tm", reals(&rotation_matrix(baseline, watermark.rotation))),
                Operation::new("Tj", vec![font.encode(text)?]),
                Operation::new("ET", vec![]),
                Operation::new("Q", vec![]),
            ],
        };
        append_content(&mut doc, page_id, content.encode()?)?;
    }

    tracing::debug!(pages = targets.len(), "applied text watermark");
    save(doc)
}

/// Decoded PNG split into colour and alpha planes.
struct DecodedImage {
    width: u32,
    height: u32,
    color_space: &'static str,
    pixels: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

fn decode_png(data: &[u8]) -> Result<DecodedImage, PdfSuiteError> {
    let invalid = |e: png::DecodingError| {
        PdfSuiteError::InvalidInput(format!("Could not read watermark image: {}", e))
    };
    let mut decoder = png::Decoder::new(Cursor::new(data));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info().map_err(invalid)?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).map_err(invalid)?;
    buf.truncate(info.buffer_size());

    let split = |channels: usize| {
        let mut color = Vec::with_capacity(buf.len() / channels * (channels - 1));
        let mut alpha = Vec::with_capacity(buf.len() / channels);
        for px in buf.chunks_exact(channels) {
            color.extend_from_slice(&px[..channels - 1]);
            alpha.push(px[channels - 1]);
        }
        (color, alpha)
    };

    let (color_space, pixels, alpha) = match info.color_type {
        png::ColorType::Grayscale => ("DeviceGray", buf.clone(), None),
        png::ColorType::Rgb => ("DeviceRGB", buf.clone(), None),
        png::ColorType::GrayscaleAlpha => {
            let (c, a) = split(2);
            ("DeviceGray", c, Some(a))
        }
        png::ColorType::Rgba => {
            let (c, a) = split(4);
            ("DeviceRGB", c, Some(a))
        }
        png::ColorType::Indexed => {
            return Err(PdfSuiteError::InvalidInput(
                "Unsupported palette image".into(),
            ))
        }
    };

    Ok(DecodedImage {
        width: info.width,
        height: info.height,
        color_space,
        pixels,
        alpha,
    })
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, PdfSuiteError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| PdfSuiteError::OperationError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| PdfSuiteError::OperationError(e.to_string()))
}

fn image_stream(
    width: u32,
    height: u32,
    color_space: &str,
    data: &[u8],
    smask: Option<ObjectId>,
) -> Result<Stream, PdfSuiteError> {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => name(color_space),
        "BitsPerComponent" => 8_i64,
        "Filter" => "FlateDecode",
    };
    if let Some(id) = smask {
        dict.set("SMask", Object::Reference(id));
    }
    Ok(Stream::new(dict, deflate(data)?).with_compression(false))
}

/// Stamp a PNG on the targeted pages.
pub fn watermark_image(
    bytes: &[u8],
    png_data: &[u8],
    watermark: &ImageWatermark,
) -> Result<Vec<u8>, PdfSuiteError> {
    if watermark.width.is_nan() || watermark.width <= 0.0 {
        return Err(PdfSuiteError::InvalidInput(
            "Image width must be greater than zero".into(),
        ));
    }
    check_opacity(watermark.opacity)?;
    let image = decode_png(png_data)?;
    if image.width == 0 || image.height == 0 {
        return Err(PdfSuiteError::InvalidInput("Watermark image is empty".into()));
    }

    let mut doc = load(bytes)?;
    let ids = page_ids(&doc);
    let targets = watermark.pages.indices(ids.len())?;

    let smask_id = match &image.alpha {
        Some(alpha) => Some(doc.add_object(image_stream(
            image.width,
            image.height,
            "DeviceGray",
            alpha,
            None,
        )?)),
        None => None,
    };
    let image_id = doc.add_object(image_stream(
        image.width,
        image.height,
        image.color_space,
        &image.pixels,
        smask_id,
    )?);
    let gs_id = install_opacity(&mut doc, watermark.opacity);

    let extent = TextExtent {
        width: watermark.width,
        height: watermark.width * image.height as f64 / image.width as f64,
    };
    let anchor = watermark.anchor.clamped();

    for &index in &targets {
        let page_id = ids[index];
        let (rect, size) = page_geometry(&doc, page_id);
        let corner = place(size, anchor, watermark.rotation, extent);
        let origin = Point {
            x: rect[0] + corner.x,
            y: rect[1] + corner.y,
        };

        let image_name = add_resource(&mut doc, page_id, b"XObject", "WmIm", image_id)?;
        let gs_name = add_resource(&mut doc, page_id, b"ExtGState", "WmGS", gs_id)?;

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new("gs", vec![name(&gs_name)]),
                Operation::new("cm", reals(&rotation_matrix(origin, watermark.rotation))),
                Operation::new(
                    "cm",
                    reals(&[extent.width, 0.0, 0.0, extent.height, 0.0, 0.0]),
                ),
                Operation::new("Do", vec![name(&image_name)]),
                Operation::new("Q", vec![]),
            ],
        };
        append_content(&mut doc, page_id, content.encode()?)?;
    }

    tracing::debug!(
        pages = targets.len(),
        width = image.width,
        height = image.height,
        "applied image watermark"
    );
    save(doc)
}
