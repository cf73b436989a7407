//! Built-in rasterizer backends.
//!
//! All four render with resvg. They differ in how the document is loaded and
//! how pixels are encoded.

use std::borrow::Cow;
use std::io::Cursor;
use std::sync::OnceLock;

use regex::Regex;
use resvg::tiny_skia::{Pixmap, PixmapPaint, Transform};

use super::raster::{new_pixmap, ConverterKind, Rasterizer, SizeHint, SvgDocument};
use crate::{Error, Result};

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

fn conversion_error(e: impl std::fmt::Display) -> Error {
    Error::ConversionError(e.to_string())
}

/// Straight (non-premultiplied) RGBA bytes of a pixmap
pub fn demultiply(pixmap: &Pixmap) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    rgba
}

/// Encode straight RGBA pixels with the `png` crate
fn encode_with_png(width: u32, height: u32, rgba: &[u8]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buf, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().map_err(conversion_error)?;
        writer.write_image_data(rgba).map_err(conversion_error)?;
        writer.finish().map_err(conversion_error)?;
    }
    Ok(buf)
}

/// Render with resvg and encode with tiny-skia's own PNG encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct ResvgRasterizer;

impl Rasterizer for ResvgRasterizer {
    fn kind(&self) -> ConverterKind {
        ConverterKind::Resvg
    }

    fn rasterize(&self, svg: &str, hint: &SizeHint) -> Result<Vec<u8>> {
        let doc = SvgDocument::parse(svg.as_bytes(), hint)?;
        let pixmap = doc.to_pixmap()?;
        pixmap.encode_png().map_err(conversion_error)
    }
}

/// Render into an image buffer and save through the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageBufferRasterizer;

impl Rasterizer for ImageBufferRasterizer {
    fn kind(&self) -> ConverterKind {
        ConverterKind::Vips
    }

    fn rasterize(&self, svg: &str, hint: &SizeHint) -> Result<Vec<u8>> {
        let doc = SvgDocument::parse(svg.as_bytes(), hint)?;
        let pixmap = doc.to_pixmap()?;

        let img = image::RgbaImage::from_raw(doc.width(), doc.height(), demultiply(&pixmap))
            .ok_or_else(|| Error::ConversionError("Pixel buffer size mismatch".into()))?;
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .map_err(conversion_error)?;
        Ok(out.into_inner())
    }
}

/// Load the SVG as an image and draw it onto an off-screen canvas
#[derive(Debug, Clone, Copy, Default)]
pub struct CanvasRasterizer;

impl Rasterizer for CanvasRasterizer {
    fn kind(&self) -> ConverterKind {
        ConverterKind::Canvas
    }

    fn rasterize(&self, svg: &str, hint: &SizeHint) -> Result<Vec<u8>> {
        let doc = SvgDocument::parse(svg.as_bytes(), hint)?;
        let image = doc.to_pixmap()?;

        let mut canvas = new_pixmap(image.width(), image.height())?;
        canvas.draw_pixmap(
            0,
            0,
            image.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        encode_with_png(canvas.width(), canvas.height(), &demultiply(&canvas))
    }
}

/// Canvas backend preceded by a pass that repairs SVG dialects the parser
/// rejects
#[derive(Debug, Clone, Copy, Default)]
pub struct CompatCanvasRasterizer;

impl Rasterizer for CompatCanvasRasterizer {
    fn kind(&self) -> ConverterKind {
        ConverterKind::CanvasCompat
    }

    fn rasterize(&self, svg: &str, hint: &SizeHint) -> Result<Vec<u8>> {
        let svg = svg_compat(svg);
        let doc = SvgDocument::parse(svg.as_bytes(), hint)?;

        let mut canvas = new_pixmap(doc.width(), doc.height())?;
        doc.render(&mut canvas.as_mut());
        encode_with_png(canvas.width(), canvas.height(), &demultiply(&canvas))
    }
}

static DOCTYPE: OnceLock<Regex> = OnceLock::new();
static SVG_OPEN: OnceLock<Regex> = OnceLock::new();

/// Strip a DOCTYPE and add missing SVG/xlink namespace declarations
pub fn svg_compat(svg: &str) -> Cow<'_, str> {
    let doctype = DOCTYPE.get_or_init(|| Regex::new(r"(?is)<!DOCTYPE[^>\[]*(\[[^\]]*\])?\s*>").unwrap());
    let svg_open = SVG_OPEN.get_or_init(|| Regex::new(r"<svg\b[^>]*>").unwrap());

    let mut out = doctype.replace_all(svg, "");

    if let Some(tag) = svg_open.find(&out) {
        let tag_str = tag.as_str();
        let mut extra = String::new();
        if !tag_str.contains("xmlns=") {
            extra.push_str(&format!(" xmlns=\"{}\"", SVG_NS));
        }
        if out.contains("xlink:") && !tag_str.contains("xmlns:xlink") {
            extra.push_str(&format!(" xmlns:xlink=\"{}\"", XLINK_NS));
        }
        if !extra.is_empty() {
            let at = tag.start() + "<svg".len();
            let mut fixed = String::with_capacity(out.len() + extra.len());
            fixed.push_str(&out[..at]);
            fixed.push_str(&extra);
            fixed.push_str(&out[at..]);
            out = Cow::Owned(fixed);
        }
    }
    out
}
