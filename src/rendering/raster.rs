//! SVG to PNG conversion
//!
//! Every backend parses through [`SvgDocument`] so sizing and fit behave the
//! same whichever converter is selected.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use resvg::tiny_skia::{self, IntSize, Transform};
use resvg::usvg;
use serde::{Deserialize, Serialize};

use super::backends::{CanvasRasterizer, CompatCanvasRasterizer, ImageBufferRasterizer, ResvgRasterizer};
use crate::{Error, FontDescriptor, Logger, RenderOptions, Result};

/// Rasterizer backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConverterKind {
    #[default]
    #[serde(rename = "resvg")]
    Resvg,
    #[serde(rename = "vips-raster-lib", alias = "vips")]
    Vips,
    #[serde(rename = "canvas-raster-lib", alias = "skia-canvas")]
    Canvas,
    #[serde(rename = "canvas+svg-compat-lib", alias = "skia-canvas-canvg")]
    CanvasCompat,
}

impl ConverterKind {
    pub const ALL: [ConverterKind; 4] = [
        ConverterKind::Resvg,
        ConverterKind::Vips,
        ConverterKind::Canvas,
        ConverterKind::CanvasCompat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConverterKind::Resvg => "resvg",
            ConverterKind::Vips => "vips-raster-lib",
            ConverterKind::Canvas => "canvas-raster-lib",
            ConverterKind::CanvasCompat => "canvas+svg-compat-lib",
        }
    }
}

impl fmt::Display for ConverterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConverterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "resvg" => Ok(ConverterKind::Resvg),
            "vips-raster-lib" | "vips" => Ok(ConverterKind::Vips),
            "canvas-raster-lib" | "skia-canvas" => Ok(ConverterKind::Canvas),
            "canvas+svg-compat-lib" | "skia-canvas-canvg" => Ok(ConverterKind::CanvasCompat),
            other => Err(Error::ConfigError(format!("unknown converter: {}", other))),
        }
    }
}

/// Output sizing
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "camelCase")]
pub enum FitTo {
    /// Keep the document's own size
    #[default]
    Original,
    /// Scale to a width, keeping the aspect ratio
    Width(u32),
    /// Scale to a height, keeping the aspect ratio
    Height(u32),
    Zoom(f32),
}

impl FitTo {
    pub fn fit_size(&self, size: IntSize) -> Option<IntSize> {
        match *self {
            FitTo::Original => Some(size),
            FitTo::Width(w) => size.scale_to_width(w),
            FitTo::Height(h) => size.scale_to_height(h),
            FitTo::Zoom(z) => size.scale_by(z),
        }
    }
}

/// What a backend needs besides the SVG text
#[derive(Debug, Clone, Default)]
pub struct SizeHint {
    /// Size assumed for documents that declare none
    pub width: u32,
    pub height: u32,
    /// Fonts for documents that still carry `<text>` elements
    pub fonts: Vec<FontDescriptor>,
    pub fit_to: FitTo,
}

impl SizeHint {
    pub fn from_options(options: &RenderOptions) -> Self {
        Self {
            width: options.width,
            height: options.height,
            fonts: options.fonts.clone().unwrap_or_default(),
            fit_to: options.fit_to,
        }
    }
}

/// A parsed SVG together with its output size
pub struct SvgDocument {
    tree: usvg::Tree,
    size: IntSize,
    transform: Transform,
}

/// Whether the document still carries text for usvg to shape
fn has_text(data: &[u8]) -> bool {
    data.windows(5).any(|w| w == b"<text")
}

/// Parser options for `data`; hinted fonts only reach the font database
/// when there is text to shape
fn parse_options(data: &[u8], hint: &SizeHint) -> usvg::Options<'static> {
    let mut opt = usvg::Options::default();
    if let Some(size) = usvg::Size::from_wh(hint.width as f32, hint.height as f32) {
        opt.default_size = size;
    }
    if has_text(data) {
        for font in &hint.fonts {
            opt.fontdb_mut().load_font_data(font.data.to_vec());
        }
    }
    opt
}

impl SvgDocument {
    pub fn parse(data: &[u8], hint: &SizeHint) -> Result<Self> {
        let opt = parse_options(data, hint);
        let tree = usvg::Tree::from_data(data, &opt)
            .map_err(|e| Error::ConversionError(format!("Failed to parse SVG: {}", e)))?;

        let natural = tree.size().to_int_size();
        let size = hint.fit_to.fit_size(natural).ok_or_else(|| {
            Error::ConversionError(format!("Cannot fit {:?} with {:?}", natural, hint.fit_to))
        })?;
        let transform = Transform::from_scale(
            size.width() as f32 / tree.size().width(),
            size.height() as f32 / tree.size().height(),
        );

        Ok(Self {
            tree,
            size,
            transform,
        })
    }

    pub fn width(&self) -> u32 {
        self.size.width()
    }

    pub fn height(&self) -> u32 {
        self.size.height()
    }

    /// Render into `target`, scaled to the output size
    pub fn render(&self, target: &mut tiny_skia::PixmapMut<'_>) {
        resvg::render(&self.tree, self.transform, target);
    }

    /// Render into a fresh pixmap of the output size
    pub fn to_pixmap(&self) -> Result<tiny_skia::Pixmap> {
        let mut pixmap = new_pixmap(self.width(), self.height())?;
        self.render(&mut pixmap.as_mut());
        Ok(pixmap)
    }
}

pub(crate) fn new_pixmap(width: u32, height: u32) -> Result<tiny_skia::Pixmap> {
    tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
        Error::ConversionError(format!("Failed to allocate {}x{} pixmap", width, height))
    })
}

/// An SVG to PNG backend
pub trait Rasterizer: Send + Sync {
    fn kind(&self) -> ConverterKind;

    fn rasterize(&self, svg: &str, hint: &SizeHint) -> Result<Vec<u8>>;
}

/// Backends keyed by the converter they implement
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    backends: HashMap<ConverterKind, Arc<dyn Rasterizer>>,
}

impl ConverterRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the four built-in backends
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(ResvgRasterizer));
        registry.register(Arc::new(ImageBufferRasterizer));
        registry.register(Arc::new(CanvasRasterizer));
        registry.register(Arc::new(CompatCanvasRasterizer));
        registry
    }

    /// Add a backend, replacing any registered for the same converter
    pub fn register(&mut self, backend: Arc<dyn Rasterizer>) {
        self.backends.insert(backend.kind(), backend);
    }

    pub fn get(&self, kind: ConverterKind) -> Result<Arc<dyn Rasterizer>> {
        self.backends
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::ConversionError(format!("No rasterizer registered for {}", kind)))
    }
}

/// Dispatches conversions to the registered backends
#[derive(Clone, Default)]
pub struct RasterConverter {
    registry: ConverterRegistry,
}

impl RasterConverter {
    pub fn new(registry: ConverterRegistry) -> Self {
        Self { registry }
    }

    pub fn registry_mut(&mut self) -> &mut ConverterRegistry {
        &mut self.registry
    }

    /// Convert `svg` to PNG with the backend selected by `options.converter`
    pub async fn convert(&self, svg: &str, options: &RenderOptions, logger: &Logger) -> Result<Vec<u8>> {
        let backend = self.registry.get(options.converter)?;
        let hint = SizeHint::from_options(options);
        let svg = svg.to_owned();
        let start = Instant::now();

        let png = tokio::task::spawn_blocking(move || backend.rasterize(&svg, &hint))
            .await
            .map_err(|e| Error::ConversionError(format!("Rasterizer task failed: {}", e)))??;

        if options.show_log {
            logger(&format!(
                "svgToPng time: {}ms; converter:{}; png size: {}",
                start.elapsed().as_millis(),
                options.converter,
                png.len()
            ));
        }
        Ok(png)
    }
}
