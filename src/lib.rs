//! ogrender
//!
//! Renders styled element trees (JSX/HTML-derived) to SVG and rasterizes the
//! SVG to PNG, fetching fallback fonts and emoji images on demand.
//!
//! # Pipeline
//!
//! - **Layout**: a [`LayoutEngine`] turns the tree into SVG. Whenever it meets
//!   text none of the configured fonts can render, it asks the
//!   [`AssetResolver`] for an emoji image or a web font subset.
//! - **Assets**: requests are memoised per `(emoji style, code, text)` and
//!   identical in-flight requests share one download.
//! - **Rasterization**: the SVG is converted by one of several interchangeable
//!   backends selected with [`RenderOptions::converter`].
//!
//! # Example
//!
//! ```no_run
//! use ogrender::{Element, Engine, EngineConfig, RenderOptions};
//!
//! # async fn run() -> ogrender::Result<()> {
//! let engine = Engine::init(EngineConfig::default()).await?;
//! let tree = Element::new("div")
//!     .with_style("backgroundColor", "#fff")
//!     .with_style("fontSize", 48.0)
//!     .with_child("Hello 👋 世界");
//! let png = engine.render_png(&tree, &RenderOptions::default()).await?;
//! assert!(!png.is_empty());
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod error;
pub use error::{Error, Result};

pub mod assets;
pub mod element;
pub mod emoji;
pub mod engine;
pub mod rendering;
pub mod script;

// HTML front end producing element trees
#[cfg(feature = "html")]
pub mod html;

pub use assets::{Asset, AssetLoader, AssetResolver};
pub use element::{Element, Node, StyleValue};
pub use emoji::EmojiStyle;
pub use engine::{Engine, EngineConfig};
pub use rendering::raster::{ConverterKind, FitTo};
pub use rendering::{LayoutEngine, LayoutOptions};

/// Diagnostic sink for timing telemetry (`show_log`)
pub type Logger = Arc<dyn Fn(&str) + Send + Sync>;

/// Logger forwarding to the `log` facade at info level
pub fn default_logger() -> Logger {
    Arc::new(|msg: &str| log::info!("{}", msg))
}

/// Font weight, 100 through 900 in steps of 100
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct FontWeight(u16);

impl FontWeight {
    pub const NORMAL: FontWeight = FontWeight(400);
    pub const BOLD: FontWeight = FontWeight(700);

    pub fn new(weight: u16) -> Result<Self> {
        if (100..=900).contains(&weight) && weight % 100 == 0 {
            Ok(FontWeight(weight))
        } else {
            Err(Error::ConfigError(format!("invalid font weight: {}", weight)))
        }
    }

    pub fn value(self) -> u16 {
        self.0
    }
}

impl Default for FontWeight {
    fn default() -> Self {
        FontWeight::NORMAL
    }
}

impl TryFrom<u16> for FontWeight {
    type Error = Error;

    fn try_from(weight: u16) -> Result<Self> {
        FontWeight::new(weight)
    }
}

impl From<FontWeight> for u16 {
    fn from(weight: FontWeight) -> Self {
        weight.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// A font made available to the layout engine.
///
/// Caller-supplied fonts and the synthetic descriptors created for fetched
/// subsets share this type. Fallback matching identifies fonts by
/// `(name, lang)`.
#[derive(Clone, PartialEq)]
pub struct FontDescriptor {
    pub name: String,
    pub data: Arc<[u8]>,
    pub weight: FontWeight,
    pub style: FontStyle,
    /// Script code the font is meant for
    pub lang: Option<String>,
}

impl FontDescriptor {
    pub fn new(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            weight: FontWeight::NORMAL,
            style: FontStyle::Normal,
            lang: None,
        }
    }

    pub fn with_weight(mut self, weight: FontWeight) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_style(mut self, style: FontStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn same_identity(&self, other: &FontDescriptor) -> bool {
        self.name == other.name && self.lang == other.lang
    }
}

impl fmt::Debug for FontDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontDescriptor")
            .field("name", &self.name)
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .field("weight", &self.weight)
            .field("style", &self.style)
            .field("lang", &self.lang)
            .finish()
    }
}

/// Options for one render call
///
/// Unset fields take the canonical defaults: a 1200×630 image, twemoji
/// emoji, the `resvg` converter and no diagnostics.
///
/// # Examples
///
/// ```
/// let opts: ogrender::RenderOptions =
///     serde_json::from_str(r#"{"width": 800, "converter": "canvas-raster-lib"}"#).unwrap();
/// assert_eq!(opts.width, 800);
/// assert_eq!(opts.height, 630);
/// assert_eq!(opts.converter, ogrender::ConverterKind::Canvas);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    /// Canvas width in pixels
    pub width: u32,
    /// Canvas height in pixels
    pub height: u32,
    /// Outline layout boxes in the output
    pub debug: bool,
    /// Per-call fonts; the engine's defaults are appended after them
    #[serde(skip)]
    pub fonts: Option<Vec<FontDescriptor>>,
    /// Emoji image set
    pub emoji: EmojiStyle,
    /// Rasterizer backend
    pub converter: ConverterKind,
    /// Emit timing and size telemetry through the engine's logger
    pub show_log: bool,
    /// Output sizing applied by every converter
    pub fit_to: FitTo,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 630,
            debug: false,
            fonts: None,
            emoji: EmojiStyle::Twemoji,
            converter: ConverterKind::Resvg,
            show_log: false,
            fit_to: FitTo::Original,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = RenderOptions::default();
        assert_eq!(opts.width, 1200);
        assert_eq!(opts.height, 630);
        assert!(!opts.debug);
        assert_eq!(opts.emoji, EmojiStyle::Twemoji);
        assert_eq!(opts.converter, ConverterKind::Resvg);
    }

    #[test]
    fn test_font_weight_validation() {
        assert_eq!(FontWeight::new(700).unwrap(), FontWeight::BOLD);
        assert!(FontWeight::new(450).is_err());
        assert!(FontWeight::new(0).is_err());
        assert!(FontWeight::new(1000).is_err());
        let w: std::result::Result<FontWeight, _> = serde_json::from_str("250");
        assert!(w.is_err());
    }

    #[test]
    fn test_font_identity() {
        let a = FontDescriptor::new("Inter", vec![1u8, 2, 3]);
        let b = FontDescriptor::new("Inter", vec![9u8]).with_weight(FontWeight::BOLD);
        let c = FontDescriptor::new("Inter", vec![1u8]).with_lang("ja-JP");
        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&c));
        assert!(format!("{:?}", a).contains("<3 bytes>"));
    }

    #[test]
    fn test_options_from_json() {
        let opts: RenderOptions = serde_json::from_str(
            r#"{"emoji":"openmoji","showLog":true,"fitTo":{"mode":"width","value":650}}"#,
        )
        .unwrap();
        assert_eq!(opts.emoji, EmojiStyle::Openmoji);
        assert!(opts.show_log);
        assert_eq!(opts.fit_to, FitTo::Width(650));
        assert_eq!(opts.width, 1200);
    }
}
