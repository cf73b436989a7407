//! Rendering pipeline: element tree to SVG through a [`LayoutEngine`], SVG to
//! PNG through the [`raster`] backends.

pub mod backends;
pub mod layout;
pub mod paint;
pub mod raster;
pub mod style;
pub mod text;

use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;

pub use layout::BlockLayout;
pub use raster::{ConverterRegistry, RasterConverter, Rasterizer, SizeHint, SvgDocument};

use crate::assets::AssetLoader;
use crate::element::Element;
use crate::{FontDescriptor, Logger, RenderOptions, Result};

/// Everything a layout engine gets for one render
#[derive(Clone)]
pub struct LayoutOptions {
    pub width: u32,
    pub height: u32,
    pub debug: bool,
    /// Fonts in fallback order
    pub fonts: Vec<FontDescriptor>,
    /// Callback for emoji images and fonts the configured set lacks
    pub loader: Arc<dyn AssetLoader>,
}

/// Turns an element tree into an SVG document.
///
/// Implementations call `options.loader` for text they cannot render with
/// `options.fonts` and must await every call before producing output.
pub trait LayoutEngine: Send + Sync {
    fn layout<'a>(&'a self, tree: &'a Element, options: LayoutOptions) -> BoxFuture<'a, Result<String>>;
}

/// Explicit fonts followed by every default not shadowed by one of them
pub fn merge_fonts(explicit: Option<&[FontDescriptor]>, defaults: &[FontDescriptor]) -> Vec<FontDescriptor> {
    let explicit = explicit.unwrap_or_default();
    let mut fonts = explicit.to_vec();
    fonts.extend(
        defaults
            .iter()
            .filter(|d| !explicit.iter().any(|e| e.same_identity(d)))
            .cloned(),
    );
    fonts
}

/// Render `tree` to SVG
pub async fn render_svg(
    layout: &dyn LayoutEngine,
    tree: &Element,
    options: &RenderOptions,
    default_fonts: &[FontDescriptor],
    loader: Arc<dyn AssetLoader>,
    logger: &Logger,
) -> Result<String> {
    let start = Instant::now();
    let fonts = merge_fonts(options.fonts.as_deref(), default_fonts);
    log::debug!(
        "Laying out {}x{} with {} fonts",
        options.width,
        options.height,
        fonts.len()
    );

    let svg = layout
        .layout(
            tree,
            LayoutOptions {
                width: options.width,
                height: options.height,
                debug: options.debug,
                fonts,
                loader,
            },
        )
        .await?;

    if options.show_log {
        logger(&format!(
            "renderSvg time: {}ms; svg size: {}",
            start.elapsed().as_millis(),
            svg.len()
        ));
    }
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::NoopLoader;
    use std::sync::Mutex;

    fn font(name: &str, lang: Option<&str>, byte: u8) -> FontDescriptor {
        let f = FontDescriptor::new(name, vec![byte]);
        match lang {
            Some(l) => f.with_lang(l),
            None => f,
        }
    }

    #[test]
    fn merge_empty_yields_defaults() {
        let defaults = vec![font("sans serif", None, 0)];
        assert_eq!(merge_fonts(None, &defaults), defaults);
        assert_eq!(merge_fonts(Some(&[][..]), &defaults), defaults);
    }

    #[test]
    fn merge_explicit_wins() {
        let defaults = vec![font("sans serif", None, 0), font("Inter", None, 1)];
        let explicit = vec![font("Inter", None, 2), font("Inter", Some("ja-JP"), 3)];
        let merged = merge_fonts(Some(explicit.as_slice()), &defaults);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].data[0], 2);
        assert_eq!(merged[1].lang.as_deref(), Some("ja-JP"));
        assert_eq!(merged[2].name, "sans serif");
    }

    struct Fixed;

    impl LayoutEngine for Fixed {
        fn layout<'a>(&'a self, _tree: &'a Element, options: LayoutOptions) -> BoxFuture<'a, Result<String>> {
            Box::pin(async move { Ok(format!("<svg fonts=\"{}\"/>", options.fonts.len())) })
        }
    }

    #[tokio::test]
    async fn render_svg_logs_when_asked() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let logger: Logger = Arc::new(move |msg: &str| sink.lock().unwrap().push(msg.to_string()));
        let options = RenderOptions {
            show_log: true,
            ..Default::default()
        };
        let defaults = vec![font("sans serif", None, 0)];
        let svg = render_svg(&Fixed, &Element::new("div"), &options, &defaults, Arc::new(NoopLoader), &logger)
            .await
            .unwrap();
        assert_eq!(svg, "<svg fonts=\"1\"/>");
        let lines = lines.lock().unwrap();
        assert!(lines[0].starts_with("renderSvg time: "));
        assert!(lines[0].ends_with(&format!("svg size: {}", svg.len())));
    }

    #[tokio::test]
    async fn quiet_by_default() {
        let called = Arc::new(Mutex::new(false));
        let flag = called.clone();
        let logger: Logger = Arc::new(move |_: &str| *flag.lock().unwrap() = true);
        render_svg(&Fixed, &Element::new("div"), &RenderOptions::default(), &[], Arc::new(NoopLoader), &logger)
            .await
            .unwrap();
        assert!(!*called.lock().unwrap());
    }
}
