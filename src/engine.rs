//! Engine lifecycle: one-time setup shared by every render.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::Client;

use crate::assets::{AssetCache, AssetEndpoints, AssetResolver, LruAssetCache, UnboundedCache};
use crate::element::Element;
use crate::rendering::{self, merge_fonts, BlockLayout, ConverterRegistry, LayoutEngine, RasterConverter, Rasterizer};
use crate::{default_logger, Error, FontDescriptor, Logger, RenderOptions, Result};

const BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// User agent for emoji downloads; font stylesheet requests always use a
    /// legacy agent so the API serves TrueType
    pub user_agent: Option<String>,
    /// CSS endpoint of the web font API
    pub font_api_url: String,
    /// Mirror serving `{base}/{style}/{code}.svg` instead of the public CDNs
    pub emoji_base_url: Option<String>,
    /// HTTP timeout in milliseconds (none by default)
    pub timeout_ms: Option<u64>,
    /// Bound of the asset cache; `None` keeps every entry for the engine's
    /// lifetime
    pub asset_cache_capacity: Option<NonZeroUsize>,
    /// Font file used instead of the bundled default
    pub default_font_path: Option<PathBuf>,
    /// Name the default font is registered under
    pub default_font_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            font_api_url: AssetEndpoints::default().font_api_url,
            emoji_base_url: None,
            timeout_ms: None,
            asset_cache_capacity: NonZeroUsize::new(1024),
            default_font_path: None,
            default_font_name: "sans serif".to_string(),
        }
    }
}

/// Renders element trees and SVG documents.
///
/// Create one with [`Engine::init`] and share it by reference; the asset
/// cache and default fonts are reused across renders.
pub struct Engine {
    config: EngineConfig,
    resolver: Arc<AssetResolver>,
    default_fonts: Vec<FontDescriptor>,
    registered_fonts: RwLock<Vec<FontDescriptor>>,
    layout: Arc<dyn LayoutEngine>,
    converter: RasterConverter,
    logger: Logger,
}

impl Engine {
    pub async fn init(config: EngineConfig) -> Result<Self> {
        let data: Arc<[u8]> = match &config.default_font_path {
            Some(path) => tokio::fs::read(path)
                .await
                .map_err(|e| {
                    Error::InitializationError(format!("Failed to read font {}: {}", path.display(), e))
                })?
                .into(),
            None => Arc::from(BUNDLED_FONT),
        };
        ttf_parser::Face::parse(&data, 0).map_err(|e| {
            Error::InitializationError(format!("Default font is not a usable font: {}", e))
        })?;
        let default_fonts = vec![FontDescriptor::new(config.default_font_name.clone(), data)];

        let mut builder = Client::builder();
        if let Some(ua) = &config.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        if let Some(ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let client = builder
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build HTTP client: {}", e)))?;

        let cache: Arc<dyn AssetCache> = match config.asset_cache_capacity {
            Some(capacity) => Arc::new(LruAssetCache::new(capacity)),
            None => Arc::new(UnboundedCache::new()),
        };
        let endpoints = AssetEndpoints {
            font_api_url: config.font_api_url.clone(),
            emoji_base_url: config.emoji_base_url.clone(),
        };
        let resolver = Arc::new(AssetResolver::new(client, endpoints, cache));

        log::debug!(
            "Engine ready (default font {:?}, cache capacity {:?})",
            config.default_font_name,
            config.asset_cache_capacity
        );

        Ok(Self {
            config,
            resolver,
            default_fonts,
            registered_fonts: RwLock::new(Vec::new()),
            layout: Arc::new(BlockLayout),
            converter: RasterConverter::new(ConverterRegistry::with_defaults()),
            logger: default_logger(),
        })
    }

    /// Replace the layout engine
    pub fn with_layout(mut self, layout: Arc<dyn LayoutEngine>) -> Self {
        self.layout = layout;
        self
    }

    /// Replace the sink for `show_log` telemetry
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Add or replace a rasterizer backend
    pub fn register_converter(&mut self, backend: Arc<dyn Rasterizer>) {
        self.converter.registry_mut().register(backend);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<AssetResolver> {
        &self.resolver
    }

    pub fn default_fonts(&self) -> &[FontDescriptor] {
        &self.default_fonts
    }

    /// Register fonts appended to every render's explicit fonts
    pub fn add_fonts(&self, fonts: impl IntoIterator<Item = FontDescriptor>) {
        let mut registered = self.registered_fonts.write().unwrap_or_else(|p| p.into_inner());
        registered.extend(fonts);
    }

    /// Unregister fonts previously passed to [`Engine::add_fonts`]
    pub fn remove_fonts(&self, fonts: &[FontDescriptor]) {
        let mut registered = self.registered_fonts.write().unwrap_or_else(|p| p.into_inner());
        for font in fonts {
            if let Some(index) = registered.iter().position(|f| f == font) {
                registered.remove(index);
            }
        }
    }

    /// Options for one call: the caller's fonts followed by registered fonts
    pub fn build_options(&self, options: &RenderOptions) -> RenderOptions {
        let mut options = options.clone();
        let registered = self.registered_fonts.read().unwrap_or_else(|p| p.into_inner());
        if !registered.is_empty() {
            options
                .fonts
                .get_or_insert_with(Vec::new)
                .extend(registered.iter().cloned());
        }
        options
    }

    pub async fn render_svg(&self, tree: &Element, options: &RenderOptions) -> Result<String> {
        let options = self.build_options(options);
        let loader = Arc::new(self.resolver.loader(options.emoji));
        rendering::render_svg(
            self.layout.as_ref(),
            tree,
            &options,
            &self.default_fonts,
            loader,
            &self.logger,
        )
        .await
    }

    pub async fn svg_to_png(&self, svg: &str, options: &RenderOptions) -> Result<Vec<u8>> {
        let mut options = self.build_options(options);
        options.fonts = Some(merge_fonts(options.fonts.as_deref(), &self.default_fonts));
        self.converter.convert(svg, &options, &self.logger).await
    }

    pub async fn render_png(&self, tree: &Element, options: &RenderOptions) -> Result<Vec<u8>> {
        let svg = self.render_svg(tree, options).await?;
        self.svg_to_png(&svg, options).await
    }

    #[cfg(feature = "html")]
    pub async fn html_to_svg(&self, html: &str, options: &RenderOptions) -> Result<String> {
        let tree = crate::html::parse_html(html)?;
        self.render_svg(&tree, options).await
    }

    #[cfg(feature = "html")]
    pub async fn html_to_png(&self, html: &str, options: &RenderOptions) -> Result<Vec<u8>> {
        let tree = crate::html::parse_html(html)?;
        self.render_png(&tree, options).await
    }

    /// Release the engine and its caches
    pub fn shutdown(self) {
        log::info!(
            "Shutting down engine with {} cached assets",
            self.resolver.cached_entries()
        );
    }
}
