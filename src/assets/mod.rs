//! Dynamic asset resolution: emoji images and web font subsets requested by
//! the layout engine while it lays out text it cannot render itself.

pub mod cache;
pub mod resolver;
pub mod webfont;

pub use cache::{AssetCache, LruAssetCache, PendingAsset, Resolution, UnboundedCache};
pub use resolver::{AssetEndpoints, AssetResolver, BoundLoader};

use crate::emoji::EmojiStyle;
use crate::{FontDescriptor, Result};
use futures::future::BoxFuture;

/// A resolved asset
#[derive(Debug, Clone, PartialEq)]
pub enum Asset {
    /// Emoji image inlined as a `data:` URI
    Image(String),
    /// Synthetic font descriptors for fetched subsets; empty when nothing
    /// could be resolved
    Fonts(Vec<FontDescriptor>),
}

impl Asset {
    pub fn as_image(&self) -> Option<&str> {
        match self {
            Asset::Image(uri) => Some(uri),
            Asset::Fonts(_) => None,
        }
    }

    pub fn fonts(&self) -> &[FontDescriptor] {
        match self {
            Asset::Fonts(fonts) => fonts,
            Asset::Image(_) => &[],
        }
    }
}

/// Cache key of one asset request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetKey {
    pub emoji_style: EmojiStyle,
    pub code: String,
    pub text: String,
}

impl AssetKey {
    pub fn new(emoji_style: EmojiStyle, code: &str, text: &str) -> Self {
        Self {
            emoji_style,
            code: code.to_string(),
            text: text.to_string(),
        }
    }
}

/// Callback the layout engine uses to request additional assets.
///
/// `code` is either `"emoji"` or a `|`-joined list of script codes and `text`
/// is the run that needs them.
pub trait AssetLoader: Send + Sync {
    fn load<'a>(&'a self, code: &'a str, text: &'a str) -> BoxFuture<'a, Result<Asset>>;
}

/// Loader that never resolves anything; useful for offline rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLoader;

impl AssetLoader for NoopLoader {
    fn load<'a>(&'a self, _code: &'a str, _text: &'a str) -> BoxFuture<'a, Result<Asset>> {
        Box::pin(async { Ok(Asset::Fonts(Vec::new())) })
    }
}
