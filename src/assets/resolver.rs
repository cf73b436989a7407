//! Memoising resolver for the layout engine's asset requests.

use std::sync::Arc;

use base64::Engine as Base64Engine;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use reqwest::Client;
use sha2::{Digest, Sha256};

use super::cache::{AssetCache, Resolution};
use super::{webfont, Asset, AssetKey, AssetLoader};
use crate::emoji::{icon_code, EmojiStyle};
use crate::script::{language_fonts, ScriptDetector, EMOJI, UNKNOWN};
use crate::{Error, FontDescriptor, FontStyle, FontWeight, Result};

/// Remote locations assets are fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEndpoints {
    /// CSS endpoint of the web font API
    pub font_api_url: String,
    /// Mirror serving `{base}/{style}/{code}.svg`; the public CDNs when `None`
    pub emoji_base_url: Option<String>,
}

impl Default for AssetEndpoints {
    fn default() -> Self {
        Self {
            font_api_url: "https://fonts.googleapis.com/css2".to_string(),
            emoji_base_url: None,
        }
    }
}

/// Does the network work for one cache key
#[derive(Clone)]
struct Fetcher {
    client: Client,
    endpoints: Arc<AssetEndpoints>,
    detector: ScriptDetector,
}

impl Fetcher {
    async fn resolve(self, key: AssetKey) -> Result<Resolution> {
        if key.code == EMOJI {
            let uri = self.load_emoji(key.emoji_style, &key.text).await?;
            return Ok(Resolution {
                asset: Asset::Image(uri),
                complete: true,
            });
        }
        Ok(self.load_fonts(&key.code, &key.text).await)
    }

    async fn load_emoji(&self, style: EmojiStyle, text: &str) -> Result<String> {
        let code = icon_code(text);
        let url = style.asset_url(self.endpoints.emoji_base_url.as_deref(), &code);
        log::debug!("Fetching emoji {} from {}", code, url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::EmojiResolutionError(format!("{}: {}", url, e)))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::EmojiResolutionError(format!(
                "{} returned status {}",
                url,
                status.as_u16()
            )));
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::EmojiResolutionError(format!("{}: {}", url, e)))?;

        Ok(format!(
            "data:image/svg+xml;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&body)
        ))
    }

    async fn load_fonts(&self, code: &str, text: &str) -> Resolution {
        // (family, first script code that asked for it)
        let mut families: Vec<(&'static str, &str)> = Vec::new();
        for script in code.split('|') {
            for &family in language_fonts(script) {
                if !families.iter().any(|(f, _)| *f == family) {
                    families.push((family, script));
                }
            }
        }

        if families.is_empty() {
            return Resolution {
                asset: Asset::Fonts(Vec::new()),
                complete: true,
            };
        }

        let names: Vec<&str> = families.iter().map(|(f, _)| *f).collect();
        let runs = self.detector.detect(text, &names);
        let fetched = join_all(runs.iter().map(|(family, sub)| {
            webfont::fetch_subset(&self.client, &self.endpoints.font_api_url, family, sub)
        }))
        .await;

        let digest = hex::encode(Sha256::digest(text.as_bytes()));
        let mut fonts = Vec::with_capacity(runs.len());
        let mut complete = true;
        for (index, ((family, _), result)) in runs.iter().zip(fetched).enumerate() {
            let script = families
                .iter()
                .find(|(f, _)| *f == family.as_str())
                .map(|(_, s)| *s)
                .unwrap_or(UNKNOWN);
            match result {
                Ok(data) => fonts.push(FontDescriptor {
                    name: format!("ogrender_{}_fallback_{}_{}", script, index, &digest[..12]),
                    data: data.into(),
                    weight: FontWeight::NORMAL,
                    style: FontStyle::Normal,
                    lang: (script != UNKNOWN).then(|| script.to_string()),
                }),
                Err(e) => {
                    log::warn!("Failed to load dynamic font {} for {:?}: {}", family, text, e);
                    complete = false;
                }
            }
        }

        Resolution {
            asset: Asset::Fonts(fonts),
            complete,
        }
    }
}

/// Resolves `(code, text)` requests into emoji images or font subsets.
///
/// Requests are memoised per `(emoji style, code, text)`. A request for a key
/// that is already being fetched awaits the in-flight fetch instead of
/// starting another one. Failed or partial resolutions are returned to their
/// waiters and then dropped from the cache so the next request retries.
pub struct AssetResolver {
    fetcher: Fetcher,
    cache: Arc<dyn AssetCache>,
}

impl AssetResolver {
    pub fn new(client: Client, endpoints: AssetEndpoints, cache: Arc<dyn AssetCache>) -> Self {
        Self {
            fetcher: Fetcher {
                client,
                endpoints: Arc::new(endpoints),
                detector: ScriptDetector::new(),
            },
            cache,
        }
    }

    pub fn endpoints(&self) -> &AssetEndpoints {
        &self.fetcher.endpoints
    }

    /// Number of keys currently held by the cache (settled or in flight)
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    pub async fn resolve(&self, emoji_style: EmojiStyle, code: &str, text: &str) -> Result<Asset> {
        let key = AssetKey::new(emoji_style, code, text);
        let (pending, inserted) = self.cache.get_or_insert_with(&key, &mut || {
            self.fetcher.clone().resolve(key.clone()).boxed().shared()
        });
        if !inserted {
            log::debug!("Asset cache hit for {} {:?}", code, text);
        }

        let outcome = pending.clone().await;
        let keep = matches!(&outcome, Ok(r) if r.complete);
        if inserted && !keep {
            self.cache.remove_if_same(&key, &pending);
        }
        outcome.map(|r| r.asset)
    }

    /// Loader callback for one render, bound to its emoji style
    pub fn loader(self: &Arc<Self>, emoji_style: EmojiStyle) -> BoundLoader {
        BoundLoader {
            resolver: Arc::clone(self),
            emoji_style,
        }
    }
}

/// [`AssetResolver`] bound to an emoji style
#[derive(Clone)]
pub struct BoundLoader {
    resolver: Arc<AssetResolver>,
    emoji_style: EmojiStyle,
}

impl AssetLoader for BoundLoader {
    fn load<'a>(&'a self, code: &'a str, text: &'a str) -> BoxFuture<'a, Result<Asset>> {
        self.resolver.resolve(self.emoji_style, code, text).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::UnboundedCache;

    fn offline_resolver() -> AssetResolver {
        AssetResolver::new(
            Client::new(),
            AssetEndpoints {
                // nothing listens on the discard port
                font_api_url: "http://127.0.0.1:9/css2".into(),
                emoji_base_url: Some("http://127.0.0.1:9".into()),
            },
            Arc::new(UnboundedCache::new()),
        )
    }

    #[tokio::test]
    async fn unmapped_codes_resolve_to_empty_list() {
        let resolver = offline_resolver();
        let asset = resolver
            .resolve(EmojiStyle::Twemoji, "xx-XX|yy", "abc")
            .await
            .unwrap();
        assert_eq!(asset, Asset::Fonts(Vec::new()));
        // complete results stay cached
        assert_eq!(resolver.cached_entries(), 1);
    }

    #[tokio::test]
    async fn failed_emoji_is_not_cached() {
        let resolver = offline_resolver();
        let err = resolver
            .resolve(EmojiStyle::Twemoji, "emoji", "😀")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmojiResolutionError(_)));
        assert_eq!(resolver.cached_entries(), 0);
    }

    #[tokio::test]
    async fn failed_font_subset_degrades_to_empty_list() {
        let resolver = offline_resolver();
        let asset = resolver
            .resolve(EmojiStyle::Twemoji, "ja-JP", "こんにちは")
            .await
            .unwrap();
        assert!(asset.fonts().is_empty());
        assert_eq!(resolver.cached_entries(), 0);
    }
}
