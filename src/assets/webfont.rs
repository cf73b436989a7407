//! Dynamic web font subsets from a Google-Fonts-compatible CSS API.
//!
//! The API is asked only for the glyphs of one run of text; the returned
//! stylesheet points at a TrueType binary holding exactly that subset.

use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;

use crate::{Error, Result};

/// Legacy Safari user agent; the API answers it with TrueType instead of WOFF2.
pub const TTF_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; U; Intel Mac OS X 10_6_8; de-at) AppleWebKit/533.21.1 (KHTML, like Gecko) Version/5.0.5 Safari/533.21.1";

static SRC_RULE: OnceLock<Regex> = OnceLock::new();

fn src_rule() -> &'static Regex {
    SRC_RULE.get_or_init(|| {
        Regex::new(r"src: url\((.+?)\) format\('(opentype|truetype)'\)").unwrap()
    })
}

/// Build the stylesheet URL requesting `family` restricted to `text`.
///
/// `family` is already in the API's `+`-joined form and is passed through.
pub fn stylesheet_url(api: &str, family: &str, text: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(text.as_bytes()).collect();
    format!("{}?family={}&text={}", api, family, encoded)
}

/// First TrueType/OpenType source URL declared in a stylesheet
pub fn find_font_source(css: &str) -> Option<&str> {
    src_rule()
        .captures(css)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_matches(|c| c == '"' || c == '\''))
}

/// Download the subset of `family` needed to render `text`
pub async fn fetch_subset(client: &Client, api: &str, family: &str, text: &str) -> Result<Vec<u8>> {
    if family.is_empty() || text.is_empty() {
        return Err(Error::FontResolutionError(
            "font family and text must not be empty".into(),
        ));
    }

    let css_url = stylesheet_url(api, family, text);
    log::debug!("Fetching font stylesheet {}", css_url);
    let css = client
        .get(&css_url)
        .header("User-Agent", TTF_USER_AGENT)
        .send()
        .await?
        .text()
        .await?;

    let source = find_font_source(&css).ok_or_else(|| {
        Error::FontResolutionError(format!("no TrueType source for {} in stylesheet", family))
    })?;

    let resp = client.get(source).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::FontResolutionError(format!(
            "Status: {}",
            status.as_u16()
        )));
    }

    Ok(resp.bytes().await?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSS: &str = "/* latin */\n@font-face {\n  font-family: 'Noto Sans JP';\n  font-style: normal;\n  font-weight: 400;\n  src: url(https://fonts.gstatic.com/l/font?kit=abc&skey=def) format('truetype');\n}\n";

    #[test]
    fn finds_truetype_source() {
        assert_eq!(
            find_font_source(CSS),
            Some("https://fonts.gstatic.com/l/font?kit=abc&skey=def")
        );
    }

    #[test]
    fn ignores_woff_sources() {
        let css = "src: url(https://example.com/a.woff2) format('woff2');";
        assert_eq!(find_font_source(css), None);
        let css = "src: url(\"https://example.com/a.otf\") format('opentype');";
        assert_eq!(find_font_source(css), Some("https://example.com/a.otf"));
    }

    #[test]
    fn encodes_text_in_query() {
        let url = stylesheet_url("https://fonts.googleapis.com/css2", "Noto+Sans+JP", "こん にち");
        assert!(url.starts_with("https://fonts.googleapis.com/css2?family=Noto+Sans+JP&text="));
        assert!(!url.contains(' '));
        assert!(url.contains("%E3%81%93"));
    }
}
