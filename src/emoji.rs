//! Emoji detection, icon-code normalisation and per-style asset locations.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const ZWJ: char = '\u{200D}';
const VS16: char = '\u{FE0F}';
const KEYCAP: char = '\u{20E3}';

/// Emoji image set used for emoji substitution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EmojiStyle {
    #[default]
    Twemoji,
    Openmoji,
    Blobmoji,
    Noto,
    Fluent,
    FluentFlat,
}

impl EmojiStyle {
    pub const ALL: [EmojiStyle; 6] = [
        EmojiStyle::Twemoji,
        EmojiStyle::Openmoji,
        EmojiStyle::Blobmoji,
        EmojiStyle::Noto,
        EmojiStyle::Fluent,
        EmojiStyle::FluentFlat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmojiStyle::Twemoji => "twemoji",
            EmojiStyle::Openmoji => "openmoji",
            EmojiStyle::Blobmoji => "blobmoji",
            EmojiStyle::Noto => "noto",
            EmojiStyle::Fluent => "fluent",
            EmojiStyle::FluentFlat => "fluentFlat",
        }
    }

    /// Parse a style name, falling back to twemoji for unknown names
    pub fn from_name_lossy(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            log::warn!("Unknown emoji style {:?}, using twemoji", name);
            EmojiStyle::Twemoji
        })
    }

    /// Public CDN location of the SVG for an icon code
    pub fn cdn_url(&self, code: &str) -> String {
        match self {
            EmojiStyle::Twemoji => format!(
                "https://cdnjs.cloudflare.com/ajax/libs/twemoji/14.0.2/svg/{}.svg",
                code.to_lowercase()
            ),
            EmojiStyle::Openmoji => format!(
                "https://cdn.jsdelivr.net/npm/@svgmoji/openmoji@2.0.0/svg/{}.svg",
                code.to_uppercase()
            ),
            EmojiStyle::Blobmoji => format!(
                "https://cdn.jsdelivr.net/npm/@svgmoji/blob@2.0.0/svg/{}.svg",
                code.to_uppercase()
            ),
            EmojiStyle::Noto => format!(
                "https://cdn.jsdelivr.net/gh/svgmoji/svgmoji/packages/svgmoji__noto/svg/{}.svg",
                code.to_uppercase()
            ),
            EmojiStyle::Fluent => format!(
                "https://cdn.jsdelivr.net/gh/shuding/fluentui-emoji-unicode/assets/{}_color.svg",
                code.to_lowercase()
            ),
            EmojiStyle::FluentFlat => format!(
                "https://cdn.jsdelivr.net/gh/shuding/fluentui-emoji-unicode/assets/{}_flat.svg",
                code.to_lowercase()
            ),
        }
    }

    /// Location of the SVG for an icon code, optionally on a mirror laid out
    /// as `{base}/{style}/{code}.svg`
    pub fn asset_url(&self, base: Option<&str>, code: &str) -> String {
        match base {
            Some(base) => format!("{}/{}/{}.svg", base.trim_end_matches('/'), self.as_str(), code),
            None => self.cdn_url(code),
        }
    }
}

impl fmt::Display for EmojiStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for EmojiStyle {
    fn from(name: String) -> Self {
        EmojiStyle::from_name_lossy(&name)
    }
}

impl From<EmojiStyle> for String {
    fn from(style: EmojiStyle) -> Self {
        style.as_str().to_string()
    }
}

impl FromStr for EmojiStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EmojiStyle::ALL
            .into_iter()
            .find(|style| style.as_str() == s)
            .ok_or_else(|| Error::ConfigError(format!("unknown emoji style: {}", s)))
    }
}

/// Normalised icon code for an emoji sequence: lowercase hex code points
/// joined with `-`. Variation selectors are stripped unless the sequence is
/// a ZWJ sequence, whose assets keep them.
pub fn icon_code(text: &str) -> String {
    let keep_selectors = text.contains(ZWJ);
    text.chars()
        .filter(|c| keep_selectors || *c != VS16)
        .map(|c| format!("{:x}", c as u32))
        .collect::<Vec<_>>()
        .join("-")
}

/// Code points with Emoji_Presentation=Yes: rendered as emoji even without
/// a variation selector
fn is_pictographic(cp: u32) -> bool {
    matches!(cp,
        // Miscellaneous Technical
        0x231A..=0x231B | 0x23E9..=0x23EC | 0x23F0 | 0x23F3
        // Geometric Shapes
        | 0x25FD..=0x25FE
        // Miscellaneous Symbols
        | 0x2614..=0x2615 | 0x2648..=0x2653 | 0x267F | 0x2693 | 0x26A1
        | 0x26AA..=0x26AB | 0x26BD..=0x26BE | 0x26C4..=0x26C5 | 0x26CE
        | 0x26D4 | 0x26EA | 0x26F2..=0x26F3 | 0x26F5 | 0x26FA | 0x26FD
        // Dingbats
        | 0x2705 | 0x270A..=0x270B | 0x2728 | 0x274C | 0x274E
        | 0x2753..=0x2755 | 0x2757 | 0x2795..=0x2797 | 0x27B0 | 0x27BF
        // Miscellaneous Symbols and Arrows
        | 0x2B1B..=0x2B1C | 0x2B50 | 0x2B55
        // Mahjong, playing cards, enclosed alphanumerics and ideographs
        | 0x1F004 | 0x1F0CF | 0x1F18E
        | 0x1F191..=0x1F19A
        | 0x1F1E6..=0x1F1FF
        | 0x1F201 | 0x1F21A | 0x1F22F | 0x1F232..=0x1F236 | 0x1F238..=0x1F23A
        | 0x1F250..=0x1F251
        // Pictographs, emoticons, transport
        | 0x1F300..=0x1F5FF
        | 0x1F600..=0x1F64F
        | 0x1F680..=0x1F6FF
        // Geometric Shapes Extended
        | 0x1F7E0..=0x1F7EB | 0x1F7F0
        // Supplemental Symbols and Pictographs, Extended-A
        | 0x1F90C..=0x1F9FF
        | 0x1FA70..=0x1FAFF
    )
}

/// Whether a grapheme cluster should be substituted with an emoji image.
///
/// Pictographs from the emoji blocks always are; other symbols only when
/// they request emoji presentation (U+FE0F) or form a keycap.
pub fn is_emoji(grapheme: &str) -> bool {
    let mut chars = grapheme.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if is_pictographic(first as u32) {
        return true;
    }
    grapheme.contains(KEYCAP) || (grapheme.contains(VS16) && !first.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icon_code_strips_selector() {
        assert_eq!(icon_code("😀"), "1f600");
        assert_eq!(icon_code("❤\u{FE0F}"), "2764");
        assert_eq!(icon_code("🇯🇵"), "1f1ef-1f1f5");
    }

    #[test]
    fn icon_code_keeps_selector_in_zwj_sequences() {
        // rainbow flag: white flag, VS16, ZWJ, rainbow
        assert_eq!(icon_code("🏳\u{FE0F}\u{200D}🌈"), "1f3f3-fe0f-200d-1f308");
    }

    #[test]
    fn emoji_detection() {
        assert!(is_emoji("😀"));
        assert!(is_emoji("👍🏽"));
        assert!(is_emoji("❤\u{FE0F}"));
        assert!(is_emoji("1\u{FE0F}\u{20E3}"));
        assert!(!is_emoji("❤"));
        assert!(!is_emoji("★"));
        assert!(!is_emoji("a"));
        assert!(!is_emoji("你"));
        assert!(!is_emoji(""));
    }

    #[test]
    fn default_presentation_symbols_are_emoji() {
        for g in ["✅", "⭐", "☕", "⚡", "⌚", "❌", "⚽", "➕"] {
            assert!(is_emoji(g), "{} should be an emoji", g);
        }
        // text-presentation symbols next to them stay text
        for g in ["☀", "✔", "⬆", "↔"] {
            assert!(!is_emoji(g), "{} should be text", g);
        }
    }

    #[test]
    fn style_names_and_urls() {
        assert_eq!("fluentFlat".parse::<EmojiStyle>().unwrap(), EmojiStyle::FluentFlat);
        assert!("sparkles".parse::<EmojiStyle>().is_err());
        assert_eq!(EmojiStyle::from_name_lossy("sparkles"), EmojiStyle::Twemoji);
        assert!(EmojiStyle::Twemoji.cdn_url("1F600").ends_with("/1f600.svg"));
        assert!(EmojiStyle::Openmoji.cdn_url("1f600").ends_with("/1F600.svg"));
        assert_eq!(
            EmojiStyle::Noto.asset_url(Some("http://127.0.0.1:9/emoji/"), "1f600"),
            "http://127.0.0.1:9/emoji/noto/1f600.svg"
        );
    }

    #[test]
    fn serde_uses_style_names() {
        let s: EmojiStyle = serde_json::from_str("\"fluentFlat\"").unwrap();
        assert_eq!(s, EmojiStyle::FluentFlat);
        let s: EmojiStyle = serde_json::from_str("\"apple\"").unwrap();
        assert_eq!(s, EmojiStyle::Twemoji);
        assert_eq!(serde_json::to_string(&EmojiStyle::Twemoji).unwrap(), "\"twemoji\"");
    }
}
