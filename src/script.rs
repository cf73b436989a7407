//! Script detection and the script → font family table.
//!
//! * [`script_code`] classifies a code point by its Unicode script into the
//!   code the layout engine reports.
//! * [`ScriptDetector::detect`] splits a run between candidate font families
//!   using static coverage tables of the delivery API's fonts.

use std::ops::RangeInclusive;

use unicode_script::{Script, UnicodeScript};

/// Script code reported for code points that match no specific script
pub const UNKNOWN: &str = "unknown";

/// Reserved request code for emoji image substitution
pub const EMOJI: &str = "emoji";

/// Script code → font families on the font delivery API (in `+`-joined form)
const LANGUAGE_FONTS: &[(&str, &[&str])] = &[
    ("ja-JP", &["Noto+Sans+JP"]),
    ("ko-KR", &["Noto+Sans+KR"]),
    ("zh-CN", &["Noto+Sans+SC"]),
    ("zh-TW", &["Noto+Sans+TC"]),
    ("zh-HK", &["Noto+Sans+HK"]),
    ("th-TH", &["Noto+Sans+Thai"]),
    ("bn-IN", &["Noto+Sans+Bengali"]),
    ("ar-AR", &["Noto+Sans+Arabic"]),
    ("ta-IN", &["Noto+Sans+Tamil"]),
    ("ml-IN", &["Noto+Sans+Malayalam"]),
    ("he-IL", &["Noto+Sans+Hebrew"]),
    ("te-IN", &["Noto+Sans+Telugu"]),
    ("devanagari", &["Noto+Sans+Devanagari"]),
    ("kannada", &["Noto+Sans+Kannada"]),
    ("symbol", &["Noto+Sans+Symbols", "Noto+Sans+Symbols+2"]),
    ("math", &["Noto+Sans+Math"]),
    (UNKNOWN, &["Noto+Sans"]),
];

type Ranges = &'static [RangeInclusive<u32>];

const CJK_COMMON: Ranges = &[
    0x3000..=0x303F,
    0xFF00..=0xFFEF,
];
const HAN: Ranges = &[
    0x2E80..=0x2FDF,
    0x3400..=0x4DBF,
    0x4E00..=0x9FFF,
    0xF900..=0xFAFF,
    0x20000..=0x2FA1F,
];
const KANA: Ranges = &[
    0x3040..=0x30FF,
    0x31F0..=0x31FF,
    0xFF66..=0xFF9F,
];
const HANGUL: Ranges = &[
    0x1100..=0x11FF,
    0x3130..=0x318F,
    0xA960..=0xA97F,
    0xAC00..=0xD7AF,
    0xD7B0..=0xD7FF,
];
const BOPOMOFO: Ranges = &[0x3100..=0x312F, 0x31A0..=0x31BF];
const THAI: Ranges = &[0x0E00..=0x0E7F];
const BENGALI: Ranges = &[0x0980..=0x09FF];
const ARABIC: Ranges = &[
    0x0600..=0x06FF,
    0x0750..=0x077F,
    0x08A0..=0x08FF,
    0xFB50..=0xFDFF,
    0xFE70..=0xFEFF,
];
const TAMIL: Ranges = &[0x0B80..=0x0BFF];
const MALAYALAM: Ranges = &[0x0D00..=0x0D7F];
const HEBREW: Ranges = &[0x0590..=0x05FF, 0xFB1D..=0xFB4F];
const TELUGU: Ranges = &[0x0C00..=0x0C7F];
const DEVANAGARI: Ranges = &[0x0900..=0x097F, 0xA8E0..=0xA8FF];
const KANNADA: Ranges = &[0x0C80..=0x0CFF];
const MATH: Ranges = &[
    0x2200..=0x22FF,
    0x27C0..=0x27EF,
    0x2980..=0x2AFF,
    0x1D400..=0x1D7FF,
];
const SYMBOLS: Ranges = &[
    0x20D0..=0x20FF,
    0x2100..=0x214F,
    0x2190..=0x21FF,
    0x2300..=0x23FF,
    0x2460..=0x24FF,
    0x25A0..=0x25FF,
    0x2600..=0x26FF,
    0x2700..=0x27BF,
    0x1F100..=0x1F1FF,
];
const SYMBOLS_2: Ranges = &[
    0x2190..=0x21FF,
    0x2300..=0x23FF,
    0x2500..=0x259F,
    0x25A0..=0x25FF,
    0x2B00..=0x2BFF,
    0x1F000..=0x1F0FF,
    0x1F780..=0x1F8FF,
    0x1FB00..=0x1FBFF,
];
const LATIN_GREEK_CYRILLIC: Ranges = &[
    0x0000..=0x052F,
    0x1E00..=0x1FFF,
    0x2000..=0x20CF,
];

/// Code point ranges each font family on the delivery API can render
const FONT_RANGES: &[(&str, &[Ranges])] = &[
    ("Noto+Sans+JP", &[KANA, HAN, CJK_COMMON]),
    ("Noto+Sans+KR", &[HANGUL, HAN, CJK_COMMON]),
    ("Noto+Sans+SC", &[HAN, BOPOMOFO, CJK_COMMON]),
    ("Noto+Sans+TC", &[HAN, BOPOMOFO, CJK_COMMON]),
    ("Noto+Sans+HK", &[HAN, BOPOMOFO, CJK_COMMON]),
    ("Noto+Sans+Thai", &[THAI]),
    ("Noto+Sans+Bengali", &[BENGALI]),
    ("Noto+Sans+Arabic", &[ARABIC]),
    ("Noto+Sans+Tamil", &[TAMIL]),
    ("Noto+Sans+Malayalam", &[MALAYALAM]),
    ("Noto+Sans+Hebrew", &[HEBREW]),
    ("Noto+Sans+Telugu", &[TELUGU]),
    ("Noto+Sans+Devanagari", &[DEVANAGARI]),
    ("Noto+Sans+Kannada", &[KANNADA]),
    ("Noto+Sans+Symbols", &[SYMBOLS]),
    ("Noto+Sans+Symbols+2", &[SYMBOLS_2]),
    ("Noto+Sans+Math", &[MATH]),
    ("Noto+Sans", &[LATIN_GREEK_CYRILLIC]),
];

fn in_ranges(cp: u32, ranges: Ranges) -> bool {
    ranges.iter().any(|r| r.contains(&cp))
}

/// Font families registered for a script code (empty when unmapped)
pub fn language_fonts(code: &str) -> &'static [&'static str] {
    LANGUAGE_FONTS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, fonts)| *fonts)
        .unwrap_or(&[])
}

/// Script code the layout engine reports for `ch`.
///
/// Characters shared by several locales (Han ideographs, CJK punctuation)
/// report every plausible code joined with `|`.
pub fn script_code(ch: char) -> &'static str {
    match ch.script() {
        Script::Hiragana | Script::Katakana => "ja-JP",
        Script::Hangul => "ko-KR",
        Script::Han | Script::Bopomofo => "zh-CN|zh-TW|zh-HK",
        Script::Thai => "th-TH",
        Script::Bengali => "bn-IN",
        Script::Arabic => "ar-AR",
        Script::Tamil => "ta-IN",
        Script::Malayalam => "ml-IN",
        Script::Hebrew => "he-IL",
        Script::Telugu => "te-IN",
        Script::Devanagari => "devanagari",
        Script::Kannada => "kannada",
        Script::Common | Script::Inherited => common_code(ch as u32),
        _ => UNKNOWN,
    }
}

/// Shared-script code points: CJK punctuation, kana marks, math and symbols
fn common_code(cp: u32) -> &'static str {
    if in_ranges(cp, KANA) {
        // prolonged sound mark and other kana punctuation
        "ja-JP"
    } else if in_ranges(cp, CJK_COMMON) {
        "ja-JP|ko-KR|zh-CN|zh-TW|zh-HK"
    } else if in_ranges(cp, MATH) {
        "math"
    } else if in_ranges(cp, SYMBOLS) || in_ranges(cp, SYMBOLS_2) {
        "symbol"
    } else {
        UNKNOWN
    }
}

/// Whether the static tables know which code points `font` covers
pub fn is_known_font(font: &str) -> bool {
    FONT_RANGES.iter().any(|(name, _)| *name == font)
}

fn font_covers(font: &str, cp: u32) -> bool {
    FONT_RANGES
        .iter()
        .find(|(name, _)| *name == font)
        .map(|(_, groups)| groups.iter().any(|g| in_ranges(cp, g)))
        .unwrap_or(false)
}

/// Partitions text between candidate fonts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptDetector;

impl ScriptDetector {
    pub fn new() -> Self {
        ScriptDetector
    }

    /// Split `text` between the `candidates` able to render it.
    ///
    /// Each code point goes to the earliest-listed candidate covering it; code
    /// points no candidate covers are dropped. The result holds one entry per
    /// candidate that claimed anything, in candidate order, and each
    /// substring keeps the original relative order of its code points.
    pub fn detect<S: AsRef<str>>(&self, text: &str, candidates: &[S]) -> Vec<(String, String)> {
        let mut claimed: Vec<String> = vec![String::new(); candidates.len()];
        for ch in text.chars() {
            let cp = ch as u32;
            if let Some(idx) = candidates.iter().position(|c| font_covers(c.as_ref(), cp)) {
                claimed[idx].push(ch);
            }
        }

        candidates
            .iter()
            .zip(claimed)
            .filter(|(_, sub)| !sub.is_empty())
            .map(|(font, sub)| (font.as_ref().to_string(), sub))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_table_lookup() {
        assert_eq!(language_fonts("ja-JP"), &["Noto+Sans+JP"]);
        assert_eq!(language_fonts("symbol").len(), 2);
        assert!(language_fonts("emoji").is_empty());
        assert!(language_fonts("xx-XX").is_empty());
        for (_, fonts) in LANGUAGE_FONTS {
            for f in *fonts {
                assert!(is_known_font(f), "{} has no range table", f);
            }
        }
    }

    #[test]
    fn script_codes_for_common_scripts() {
        assert_eq!(script_code('a'), UNKNOWN);
        assert_eq!(script_code('あ'), "ja-JP");
        assert_eq!(script_code('한'), "ko-KR");
        assert_eq!(script_code('你'), "zh-CN|zh-TW|zh-HK");
        assert_eq!(script_code('。'), "ja-JP|ko-KR|zh-CN|zh-TW|zh-HK");
        assert_eq!(script_code('ก'), "th-TH");
        assert_eq!(script_code('ש'), "he-IL");
        assert_eq!(script_code('∑'), "math");
        assert_eq!(script_code('★'), "symbol");
        assert_eq!(script_code('ー'), "ja-JP");
        assert_eq!(script_code('ㄅ'), "zh-CN|zh-TW|zh-HK");
        assert_eq!(script_code('！'), "ja-JP|ko-KR|zh-CN|zh-TW|zh-HK");
        assert_eq!(script_code('क'), "devanagari");
        assert_eq!(script_code('Ж'), UNKNOWN);
    }

    #[test]
    fn earliest_candidate_wins() {
        let d = ScriptDetector::new();
        let out = d.detect("你好", &["Noto+Sans+JP", "Noto+Sans+SC"]);
        assert_eq!(out, vec![("Noto+Sans+JP".to_string(), "你好".to_string())]);

        let out = d.detect("你好", &["Noto+Sans+SC", "Noto+Sans+JP"]);
        assert_eq!(out, vec![("Noto+Sans+SC".to_string(), "你好".to_string())]);
    }

    #[test]
    fn partitions_mixed_text_and_drops_unclaimed() {
        let d = ScriptDetector::new();
        let text = "aこん한x글";
        let out = d.detect(text, &["Noto+Sans+JP", "Noto+Sans+KR"]);
        assert_eq!(
            out,
            vec![
                ("Noto+Sans+JP".to_string(), "こん".to_string()),
                ("Noto+Sans+KR".to_string(), "한글".to_string()),
            ]
        );

        // Every returned code point comes from the input, none twice
        let total: usize = out.iter().map(|(_, s)| s.chars().count()).sum();
        assert_eq!(total, 4);
        for (_, sub) in &out {
            let mut it = text.chars();
            assert!(sub.chars().all(|c| it.any(|t| t == c)), "not a subsequence");
        }
    }

    #[test]
    fn no_candidates_yields_nothing() {
        let d = ScriptDetector::new();
        let none: [&str; 0] = [];
        assert!(d.detect("abc", &none).is_empty());
        assert!(d.detect("", &["Noto+Sans"]).is_empty());
        assert!(d.detect("abc", &["Not+A+Font"]).is_empty());
    }
}
