//! Glyph lookup, measurement and outline extraction over the configured fonts.

use std::fmt::Write as _;

use ttf_parser::{Face, GlyphId, OutlineBuilder};
use unicode_segmentation::UnicodeSegmentation;

use crate::emoji::is_emoji;
use crate::FontDescriptor;

/// Parsed faces of a font list, in fallback order
pub struct FontBook<'a> {
    faces: Vec<(&'a FontDescriptor, Face<'a>)>,
}

impl<'a> FontBook<'a> {
    pub fn new(fonts: &'a [FontDescriptor]) -> Self {
        let faces = fonts
            .iter()
            .filter_map(|font| match Face::parse(&font.data, 0) {
                Ok(face) => Some((font, face)),
                Err(e) => {
                    log::warn!("Skipping unparsable font {}: {}", font.name, e);
                    None
                }
            })
            .collect();
        Self { faces }
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Whether any font has a glyph for `ch`
    pub fn covers(&self, ch: char) -> bool {
        self.faces.iter().any(|(_, face)| face.glyph_index(ch).is_some())
    }

    /// Fonts named `family` first, then the rest in list order
    fn candidates<'b>(&'b self, family: Option<&'b str>) -> impl Iterator<Item = usize> + 'b {
        let named = self
            .faces
            .iter()
            .enumerate()
            .filter(move |(_, (font, _))| Some(font.name.as_str()) == family)
            .map(|(i, _)| i);
        let rest = self
            .faces
            .iter()
            .enumerate()
            .filter(move |(_, (font, _))| Some(font.name.as_str()) != family)
            .map(|(i, _)| i);
        named.chain(rest)
    }

    /// First font able to render `ch`
    pub fn select(&self, ch: char, family: Option<&str>) -> Option<(usize, GlyphId)> {
        self.candidates(family)
            .find_map(|i| self.faces[i].1.glyph_index(ch).map(|gid| (i, gid)))
    }

    /// Font whose metrics drive line boxes
    pub fn primary(&self, family: Option<&str>) -> Option<usize> {
        self.candidates(family).next()
    }

    fn scale(&self, font: usize, size: f32) -> f32 {
        size / self.faces[font].1.units_per_em() as f32
    }

    pub fn advance(&self, font: usize, glyph: GlyphId, size: f32) -> f32 {
        let face = &self.faces[font].1;
        face.glyph_hor_advance(glyph).unwrap_or(0) as f32 * self.scale(font, size)
    }

    /// Scaled (ascender, descender); descender is negative
    pub fn metrics(&self, font: Option<usize>, size: f32) -> (f32, f32) {
        match font {
            Some(i) => {
                let face = &self.faces[i].1;
                let scale = self.scale(i, size);
                (face.ascender() as f32 * scale, face.descender() as f32 * scale)
            }
            None => (size * 0.8, -size * 0.2),
        }
    }

    /// Append the outline of `glyph` as SVG path data, origin at the pen
    /// position on the baseline
    pub fn outline(&self, font: usize, glyph: GlyphId, x: f32, baseline: f32, size: f32, out: &mut String) {
        let mut builder = PathData {
            out,
            scale: self.scale(font, size),
            x,
            y: baseline,
        };
        // glyphs without contours (spaces) produce nothing
        let _ = self.faces[font].1.outline_glyph(glyph, &mut builder);
    }
}

struct PathData<'s> {
    out: &'s mut String,
    scale: f32,
    x: f32,
    y: f32,
}

impl PathData<'_> {
    fn point(&mut self, px: f32, py: f32) {
        let x = fmt_num(self.x + px * self.scale);
        let y = fmt_num(self.y - py * self.scale);
        let _ = write!(self.out, "{} {}", x, y);
    }
}

impl OutlineBuilder for PathData<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        self.out.push('M');
        self.point(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.out.push('L');
        self.point(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.out.push('Q');
        self.point(x1, y1);
        self.out.push(' ');
        self.point(x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.out.push('C');
        self.point(x1, y1);
        self.out.push(' ');
        self.point(x2, y2);
        self.out.push(' ');
        self.point(x, y);
    }

    fn close(&mut self) {
        self.out.push('Z');
    }
}

/// Number formatting for SVG output: two decimals, trailing zeros trimmed
pub fn fmt_num(v: f32) -> String {
    let s = format!("{:.2}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    match s {
        "-0" | "" => "0".to_string(),
        s => s.to_string(),
    }
}

/// One positioned unit of a shaped line
#[derive(Debug, Clone, PartialEq)]
pub enum GlyphKind {
    Outline { font: usize, glyph: GlyphId },
    /// Emoji image as a data URI
    Emoji(String),
    /// No font covers the character
    Tofu,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapedGlyph {
    pub kind: GlyphKind,
    pub x: f32,
    pub advance: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    pub glyphs: Vec<ShapedGlyph>,
    pub width: f32,
}

/// Inputs for shaping one text leaf
pub struct TextStyle<'s> {
    pub size: f32,
    pub family: Option<&'s str>,
}

/// Shapes text against a [`FontBook`], substituting resolved emoji images
pub struct Shaper<'a, 'b> {
    pub book: &'b FontBook<'a>,
    pub emoji: &'b dyn Fn(&str) -> Option<String>,
}

impl Shaper<'_, '_> {
    fn shape_word(&self, word: &str, style: &TextStyle<'_>) -> Vec<ShapedGlyph> {
        let mut glyphs = Vec::new();
        for grapheme in word.graphemes(true) {
            if is_emoji(grapheme) {
                if let Some(uri) = (self.emoji)(grapheme) {
                    glyphs.push(ShapedGlyph {
                        kind: GlyphKind::Emoji(uri),
                        x: 0.0,
                        advance: style.size,
                    });
                    continue;
                }
            }
            for ch in grapheme.chars().filter(|c| !c.is_control()) {
                let glyph = match self.book.select(ch, style.family) {
                    Some((font, glyph)) => ShapedGlyph {
                        kind: GlyphKind::Outline { font, glyph },
                        x: 0.0,
                        advance: self.book.advance(font, glyph, style.size),
                    },
                    // combining marks ride on the previous glyph
                    None if glyphs.last().is_some() && is_combining(ch) => continue,
                    None => ShapedGlyph {
                        kind: GlyphKind::Tofu,
                        x: 0.0,
                        advance: style.size * 0.6,
                    },
                };
                glyphs.push(glyph);
            }
        }
        glyphs
    }

    fn space_width(&self, style: &TextStyle<'_>) -> f32 {
        match self.book.select(' ', style.family) {
            Some((font, glyph)) => self.book.advance(font, glyph, style.size),
            None => style.size * 0.25,
        }
    }

    /// Widest word and the width of the unwrapped text, the min- and
    /// max-content widths of a text leaf
    pub fn content_widths(&self, text: &str, style: &TextStyle<'_>) -> (f32, f32) {
        let min = text
            .split_whitespace()
            .map(|word| self.shape_word(word, style).iter().map(|g| g.advance).sum::<f32>())
            .fold(0.0, f32::max);
        let max = self
            .wrap(text, style, f32::INFINITY)
            .first()
            .map_or(0.0, |line| line.width);
        (min, max)
    }

    /// Greedy word wrap against `max_width`; whitespace collapses to single
    /// spaces and words wider than a line break between graphemes
    pub fn wrap(&self, text: &str, style: &TextStyle<'_>, max_width: f32) -> Vec<Line> {
        let space = self.space_width(style);
        let mut lines = Vec::new();
        let mut line = Line::default();

        for word in text.split_whitespace() {
            let glyphs = self.shape_word(word, style);
            let word_width: f32 = glyphs.iter().map(|g| g.advance).sum();
            let gap = if line.glyphs.is_empty() { 0.0 } else { space };

            if !line.glyphs.is_empty() && line.width + gap + word_width > max_width {
                lines.push(std::mem::take(&mut line));
            }
            let mut pen = if line.glyphs.is_empty() { 0.0 } else { line.width + space };
            for mut glyph in glyphs {
                if !line.glyphs.is_empty() && pen + glyph.advance > max_width && word_width > max_width {
                    lines.push(std::mem::take(&mut line));
                    pen = 0.0;
                }
                glyph.x = pen;
                pen += glyph.advance;
                line.width = pen;
                line.glyphs.push(glyph);
            }
        }
        if !line.glyphs.is_empty() {
            lines.push(line);
        }
        lines
    }
}

fn is_combining(ch: char) -> bool {
    matches!(ch as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F | 0x200C | 0x200D | 0xFE00..=0xFE0F)
}
