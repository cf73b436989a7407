//! Paint commands produced by layout and their SVG serialization

use super::layout::Rect;
use super::text::fmt_num;

/// Straight RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const TRANSPARENT: Color = Color { r: 0, g: 0, b: 0, a: 0 };
    pub const DEBUG_BOX: Color = Color::rgb(255, 0, 0);
    pub const DEBUG_LINE: Color = Color::rgb(0, 0, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b, a: 255 }
    }

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    fn opacity(&self) -> Option<String> {
        (self.a < 255).then(|| fmt_num(self.a as f32 / 255.0))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    Fill {
        rect: Rect,
        color: Color,
    },
    /// Glyph outlines as path data
    Glyphs {
        path: String,
        color: Color,
    },
    Image {
        rect: Rect,
        href: String,
    },
    /// Stroked box, used for debug outlines
    Outline {
        rect: Rect,
        color: Color,
    },
    /// Placeholder box for a character no font covers
    Tofu {
        rect: Rect,
        color: Color,
    },
}

/// Builds the SVG document from paint commands
pub struct SvgBuilder {
    width: u32,
    height: u32,
    elements: Vec<String>,
}

impl SvgBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            elements: vec![],
        }
    }

    fn rect_attrs(rect: &Rect) -> String {
        format!(
            r#"x="{}" y="{}" width="{}" height="{}""#,
            fmt_num(rect.x),
            fmt_num(rect.y),
            fmt_num(rect.width),
            fmt_num(rect.height)
        )
    }

    fn paint_attr(name: &str, color: &Color) -> String {
        let mut attr = format!(r#"{}="{}""#, name, color.hex());
        if let Some(opacity) = color.opacity() {
            attr.push_str(&format!(r#" {}-opacity="{}""#, name, opacity));
        }
        attr
    }

    pub fn push(&mut self, cmd: &PaintCommand) {
        let element = match cmd {
            PaintCommand::Fill { rect, color } => {
                format!("<rect {} {}/>", Self::rect_attrs(rect), Self::paint_attr("fill", color))
            }
            PaintCommand::Glyphs { path, color } => {
                if path.is_empty() {
                    return;
                }
                format!(r#"<path {} d="{}"/>"#, Self::paint_attr("fill", color), path)
            }
            PaintCommand::Image { rect, href } => format!(
                r#"<image {} preserveAspectRatio="none" xlink:href="{}"/>"#,
                Self::rect_attrs(rect),
                escape_attr(href)
            ),
            PaintCommand::Outline { rect, color } | PaintCommand::Tofu { rect, color } => format!(
                r#"<rect {} fill="none" {} stroke-width="1"/>"#,
                Self::rect_attrs(rect),
                Self::paint_attr("stroke", color)
            ),
        };
        self.elements.push(element);
    }

    pub fn build(self) -> String {
        let mut svg = format!(
            r#"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">"#,
            w = self.width,
            h = self.height
        );
        for element in &self.elements {
            svg.push_str(element);
        }
        svg.push_str("</svg>");
        svg
    }
}

/// Serialize a display list into one SVG document
pub fn to_svg(width: u32, height: u32, commands: &[PaintCommand]) -> String {
    let mut builder = SvgBuilder::new(width, height);
    for cmd in commands {
        builder.push(cmd);
    }
    builder.build()
}

fn escape_attr(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_serializes_with_opacity() {
        let rect = Rect {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
        };
        let svg = to_svg(
            10,
            10,
            &[PaintCommand::Fill {
                rect,
                color: Color {
                    r: 255,
                    g: 0,
                    b: 0,
                    a: 128,
                },
            }],
        );
        assert!(svg.starts_with(r#"<svg width="10" height="10" viewBox="0 0 10 10""#));
        assert!(svg.contains(r##"<rect x="0" y="0" width="10" height="10" fill="#ff0000" fill-opacity="0.5"/>"##));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn empty_glyph_runs_are_skipped() {
        let svg = to_svg(
            1,
            1,
            &[PaintCommand::Glyphs {
                path: String::new(),
                color: Color::BLACK,
            }],
        );
        assert!(!svg.contains("<path"));
    }
}
