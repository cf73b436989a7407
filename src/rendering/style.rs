//! Computed style: inherited text properties plus the box properties the
//! layout solver reads.

use std::collections::BTreeMap;

use taffy::prelude::TaffyAuto;
use taffy::style_helpers::{length, percent};
use taffy::{
    AlignContent, AlignItems, Dimension, Display, FlexDirection, FlexWrap, LengthPercentage,
    LengthPercentageAuto, Position, Rect, Style,
};

use super::paint::Color;
use crate::element::StyleValue;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineHeight {
    Normal,
    /// Multiple of the font size
    Factor(f32),
    Px(f32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub background: Option<Color>,
    pub color: Color,
    pub font_size: f32,
    pub font_family: Option<String>,
    pub line_height: LineHeight,
    pub text_align: TextAlign,
    /// Box properties handed to the layout solver. Never inherited.
    pub layout: Style,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            background: None,
            color: Color::BLACK,
            font_size: 16.0,
            font_family: None,
            line_height: LineHeight::Normal,
            text_align: TextAlign::Left,
            layout: block_style(),
        }
    }
}

/// Elements are block containers unless they ask for `display: flex`
pub fn block_style() -> Style {
    Style {
        display: Display::Block,
        ..Style::default()
    }
}

/// Expanded before their longhands regardless of declaration order
const SHORTHANDS: [&str; 4] = ["flex", "gap", "margin", "padding"];

fn invalid(prop: &str, value: &StyleValue) -> Error {
    Error::LayoutError(format!("Invalid value {:?} for {}", value.to_string(), prop))
}

impl ComputedStyle {
    /// Style of a child with `declared` properties; only text properties
    /// inherit
    pub fn cascade(&self, declared: &BTreeMap<String, StyleValue>) -> Result<Self> {
        let mut style = ComputedStyle {
            background: None,
            color: self.color,
            font_size: self.font_size,
            font_family: self.font_family.clone(),
            line_height: self.line_height,
            text_align: self.text_align,
            layout: block_style(),
        };

        let (shorthands, longhands): (Vec<_>, Vec<_>) = declared
            .iter()
            .partition(|(prop, _)| SHORTHANDS.contains(&prop.as_str()));

        for (prop, value) in shorthands.into_iter().chain(longhands) {
            match prop.as_str() {
                "backgroundColor" => {
                    style.background = Some(parse_color(value).ok_or_else(|| invalid(prop, value))?)
                }
                "color" => style.color = parse_color(value).ok_or_else(|| invalid(prop, value))?,
                "fontSize" => {
                    style.font_size = parse_length(value)
                        .filter(|v| *v > 0.0)
                        .ok_or_else(|| invalid(prop, value))?
                }
                "fontFamily" => {
                    style.font_family =
                        Some(parse_family(value).ok_or_else(|| invalid(prop, value))?)
                }
                "lineHeight" => {
                    style.line_height = parse_line_height(value).ok_or_else(|| invalid(prop, value))?
                }
                "textAlign" => {
                    style.text_align = parse_align(value).ok_or_else(|| invalid(prop, value))?
                }
                other => {
                    if !apply_layout(&mut style.layout, other, value)? {
                        log::warn!("Ignoring unsupported style property {}", other)
                    }
                }
            }
        }
        Ok(style)
    }

    pub fn line_height_px(&self) -> f32 {
        match self.line_height {
            LineHeight::Normal => self.font_size * 1.2,
            LineHeight::Factor(f) => self.font_size * f,
            LineHeight::Px(px) => px,
        }
    }
}

/// `12`, `"12"` or `"12px"`
pub fn parse_length(value: &StyleValue) -> Option<f32> {
    match value {
        StyleValue::Number(n) => n.is_finite().then_some(*n),
        StyleValue::Text(s) => parse_length_str(s),
    }
}

fn parse_length_str(s: &str) -> Option<f32> {
    let s = s.trim();
    let number = s.strip_suffix("px").unwrap_or(s);
    number.trim().parse::<f32>().ok().filter(|v| v.is_finite())
}

/// One length token of a box property
#[derive(Debug, Clone, Copy, PartialEq)]
enum Length {
    Px(f32),
    /// Fraction of the containing block
    Percent(f32),
    Auto,
}

impl Length {
    fn non_negative(self) -> bool {
        match self {
            Length::Px(v) | Length::Percent(v) => v >= 0.0,
            Length::Auto => true,
        }
    }

    fn dimension(self) -> Dimension {
        match self {
            Length::Px(v) => length(v),
            Length::Percent(v) => percent(v),
            Length::Auto => Dimension::AUTO,
        }
    }

    fn length_percentage(self) -> Option<LengthPercentage> {
        match self {
            Length::Px(v) => Some(length(v)),
            Length::Percent(v) => Some(percent(v)),
            Length::Auto => None,
        }
    }

    fn length_percentage_auto(self) -> LengthPercentageAuto {
        match self {
            Length::Px(v) => length(v),
            Length::Percent(v) => percent(v),
            Length::Auto => LengthPercentageAuto::AUTO,
        }
    }
}

/// Padding and gaps reject `auto` and negative values
fn non_negative_lp(l: Length) -> Option<LengthPercentage> {
    Some(l).filter(|l| l.non_negative()).and_then(Length::length_percentage)
}

fn parse_token(s: &str) -> Option<Length> {
    let s = s.trim();
    if s == "auto" {
        return Some(Length::Auto);
    }
    if let Some(p) = s.strip_suffix('%') {
        return p
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| Length::Percent(v / 100.0));
    }
    parse_length_str(s).map(Length::Px)
}

fn parse_token_value(value: &StyleValue) -> Option<Length> {
    match value {
        StyleValue::Number(_) => parse_length(value).map(Length::Px),
        StyleValue::Text(s) => parse_token(s),
    }
}

/// CSS-style shorthand with one to four values
fn parse_sides(value: &StyleValue) -> Option<Rect<Length>> {
    let values: Vec<Length> = match value {
        StyleValue::Number(_) => vec![parse_token_value(value)?],
        StyleValue::Text(s) => s.split_whitespace().map(parse_token).collect::<Option<Vec<_>>>()?,
    };
    let (top, right, bottom, left) = match values[..] {
        [v] => (v, v, v, v),
        [v, h] => (v, h, v, h),
        [t, h, b] => (t, h, b, h),
        [t, r, b, l] => (t, r, b, l),
        _ => return None,
    };
    Some(Rect {
        left,
        right,
        top,
        bottom,
    })
}

/// The edge of `rect` named by the suffix of `prop` (`marginTop`, `left`)
fn side<'r, T>(rect: &'r mut Rect<T>, prop: &str) -> &'r mut T {
    let prop = prop.to_ascii_lowercase();
    if prop.ends_with("top") {
        &mut rect.top
    } else if prop.ends_with("right") {
        &mut rect.right
    } else if prop.ends_with("bottom") {
        &mut rect.bottom
    } else {
        &mut rect.left
    }
}

fn keyword(value: &StyleValue) -> Option<&str> {
    match value {
        StyleValue::Text(s) => Some(s.trim()),
        StyleValue::Number(_) => None,
    }
}

fn parse_number(value: &StyleValue) -> Option<f32> {
    match value {
        StyleValue::Number(n) => Some(*n),
        StyleValue::Text(s) => s.trim().parse::<f32>().ok(),
    }
    .filter(|v| v.is_finite() && *v >= 0.0)
}

fn parse_content(value: &StyleValue) -> Option<AlignContent> {
    match keyword(value)? {
        "flex-start" => Some(AlignContent::FlexStart),
        "flex-end" => Some(AlignContent::FlexEnd),
        "start" => Some(AlignContent::Start),
        "end" => Some(AlignContent::End),
        "center" => Some(AlignContent::Center),
        "stretch" => Some(AlignContent::Stretch),
        "space-between" => Some(AlignContent::SpaceBetween),
        "space-around" => Some(AlignContent::SpaceAround),
        "space-evenly" => Some(AlignContent::SpaceEvenly),
        _ => None,
    }
}

fn parse_items(value: &StyleValue) -> Option<AlignItems> {
    match keyword(value)? {
        "flex-start" => Some(AlignItems::FlexStart),
        "flex-end" => Some(AlignItems::FlexEnd),
        "start" => Some(AlignItems::Start),
        "end" => Some(AlignItems::End),
        "center" => Some(AlignItems::Center),
        "baseline" => Some(AlignItems::Baseline),
        "stretch" => Some(AlignItems::Stretch),
        _ => None,
    }
}

/// `grow [shrink [basis]]`, or `auto` / `none`
fn apply_flex(layout: &mut Style, value: &StyleValue) -> Option<()> {
    let (grow, shrink, basis) = match value {
        StyleValue::Number(_) => (parse_number(value)?, 1.0, length(0.0_f32)),
        StyleValue::Text(s) => match s.trim() {
            "auto" => (1.0, 1.0, Dimension::AUTO),
            "none" => (0.0, 0.0, Dimension::AUTO),
            s => {
                let mut parts = s.split_whitespace();
                let grow = parts.next()?.parse::<f32>().ok().filter(|v| *v >= 0.0)?;
                let shrink = match parts.next() {
                    Some(p) => p.parse::<f32>().ok().filter(|v| *v >= 0.0)?,
                    None => 1.0,
                };
                let basis = match parts.next() {
                    Some(p) => parse_token(p)?.dimension(),
                    None => length(0.0_f32),
                };
                if parts.next().is_some() {
                    return None;
                }
                (grow, shrink, basis)
            }
        },
    };
    layout.flex_grow = grow;
    layout.flex_shrink = shrink;
    layout.flex_basis = basis;
    Some(())
}

/// Apply one box property to `layout`. Returns `false` for properties the
/// layout solver does not know.
fn apply_layout(layout: &mut Style, prop: &str, value: &StyleValue) -> Result<bool> {
    let bad = || invalid(prop, value);
    let size = || {
        parse_token_value(value)
            .filter(|l| l.non_negative())
            .map(Length::dimension)
            .ok_or_else(bad)
    };
    let spacing = || parse_token_value(value).and_then(non_negative_lp).ok_or_else(bad);

    match prop {
        "display" => {
            // there is no inline formatting; inline boxes lay out as blocks
            layout.display = match keyword(value) {
                Some("flex" | "inline-flex") => Display::Flex,
                Some("block" | "inline" | "inline-block") => Display::Block,
                Some("none") => Display::None,
                _ => return Err(bad()),
            }
        }
        "position" => {
            layout.position = match keyword(value) {
                Some("relative" | "static") => Position::Relative,
                Some("absolute") => Position::Absolute,
                _ => return Err(bad()),
            }
        }
        "top" | "right" | "bottom" | "left" => {
            *side(&mut layout.inset, prop) =
                parse_token_value(value).ok_or_else(bad)?.length_percentage_auto()
        }
        "width" => layout.size.width = size()?,
        "height" => layout.size.height = size()?,
        "minWidth" => layout.min_size.width = size()?,
        "minHeight" => layout.min_size.height = size()?,
        "maxWidth" => layout.max_size.width = size()?,
        "maxHeight" => layout.max_size.height = size()?,
        "flexDirection" => {
            layout.flex_direction = match keyword(value) {
                Some("row") => FlexDirection::Row,
                Some("row-reverse") => FlexDirection::RowReverse,
                Some("column") => FlexDirection::Column,
                Some("column-reverse") => FlexDirection::ColumnReverse,
                _ => return Err(bad()),
            }
        }
        "flexWrap" => {
            layout.flex_wrap = match keyword(value) {
                Some("nowrap") => FlexWrap::NoWrap,
                Some("wrap") => FlexWrap::Wrap,
                Some("wrap-reverse") => FlexWrap::WrapReverse,
                _ => return Err(bad()),
            }
        }
        "flex" => apply_flex(layout, value).ok_or_else(bad)?,
        "flexGrow" => layout.flex_grow = parse_number(value).ok_or_else(bad)?,
        "flexShrink" => layout.flex_shrink = parse_number(value).ok_or_else(bad)?,
        "flexBasis" => layout.flex_basis = size()?,
        "justifyContent" => layout.justify_content = Some(parse_content(value).ok_or_else(bad)?),
        "alignContent" => layout.align_content = Some(parse_content(value).ok_or_else(bad)?),
        "alignItems" => layout.align_items = Some(parse_items(value).ok_or_else(bad)?),
        "alignSelf" => layout.align_self = Some(parse_items(value).ok_or_else(bad)?),
        "gap" => {
            let values: Vec<Length> = match value {
                StyleValue::Number(_) => vec![parse_token_value(value).ok_or_else(bad)?],
                StyleValue::Text(s) => s
                    .split_whitespace()
                    .map(parse_token)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(bad)?,
            };
            let (row, column) = match values[..] {
                [v] => (v, v),
                [r, c] => (r, c),
                _ => return Err(bad()),
            };
            layout.gap.height = non_negative_lp(row).ok_or_else(bad)?;
            layout.gap.width = non_negative_lp(column).ok_or_else(bad)?;
        }
        "rowGap" => layout.gap.height = spacing()?,
        "columnGap" => layout.gap.width = spacing()?,
        "padding" => {
            let sides = parse_sides(value).ok_or_else(bad)?;
            layout.padding = Rect {
                left: non_negative_lp(sides.left).ok_or_else(bad)?,
                right: non_negative_lp(sides.right).ok_or_else(bad)?,
                top: non_negative_lp(sides.top).ok_or_else(bad)?,
                bottom: non_negative_lp(sides.bottom).ok_or_else(bad)?,
            };
        }
        "paddingTop" | "paddingRight" | "paddingBottom" | "paddingLeft" => {
            *side(&mut layout.padding, prop) = spacing()?
        }
        "margin" => {
            let sides = parse_sides(value).ok_or_else(bad)?;
            layout.margin = Rect {
                left: sides.left.length_percentage_auto(),
                right: sides.right.length_percentage_auto(),
                top: sides.top.length_percentage_auto(),
                bottom: sides.bottom.length_percentage_auto(),
            };
        }
        "marginTop" | "marginRight" | "marginBottom" | "marginLeft" => {
            *side(&mut layout.margin, prop) =
                parse_token_value(value).ok_or_else(bad)?.length_percentage_auto()
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn parse_family(value: &StyleValue) -> Option<String> {
    let StyleValue::Text(s) = value else {
        return None;
    };
    s.split(',')
        .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\''))
        .find(|f| !f.is_empty())
        .map(str::to_string)
}

fn parse_line_height(value: &StyleValue) -> Option<LineHeight> {
    match value {
        StyleValue::Number(n) if n.is_finite() && *n > 0.0 => Some(LineHeight::Factor(*n)),
        StyleValue::Number(_) => None,
        StyleValue::Text(s) => {
            let s = s.trim();
            if s == "normal" {
                Some(LineHeight::Normal)
            } else if s.ends_with("px") {
                parse_length_str(s).filter(|v| *v > 0.0).map(LineHeight::Px)
            } else {
                s.parse::<f32>().ok().filter(|v| *v > 0.0).map(LineHeight::Factor)
            }
        }
    }
}

fn parse_align(value: &StyleValue) -> Option<TextAlign> {
    match value {
        StyleValue::Text(s) => match s.trim() {
            "left" | "start" => Some(TextAlign::Left),
            "center" => Some(TextAlign::Center),
            "right" | "end" => Some(TextAlign::Right),
            _ => None,
        },
        StyleValue::Number(_) => None,
    }
}

/// Hex, `rgb()`/`rgba()` and a handful of named colors
pub fn parse_color(value: &StyleValue) -> Option<Color> {
    let StyleValue::Text(s) = value else {
        return None;
    };
    let s = s.trim().to_ascii_lowercase();

    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(args) = s
        .strip_prefix("rgba(")
        .or_else(|| s.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        let channel = |p: &str| p.parse::<u8>().ok();
        return match parts[..] {
            [r, g, b] => Some(Color::rgb(channel(r)?, channel(g)?, channel(b)?)),
            [r, g, b, a] => {
                let a = a.parse::<f32>().ok().filter(|a| (0.0..=1.0).contains(a))?;
                Some(Color {
                    r: channel(r)?,
                    g: channel(g)?,
                    b: channel(b)?,
                    a: (a * 255.0).round() as u8,
                })
            }
            _ => None,
        };
    }

    match s.as_str() {
        "black" => Some(Color::BLACK),
        "white" => Some(Color::rgb(255, 255, 255)),
        "red" => Some(Color::rgb(255, 0, 0)),
        "green" => Some(Color::rgb(0, 128, 0)),
        "blue" => Some(Color::rgb(0, 0, 255)),
        "yellow" => Some(Color::rgb(255, 255, 0)),
        "orange" => Some(Color::rgb(255, 165, 0)),
        "purple" => Some(Color::rgb(128, 0, 128)),
        "gray" | "grey" => Some(Color::rgb(128, 128, 128)),
        "transparent" => Some(Color::TRANSPARENT),
        _ => None,
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => Some(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
        4 => Some(Color {
            r: nibble(0)?,
            g: nibble(1)?,
            b: nibble(2)?,
            a: nibble(3)?,
        }),
        6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color {
            r: byte(0)?,
            g: byte(2)?,
            b: byte(4)?,
            a: byte(6)?,
        }),
        _ => None,
    }
}
