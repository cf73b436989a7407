//! Layout engine: element boxes are positioned by taffy (block and flex)
//! and text leaves are measured and painted as wrapped lines of glyph
//! outlines.

use std::collections::HashMap;

use futures::future::{join_all, BoxFuture};
use taffy::style_helpers::length;
use taffy::{AvailableSpace, Display, NodeId, Size, Style, TaffyError, TaffyTree};
use unicode_segmentation::UnicodeSegmentation;

use super::paint::{self, Color, PaintCommand};
use super::style::{ComputedStyle, TextAlign};
use super::text::{FontBook, GlyphKind, Shaper, TextStyle};
use super::{LayoutEngine, LayoutOptions};
use crate::assets::Asset;
use crate::element::{Element, Node};
use crate::emoji::is_emoji;
use crate::script::{script_code, EMOJI};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Zero-width and formatting characters that never need a font
fn is_invisible(ch: char) -> bool {
    ch.is_whitespace()
        || ch.is_control()
        || matches!(ch as u32, 0x200B..=0x200F | 0x2060..=0x206F | 0xFE00..=0xFE0F | 0xFEFF)
}

/// Asset requests for every text leaf, in tree order and without duplicates
pub fn collect_requests(tree: &Element, book: &FontBook<'_>) -> Vec<(String, String)> {
    let mut requests = Vec::new();
    collect_from(tree, book, &mut requests);
    requests
}

fn collect_from(element: &Element, book: &FontBook<'_>, out: &mut Vec<(String, String)>) {
    for child in &element.children {
        match child {
            Node::Text(text) => scan_text(text, book, out),
            Node::Element(el) => collect_from(el, book, out),
        }
    }
}

fn push_unique(out: &mut Vec<(String, String)>, code: &str, text: &str) {
    if !out.iter().any(|(c, t)| c == code && t == text) {
        out.push((code.to_string(), text.to_string()));
    }
}

fn scan_text(text: &str, book: &FontBook<'_>, out: &mut Vec<(String, String)>) {
    let mut run = String::new();
    let mut run_code = "";

    let flush = |run: &mut String, code: &str, out: &mut Vec<(String, String)>| {
        if !run.is_empty() {
            push_unique(out, code, run);
            run.clear();
        }
    };

    for grapheme in text.graphemes(true) {
        if is_emoji(grapheme) {
            flush(&mut run, run_code, out);
            push_unique(out, EMOJI, grapheme);
            continue;
        }
        for ch in grapheme.chars() {
            if is_invisible(ch) || book.covers(ch) {
                flush(&mut run, run_code, out);
                continue;
            }
            let code = script_code(ch);
            if code != run_code {
                flush(&mut run, run_code, out);
                run_code = code;
            }
            run.push(ch);
        }
    }
    flush(&mut run, run_code, out);
}

/// The built-in [`LayoutEngine`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockLayout;

impl LayoutEngine for BlockLayout {
    fn layout<'a>(&'a self, tree: &'a Element, options: LayoutOptions) -> BoxFuture<'a, Result<String>> {
        Box::pin(layout_tree(tree, options))
    }
}

/// Measurement input for a text leaf of the layout tree
struct TextLeaf<'t> {
    text: &'t str,
    size: f32,
    family: Option<String>,
    line_height: f32,
}

type LayoutTree<'t> = TaffyTree<TextLeaf<'t>>;

/// The element tree mirrored onto layout nodes, minus `display: none`
struct StyledNode<'t> {
    id: NodeId,
    style: ComputedStyle,
    kind: StyledKind<'t>,
}

enum StyledKind<'t> {
    Container(Vec<StyledNode<'t>>),
    Text(&'t str),
}

// Layout arithmetic can shave rounding error off a measured width
const WRAP_SLACK: f32 = 0.01;

fn layout_error(e: TaffyError) -> Error {
    Error::LayoutError(format!("Layout failed: {}", e))
}

fn build<'t>(
    tree: &mut LayoutTree<'t>,
    element: &'t Element,
    style: ComputedStyle,
) -> Result<Option<StyledNode<'t>>> {
    if style.layout.display == Display::None {
        return Ok(None);
    }

    let mut children = Vec::new();
    for child in &element.children {
        match child {
            Node::Text(text) => {
                if text.trim().is_empty() {
                    continue;
                }
                let leaf = TextLeaf {
                    text,
                    size: style.font_size,
                    family: style.font_family.clone(),
                    line_height: style.line_height_px(),
                };
                let id = tree
                    .new_leaf_with_context(Style::default(), leaf)
                    .map_err(layout_error)?;
                children.push(StyledNode {
                    id,
                    style: style.clone(),
                    kind: StyledKind::Text(text),
                });
            }
            Node::Element(el) => {
                if let Some(node) = build(tree, el, style.cascade(&el.style)?)? {
                    children.push(node);
                }
            }
        }
    }

    let ids: Vec<NodeId> = children.iter().map(|c| c.id).collect();
    let id = tree
        .new_with_children(style.layout.clone(), &ids)
        .map_err(layout_error)?;
    Ok(Some(StyledNode {
        id,
        style,
        kind: StyledKind::Container(children),
    }))
}

fn measure_text(
    shaper: &Shaper<'_, '_>,
    known: Size<Option<f32>>,
    available: Size<AvailableSpace>,
    leaf: Option<&mut TextLeaf<'_>>,
) -> Size<f32> {
    let Some(leaf) = leaf else {
        return Size::ZERO;
    };
    let style = TextStyle {
        size: leaf.size,
        family: leaf.family.as_deref(),
    };
    let width = known.width.unwrap_or_else(|| {
        let (min, max) = shaper.content_widths(leaf.text, &style);
        match available.width {
            AvailableSpace::MinContent => min,
            AvailableSpace::MaxContent => max,
            AvailableSpace::Definite(limit) => limit.min(max).max(min),
        }
    });
    let lines = shaper.wrap(leaf.text, &style, width + WRAP_SLACK);
    Size {
        width,
        height: known
            .height
            .unwrap_or(lines.len() as f32 * leaf.line_height),
    }
}

async fn layout_tree(tree: &Element, options: LayoutOptions) -> Result<String> {
    let LayoutOptions {
        width,
        height,
        debug,
        mut fonts,
        loader,
    } = options;

    let requests = {
        let book = FontBook::new(&fonts);
        collect_requests(tree, &book)
    };
    if !requests.is_empty() {
        log::debug!("Resolving {} asset requests", requests.len());
    }

    let resolved = join_all(requests.iter().map(|(code, text)| loader.load(code, text))).await;

    let mut emoji: HashMap<String, String> = HashMap::new();
    for ((code, text), result) in requests.iter().zip(resolved) {
        match result {
            Ok(Asset::Image(uri)) => {
                emoji.insert(text.clone(), uri);
            }
            Ok(Asset::Fonts(extra)) => fonts.extend(extra),
            Err(e) if code == EMOJI => return Err(e),
            Err(e) => log::warn!("Font request {} for {:?} failed: {}", code, text, e),
        }
    }

    let book = FontBook::new(&fonts);
    let lookup = |grapheme: &str| emoji.get(grapheme).cloned();
    let shaper = Shaper {
        book: &book,
        emoji: &lookup,
    };

    // the root covers the canvas whatever it declares
    let mut root_style = ComputedStyle::default().cascade(&tree.style)?;
    root_style.layout.size = Size {
        width: length(width as f32),
        height: length(height as f32),
    };
    root_style.layout.margin = <Style>::default().margin;

    let mut boxes: LayoutTree<'_> = TaffyTree::new();
    boxes.disable_rounding();
    let Some(root) = build(&mut boxes, tree, root_style)? else {
        return Ok(paint::to_svg(width, height, &[]));
    };

    boxes
        .compute_layout_with_measure(
            root.id,
            Size {
                width: AvailableSpace::Definite(width as f32),
                height: AvailableSpace::Definite(height as f32),
            },
            |known, available, _node, leaf, _style| measure_text(&shaper, known, available, leaf),
        )
        .map_err(layout_error)?;

    let mut painter = Painter {
        shaper,
        debug,
        commands: Vec::new(),
    };
    painter.node(&boxes, &root, 0.0, 0.0)?;

    Ok(paint::to_svg(width, height, &painter.commands))
}

struct Painter<'a, 'b> {
    shaper: Shaper<'a, 'b>,
    debug: bool,
    commands: Vec<PaintCommand>,
}

impl Painter<'_, '_> {
    /// Paint `node` and its subtree; (`x`, `y`) is the parent's border box
    /// origin
    fn node(&mut self, tree: &LayoutTree<'_>, node: &StyledNode<'_>, x: f32, y: f32) -> Result<()> {
        let layout = tree.layout(node.id).map_err(layout_error)?;
        let rect = Rect {
            x: x + layout.location.x,
            y: y + layout.location.y,
            width: layout.size.width,
            height: layout.size.height,
        };

        match &node.kind {
            StyledKind::Text(text) => self.text(text, &node.style, rect.x, rect.y, rect.width),
            StyledKind::Container(children) => {
                if let Some(color) = node.style.background {
                    self.commands.push(PaintCommand::Fill { rect, color });
                }
                for child in children {
                    self.node(tree, child, rect.x, rect.y)?;
                }
                if self.debug {
                    self.commands.push(PaintCommand::Outline {
                        rect,
                        color: Color::DEBUG_BOX,
                    });
                }
            }
        }
        Ok(())
    }

    /// Paint one text leaf into the box taffy gave it
    fn text(&mut self, text: &str, style: &ComputedStyle, x: f32, y: f32, width: f32) {
        let size = style.font_size;
        let family = style.font_family.as_deref();
        let lines = self
            .shaper
            .wrap(text, &TextStyle { size, family }, width + WRAP_SLACK);

        let book = self.shaper.book;
        let line_height = style.line_height_px();
        let (ascender, descender) = book.metrics(book.primary(family), size);
        let mut path = String::new();

        for (i, line) in lines.iter().enumerate() {
            let top = y + i as f32 * line_height;
            let baseline = top + (line_height - (ascender - descender)) / 2.0 + ascender;
            let offset = match style.text_align {
                TextAlign::Left => 0.0,
                TextAlign::Center => (width - line.width) / 2.0,
                TextAlign::Right => width - line.width,
            };

            for glyph in &line.glyphs {
                let gx = x + offset + glyph.x;
                match &glyph.kind {
                    GlyphKind::Outline { font, glyph: id } => {
                        book.outline(*font, *id, gx, baseline, size, &mut path)
                    }
                    GlyphKind::Emoji(uri) => self.commands.push(PaintCommand::Image {
                        rect: Rect {
                            x: gx,
                            y: top + (line_height - size) / 2.0,
                            width: size,
                            height: size,
                        },
                        href: uri.clone(),
                    }),
                    GlyphKind::Tofu => self.commands.push(PaintCommand::Tofu {
                        rect: Rect {
                            x: gx + size * 0.1,
                            y: baseline - size * 0.7,
                            width: (glyph.advance - size * 0.2).max(1.0),
                            height: size * 0.7,
                        },
                        color: style.color,
                    }),
                }
            }

            if self.debug {
                self.commands.push(PaintCommand::Outline {
                    rect: Rect {
                        x: x + offset,
                        y: top,
                        width: line.width,
                        height: line_height,
                    },
                    color: Color::DEBUG_LINE,
                });
            }
        }

        self.commands.push(PaintCommand::Glyphs {
            path,
            color: style.color,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetLoader, NoopLoader};
    use crate::rendering::text::fmt_num;
    use crate::FontDescriptor;
    use std::sync::{Arc, Mutex};

    fn dejavu() -> Vec<FontDescriptor> {
        vec![FontDescriptor::new(
            "sans serif",
            Arc::<[u8]>::from(&include_bytes!("../../assets/DejaVuSans.ttf")[..]),
        )]
    }

    fn options(fonts: Vec<FontDescriptor>, loader: Arc<dyn AssetLoader>) -> LayoutOptions {
        LayoutOptions {
            width: 200,
            height: 100,
            debug: false,
            fonts,
            loader,
        }
    }

    /// Records requests and answers emoji with a fixed image
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, String)>>,
    }

    impl AssetLoader for Recorder {
        fn load<'a>(&'a self, code: &'a str, text: &'a str) -> BoxFuture<'a, Result<Asset>> {
            self.seen.lock().unwrap().push((code.to_string(), text.to_string()));
            Box::pin(async move {
                if code == EMOJI {
                    Ok(Asset::Image("data:image/svg+xml;base64,AA==".into()))
                } else {
                    Ok(Asset::Fonts(Vec::new()))
                }
            })
        }
    }

    struct FailingLoader;

    impl AssetLoader for FailingLoader {
        fn load<'a>(&'a self, _code: &'a str, _text: &'a str) -> BoxFuture<'a, Result<Asset>> {
            Box::pin(async { Err(Error::EmojiResolutionError("offline".into())) })
        }
    }

    #[test]
    fn requests_group_scripts_and_emoji() {
        let fonts = dejavu();
        let book = FontBook::new(&fonts);
        let tree = Element::new("div")
            .with_child("Hi 你好 😀 こんにちは 😀")
            .with_child(Element::new("p").with_child("你好"));
        let requests = collect_requests(&tree, &book);
        assert_eq!(
            requests,
            vec![
                ("zh-CN|zh-TW|zh-HK".to_string(), "你好".to_string()),
                ("emoji".to_string(), "😀".to_string()),
                ("ja-JP".to_string(), "こんにちは".to_string()),
            ]
        );
    }

    #[test]
    fn default_presentation_symbols_request_emoji() {
        let fonts = dejavu();
        let book = FontBook::new(&fonts);
        let tree = Element::new("div").with_child("Done ✅ ⭐ ☕");
        assert_eq!(
            collect_requests(&tree, &book),
            vec![
                ("emoji".to_string(), "✅".to_string()),
                ("emoji".to_string(), "⭐".to_string()),
                ("emoji".to_string(), "☕".to_string()),
            ]
        );
    }

    #[test]
    fn covered_text_needs_nothing() {
        let fonts = dejavu();
        let book = FontBook::new(&fonts);
        let tree = Element::new("div").with_child("Hello, world!\n\t");
        assert!(collect_requests(&tree, &book).is_empty());
    }

    #[tokio::test]
    async fn emoji_become_images() {
        let recorder = Arc::new(Recorder::default());
        let tree = Element::new("div").with_child("ok 😀");
        let svg = BlockLayout.layout(&tree, options(dejavu(), recorder.clone())).await.unwrap();
        assert!(svg.contains(r#"xlink:href="data:image/svg+xml;base64,AA==""#));
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![("emoji".to_string(), "😀".to_string())]
        );
    }

    #[tokio::test]
    async fn emoji_failure_aborts() {
        let tree = Element::new("div").with_child("😀");
        let err = BlockLayout
            .layout(&tree, options(dejavu(), Arc::new(FailingLoader)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmojiResolutionError(_)));
    }

    #[tokio::test]
    async fn root_fills_canvas_with_background() {
        let tree = Element::new("div").with_style("backgroundColor", "#fff");
        let svg = BlockLayout.layout(&tree, options(dejavu(), Arc::new(NoopLoader))).await.unwrap();
        assert!(svg.contains(r##"<rect x="0" y="0" width="200" height="100" fill="#ffffff"/>"##));
    }

    #[tokio::test]
    async fn debug_outlines_boxes_and_lines() {
        let tree = Element::new("div").with_child("Hello");
        let mut opts = options(dejavu(), Arc::new(NoopLoader));
        opts.debug = true;
        let svg = BlockLayout.layout(&tree, opts).await.unwrap();
        assert!(svg.contains(r##"stroke="#ff0000""##));
        assert!(svg.contains(r##"stroke="#0000ff""##));
        assert!(svg.contains("<path"));
    }

    #[tokio::test]
    async fn invalid_style_is_layout_error() {
        let tree = Element::new("div").with_style("padding", "lots");
        let err = BlockLayout
            .layout(&tree, options(dejavu(), Arc::new(NoopLoader)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LayoutError(_)));
    }

    #[tokio::test]
    async fn output_is_deterministic() {
        let tree = Element::new("div")
            .with_style("padding", 12.0)
            .with_style("textAlign", "center")
            .with_child(Element::new("h1").with_style("fontSize", 32.0).with_child("Title"))
            .with_child("Body text that wraps across more than one line of the box");
        let a = BlockLayout.layout(&tree, options(dejavu(), Arc::new(NoopLoader))).await.unwrap();
        let b = BlockLayout.layout(&tree, options(dejavu(), Arc::new(NoopLoader))).await.unwrap();
        assert_eq!(a, b);
    }

    async fn boxes(tree: &Element) -> Result<String> {
        BlockLayout.layout(tree, options(dejavu(), Arc::new(NoopLoader))).await
    }

    fn no_emoji(_: &str) -> Option<String> {
        None
    }

    fn swatch(color: &str) -> Element {
        Element::new("div")
            .with_style("width", 40.0)
            .with_style("height", 20.0)
            .with_style("backgroundColor", color)
    }

    #[tokio::test]
    async fn blocks_stack_inside_padding() {
        let tree = Element::new("div")
            .with_style("padding", 10.0)
            .with_child(swatch("#ff0000"))
            .with_child(swatch("#00ff00").with_style("marginTop", 5.0));
        let svg = boxes(&tree).await.unwrap();
        assert!(svg.contains(r##"<rect x="10" y="10" width="40" height="20" fill="#ff0000"/>"##));
        assert!(svg.contains(r##"<rect x="10" y="35" width="40" height="20" fill="#00ff00"/>"##));
    }

    #[tokio::test]
    async fn flex_row_centers_children() {
        let tree = Element::new("div")
            .with_style("display", "flex")
            .with_style("justifyContent", "center")
            .with_style("alignItems", "center")
            .with_child(swatch("#ff0000"))
            .with_child(swatch("#00ff00"));
        let svg = boxes(&tree).await.unwrap();
        assert!(svg.contains(r##"<rect x="60" y="40" width="40" height="20" fill="#ff0000"/>"##));
        assert!(svg.contains(r##"<rect x="100" y="40" width="40" height="20" fill="#00ff00"/>"##));
    }

    #[tokio::test]
    async fn flex_grow_and_gap_share_the_row() {
        let tree = Element::new("div")
            .with_style("display", "flex")
            .with_style("gap", 20.0)
            .with_child(
                Element::new("div")
                    .with_style("flexGrow", 1.0)
                    .with_style("backgroundColor", "#ff0000"),
            )
            .with_child(
                Element::new("div")
                    .with_style("flexGrow", 1.0)
                    .with_style("backgroundColor", "#00ff00"),
            );
        let svg = boxes(&tree).await.unwrap();
        assert!(svg.contains(r##"<rect x="0" y="0" width="90" height="100" fill="#ff0000"/>"##));
        assert!(svg.contains(r##"<rect x="110" y="0" width="90" height="100" fill="#00ff00"/>"##));
    }

    #[tokio::test]
    async fn display_none_paints_nothing() {
        let tree = Element::new("div")
            .with_child(swatch("#ff0000").with_style("display", "none"))
            .with_child(swatch("#00ff00"));
        let svg = boxes(&tree).await.unwrap();
        assert!(!svg.contains("#ff0000"));
        assert!(svg.contains(r##"<rect x="0" y="0" width="40" height="20" fill="#00ff00"/>"##));
    }

    #[tokio::test]
    async fn text_wraps_to_its_flex_item() {
        let fonts = dejavu();
        let book = FontBook::new(&fonts);
        let shaper = Shaper {
            book: &book,
            emoji: &no_emoji,
        };
        let style = TextStyle {
            size: 16.0,
            family: None,
        };
        let (min, _) = shaper.content_widths("one two six", &style);

        let tree = Element::new("div")
            .with_style("display", "flex")
            .with_style("alignItems", "flex-start")
            .with_child(
            Element::new("div")
                .with_style("width", min)
                .with_style("backgroundColor", "#ff0000")
                .with_child("one two six"),
        );
        let svg = boxes(&tree).await.unwrap();
        // three lines of the default 19.2px line height
        let expected = format!(r##"width="{}" height="57.6" fill="#ff0000"/>"##, fmt_num(min));
        assert!(svg.contains(&expected), "{}", svg);
    }
}
