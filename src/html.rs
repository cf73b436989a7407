//! HTML front end: parses markup into an [`Element`] tree.

use scraper::{ElementRef, Html};

use crate::element::{Element, Node, StyleValue};
use crate::Result;

const SKIPPED: &[&str] = &["script", "style", "head", "title", "meta", "link", "template"];

/// Parse an HTML fragment.
///
/// A fragment with a single top-level element yields that element; anything
/// else is wrapped in a `div`.
pub fn parse_html(source: &str) -> Result<Element> {
    let fragment = Html::parse_fragment(source);
    let root = fragment.root_element();
    let mut children = convert_children(root);

    let element_count = children.iter().filter(|n| matches!(n, Node::Element(_))).count();
    if children.len() == 1 && element_count == 1 {
        if let Some(Node::Element(el)) = children.pop() {
            return Ok(el);
        }
    }
    Ok(Element {
        tag: "div".to_string(),
        style: Default::default(),
        children,
    })
}

fn convert(el: ElementRef<'_>) -> Element {
    let value = el.value();
    let style = value.attr("style").map(parse_style_attr).unwrap_or_default();
    Element {
        tag: value.name().to_string(),
        style,
        children: convert_children(el),
    }
}

fn convert_children(el: ElementRef<'_>) -> Vec<Node> {
    let mut children = Vec::new();
    for child in el.children() {
        match child.value() {
            scraper::Node::Text(text) => {
                if !text.trim().is_empty() {
                    children.push(Node::Text(text.to_string()));
                }
            }
            scraper::Node::Element(e) if SKIPPED.contains(&e.name()) => {}
            scraper::Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    children.push(Node::Element(convert(child_el)));
                }
            }
            _ => {}
        }
    }
    children
}

/// `font-size: 12px; background-color: red` into camelCase properties
pub fn parse_style_attr(attr: &str) -> std::collections::BTreeMap<String, StyleValue> {
    attr.split(';')
        .filter_map(|decl| decl.split_once(':'))
        .map(|(prop, value)| (camel_case(prop.trim()), value.trim()))
        .filter(|(prop, value)| !prop.is_empty() && !value.is_empty())
        .map(|(prop, value)| (prop, StyleValue::Text(value.to_string())))
        .collect()
}

fn camel_case(prop: &str) -> String {
    let mut out = String::with_capacity(prop.len());
    let mut upper = false;
    for ch in prop.chars() {
        if ch == '-' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch.to_ascii_lowercase());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_root_element() {
        let el = parse_html(r#"<div style="background-color: #fff; font-size: 32px">Hello <b>there</b></div>"#).unwrap();
        assert_eq!(el.tag, "div");
        assert_eq!(el.style.get("backgroundColor"), Some(&StyleValue::Text("#fff".into())));
        assert_eq!(el.style.get("fontSize"), Some(&StyleValue::Text("32px".into())));
        assert_eq!(el.children.len(), 2);
        assert_eq!(el.children[0], Node::Text("Hello ".into()));
    }

    #[test]
    fn skips_scripts_and_blank_text() {
        let el = parse_html("<div>\n  <script>alert(1)</script>\n  <p>x</p>\n</div>").unwrap();
        assert_eq!(el.children.len(), 1);
        assert!(matches!(&el.children[0], Node::Element(p) if p.tag == "p"));
    }

    #[test]
    fn multiple_roots_are_wrapped() {
        let el = parse_html("<p>a</p><p>b</p>").unwrap();
        assert_eq!(el.tag, "div");
        assert_eq!(el.children.len(), 2);
        let el = parse_html("plain text").unwrap();
        assert_eq!(el.children, vec![Node::Text("plain text".into())]);
    }

    #[test]
    fn camel_cases_properties() {
        assert_eq!(camel_case("background-color"), "backgroundColor");
        assert_eq!(camel_case("-webkit-line-clamp"), "webkitLineClamp");
        assert_eq!(camel_case("COLOR"), "color");
    }
}
