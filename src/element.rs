//! Element tree consumed by the layout engine.
//!
//! Trees are produced by an external builder (a JSX evaluator, the HTML front
//! end in [`crate::html`], or plain JSON). A JSON string is a text leaf and a
//! JSON object is an element:
//!
//! ```
//! let tree: ogrender::Element = serde_json::from_str(
//!     r##"{"tag":"div","style":{"fontSize":32,"color":"#fff"},"children":["Hello"]}"##,
//! ).unwrap();
//! assert_eq!(tree.tag, "div");
//! assert_eq!(tree.text_content(), "Hello");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A node of the element tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Text(String),
    Element(Element),
}

/// A styled element with ordered children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    #[serde(default)]
    pub style: BTreeMap<String, StyleValue>,
    #[serde(default)]
    pub children: Vec<Node>,
}

/// A raw style value as written by the tree builder (`32` or `"32px"`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StyleValue {
    Number(f32),
    Text(String),
}

impl fmt::Display for StyleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleValue::Number(n) => write!(f, "{}", n),
            StyleValue::Text(s) => f.write_str(s),
        }
    }
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            style: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style helper to set a style property
    pub fn with_style(mut self, key: impl Into<String>, value: impl Into<StyleValue>) -> Self {
        self.style.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Concatenated text of every descendant text leaf, in document order
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => collect_text(e, out),
        }
    }
}

impl From<Element> for Node {
    fn from(e: Element) -> Self {
        Node::Element(e)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Text(s.to_string())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Text(s)
    }
}

impl From<f32> for StyleValue {
    fn from(n: f32) -> Self {
        StyleValue::Number(n)
    }
}

impl From<f64> for StyleValue {
    fn from(n: f64) -> Self {
        StyleValue::Number(n as f32)
    }
}

impl From<&str> for StyleValue {
    fn from(s: &str) -> Self {
        StyleValue::Text(s.to_string())
    }
}

impl From<String> for StyleValue {
    fn from(s: String) -> Self {
        StyleValue::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_nested_tree() {
        let json = r#"{"tag":"div","children":[{"tag":"span","style":{"padding":"8px"},"children":["a"]},"b"]}"#;
        let tree: Element = serde_json::from_str(json).unwrap();
        assert_eq!(tree.children.len(), 2);
        match &tree.children[0] {
            Node::Element(span) => {
                assert_eq!(span.style.get("padding"), Some(&StyleValue::Text("8px".into())));
            }
            _ => panic!("expected element"),
        }
        assert_eq!(tree.text_content(), "ab");
    }

    #[test]
    fn builder_helpers() {
        let tree = Element::new("div")
            .with_style("fontSize", 24.0)
            .with_child("Hi");
        assert_eq!(tree.style.get("fontSize"), Some(&StyleValue::Number(24.0)));
        assert_eq!(tree.children, vec![Node::Text("Hi".into())]);
    }
}
