//! Owned element trees and HTML serialization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Document, NodeId};

/// Detached description of an element subtree.
///
/// Used both for fragments the widget builds and for page snapshots loaded
/// from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    #[must_use]
    pub fn element(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            text: None,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs
            .insert(name.to_ascii_lowercase(), value.to_owned());
        self
    }

    #[must_use]
    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_owned());
        self
    }

    #[must_use]
    pub fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }
}

fn escape(raw: &str, out: &mut String) {
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

pub(super) fn write_html(doc: &Document, id: NodeId, out: &mut String) {
    let Some(tag) = doc.tag(id) else {
        return;
    };
    out.push('<');
    out.push_str(tag);
    for (name, value) in doc.attrs(id) {
        out.push(' ');
        out.push_str(name);
        if !value.is_empty() {
            out.push_str("=\"");
            escape(value, out);
            out.push('"');
        }
    }
    out.push('>');
    if let Some(text) = doc.text(id) {
        escape(text, out);
    }
    for &child in doc.children(id) {
        write_html(doc, child, out);
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}
