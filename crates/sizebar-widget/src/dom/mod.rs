//! In-process document model the engine reads and augments.
//!
//! The host renderer owns the tree and may detach or replace nodes at any
//! time; callers therefore re-check [`Document::is_attached`] before acting
//! on a node they looked up earlier. Node ids are never reused, so a
//! [`NodeId`] is a stable identity for the lifetime of the document.
//!
//! Structural changes that touch the attached tree are broadcast to
//! subscribers as [`Mutation`] records, in the spirit of a DOM
//! `MutationObserver`.

mod markup;
mod selector;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

pub use markup::NodeSpec;
pub use selector::{SelectorError, SelectorList};

use selector::{Compound, Selector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Added { parent: NodeId, node: NodeId },
    Removed { parent: NodeId, node: NodeId },
}

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    observers: Vec<mpsc::UnboundedSender<Mutation>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates a document containing only a `body` root.
    #[must_use]
    pub fn new() -> Self {
        let root = Node {
            tag: "body".to_owned(),
            attrs: BTreeMap::new(),
            text: None,
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            observers: Vec::new(),
        }
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Receives a [`Mutation`] for every node added to or removed from the
    /// attached tree from now on.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Mutation> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    fn emit(&mut self, mutation: Mutation) {
        self.observers.retain(|tx| tx.send(mutation).is_ok());
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Creates a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            text: None,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    #[must_use]
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|n| n.tag.as_str())
    }

    #[must_use]
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node(id)
            .and_then(|n| n.attrs.get(&name.to_ascii_lowercase()))
            .map(String::as_str)
    }

    #[must_use]
    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.attrs
                .insert(name.to_ascii_lowercase(), value.to_owned());
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.attrs.remove(&name.to_ascii_lowercase());
        }
    }

    #[must_use]
    pub fn attrs(&self, id: NodeId) -> Vec<(&str, &str)> {
        self.node(id)
            .map(|n| {
                n.attrs
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whitespace-separated tokens of the `class` attribute.
    pub fn classes(&self, id: NodeId) -> impl Iterator<Item = &str> {
        self.attr(id, "class")
            .unwrap_or_default()
            .split_whitespace()
    }

    #[must_use]
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).any(|c| c == class)
    }

    #[must_use]
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(|n| n.text.as_deref())
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.text = Some(text.to_owned());
        }
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    /// `true` while `id` is reachable from the root.
    #[must_use]
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || self.ancestors(id).any(|a| a == self.root)
    }

    /// Descendants of `id` in document order, excluding `id` itself.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    fn unlink(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get_mut(id.0)?.parent.take()?;
        if let Some(p) = self.nodes.get_mut(parent.0) {
            p.children.retain(|&c| c != id);
        }
        Some(parent)
    }

    fn detach_for_move(&mut self, id: NodeId) {
        let was_attached = self.is_attached(id);
        if let Some(parent) = self.unlink(id) {
            if was_attached {
                self.emit(Mutation::Removed { parent, node: id });
            }
        }
    }

    fn valid_move(&self, parent: NodeId, child: NodeId) -> bool {
        self.node(parent).is_some()
            && self.node(child).is_some()
            && child != self.root
            && parent != child
            && !self.ancestors(parent).any(|a| a == child)
    }

    /// Appends `child` as the last child of `parent`, moving it if it
    /// already has a parent. Returns `false` for a move that would create a
    /// cycle.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.valid_move(parent, child) {
            return false;
        }
        self.detach_for_move(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        if self.is_attached(child) {
            self.emit(Mutation::Added {
                parent,
                node: child,
            });
        }
        true
    }

    /// Inserts `node` immediately after `reference` under the same parent.
    /// Returns `false` if `reference` has no parent.
    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) -> bool {
        let Some(parent) = self.parent(reference) else {
            return false;
        };
        if !self.valid_move(parent, node) || node == reference {
            return false;
        }
        self.detach_for_move(node);
        let siblings = &mut self.nodes[parent.0].children;
        let at = siblings
            .iter()
            .position(|&c| c == reference)
            .map_or(siblings.len(), |i| i + 1);
        siblings.insert(at, node);
        self.nodes[node.0].parent = Some(parent);
        if self.is_attached(node) {
            self.emit(Mutation::Added { parent, node });
        }
        true
    }

    /// Detaches `id` (and its subtree) from its parent.
    pub fn remove(&mut self, id: NodeId) {
        self.detach_for_move(id);
    }

    /// `true` if `node` matches any selector in `list`.
    #[must_use]
    pub fn matches(&self, node: NodeId, list: &SelectorList) -> bool {
        list.selectors.iter().any(|s| self.matches_selector(node, s))
    }

    fn matches_selector(&self, node: NodeId, selector: &Selector) -> bool {
        let Some((last, rest)) = selector.parts.split_last() else {
            return false;
        };
        if !self.matches_compound(node, last) {
            return false;
        }
        let mut ancestors = self.ancestors(node);
        rest.iter()
            .rev()
            .all(|part| ancestors.any(|a| self.matches_compound(a, part)))
    }

    fn matches_compound(&self, id: NodeId, compound: &Compound) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        if compound.tag.as_deref().is_some_and(|t| t != node.tag) {
            return false;
        }
        if compound
            .id
            .as_deref()
            .is_some_and(|want| node.attrs.get("id").map(String::as_str) != Some(want))
        {
            return false;
        }
        if !compound.classes.iter().all(|c| self.has_class(id, c)) {
            return false;
        }
        compound
            .attrs
            .iter()
            .all(|test| test.matches(node.attrs.get(&test.name).map(String::as_str)))
    }

    /// Descendants of `scope` matching `list`, in document order.
    #[must_use]
    pub fn query_all(&self, scope: NodeId, list: &SelectorList) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&n| self.matches(n, list))
            .collect()
    }

    /// First descendant of `scope` matching `list`.
    #[must_use]
    pub fn query(&self, scope: NodeId, list: &SelectorList) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|&n| self.matches(n, list))
    }

    /// Nearest ancestor of `id` (excluding itself) matching `list`.
    #[must_use]
    pub fn closest_ancestor(&self, id: NodeId, list: &SelectorList) -> Option<NodeId> {
        self.ancestors(id).find(|&a| self.matches(a, list))
    }

    /// Materializes `spec` as a detached subtree and returns its root.
    pub fn create_from_spec(&mut self, spec: &NodeSpec) -> NodeId {
        let id = self.create_element(&spec.tag);
        for (name, value) in &spec.attrs {
            self.set_attr(id, name, value);
        }
        if let Some(text) = &spec.text {
            self.set_text(id, text);
        }
        for child in &spec.children {
            let child_id = self.create_from_spec(child);
            self.nodes[child_id.0].parent = Some(id);
            self.nodes[id.0].children.push(child_id);
        }
        id
    }

    /// Materializes `spec` and appends it under `parent`.
    pub fn append_spec(&mut self, parent: NodeId, spec: &NodeSpec) -> NodeId {
        let id = self.create_from_spec(spec);
        self.append_child(parent, id);
        id
    }

    /// Materializes `spec` and inserts it right after `reference`.
    pub fn insert_spec_after(&mut self, reference: NodeId, spec: &NodeSpec) -> Option<NodeId> {
        let id = self.create_from_spec(spec);
        self.insert_after(reference, id).then_some(id)
    }

    /// Builds a document whose body holds `children`.
    #[must_use]
    pub fn from_specs(children: &[NodeSpec]) -> Self {
        let mut doc = Self::new();
        let root = doc.root();
        for child in children {
            doc.append_spec(root, child);
        }
        doc
    }

    /// Serializes `id` and its subtree as HTML.
    #[must_use]
    pub fn to_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        markup::write_html(self, id, &mut out);
        out
    }

    /// Converts `id` and its subtree back into a [`NodeSpec`].
    #[must_use]
    pub fn to_spec(&self, id: NodeId) -> NodeSpec {
        NodeSpec {
            tag: self.tag(id).unwrap_or_default().to_owned(),
            attrs: self
                .attrs(id)
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
            text: self.text(id).map(str::to_owned),
            children: self.children(id).iter().map(|&c| self.to_spec(c)).collect(),
        }
    }
}

/// Shared handle to a [`Document`].
///
/// Locks are held only for synchronous sections and never across an
/// `.await`.
#[derive(Debug, Clone, Default)]
pub struct Page {
    doc: Arc<Mutex<Document>>,
}

impl Page {
    #[must_use]
    pub fn new(doc: Document) -> Self {
        Self {
            doc: Arc::new(Mutex::new(doc)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        let mut guard = self.doc.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
