// src/dom/mod.rs

//! Synthetic, non-live document tree used by DOM-mode checks.
//!
//! - [`parse`] turns markup into a [`Document`] (lenient, never fails).
//! - [`select`] implements the CSS selector subset used by checks and by
//!   `document.query_selector` inside the sandbox.
//!
//! The tree is an arena: nodes are addressed by [`NodeId`] and detached
//! nodes simply stop being reachable from the root.

pub mod parse;
pub mod select;

pub use select::{SelectorError, SelectorList};

/// Index of a node inside its [`Document`] arena.
pub type NodeId = usize;

/// Elements that never have children or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An in-memory document tree.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document containing only the root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    fn push_node(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.create_element_with(tag.to_ascii_lowercase(), Vec::new())
    }

    pub(crate) fn create_element_with(
        &mut self,
        tag: String,
        attrs: Vec<(String, String)>,
    ) -> NodeId {
        self.push_node(NodeData::Element { tag, attrs })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push_node(NodeData::Text(text.into()))
    }

    pub(crate) fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push_node(NodeData::Comment(text.into()))
    }

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id).map(|n| &n.data)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// Parent of `id` if that parent is an element.
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|&p| self.is_element(p))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.data(id), Some(NodeData::Element { .. }))
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        match self.data(id) {
            Some(NodeData::Element { tag, .. }) => Some(tag.as_str()),
            _ => None,
        }
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Detach `id` from its parent. The node (and its subtree) stays in the
    /// arena and can be re-attached.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            self.nodes[parent].children.retain(|&c| c != id);
            self.nodes[id].parent = None;
        }
    }

    /// Append `child` as the last child of `parent`, moving it if it is
    /// already attached elsewhere.
    ///
    /// Returns `false` (and does nothing) if that would create a cycle or
    /// either id is unknown.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if parent >= self.nodes.len() || child >= self.nodes.len() || child == self.root() {
            return false;
        }
        if self.is_inclusive_ancestor(child, parent) {
            return false;
        }
        self.detach(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
        true
    }

    /// Insert `child` as the first child of `parent`.
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.append_child(parent, child) {
            return false;
        }
        let children = &mut self.nodes[parent].children;
        if let Some(last) = children.pop() {
            children.insert(0, last);
        }
        true
    }

    /// Remove every child of `id`.
    pub fn clear_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id].children);
        for child in children {
            self.nodes[child].parent = None;
        }
    }

    /// Pre-order descendants of `id`, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.data(id) {
            Some(NodeData::Element { attrs, .. }) => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        match self.data(id) {
            Some(NodeData::Element { attrs, .. }) => attrs,
            _ => &[],
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(Node {
            data: NodeData::Element { attrs, .. },
            ..
        }) = self.nodes.get_mut(id)
        {
            let name = name.to_ascii_lowercase();
            match attrs.iter_mut().find(|(k, _)| *k == name) {
                Some(entry) => entry.1 = value.to_string(),
                None => attrs.push((name, value.to_string())),
            }
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let Some(Node {
            data: NodeData::Element { attrs, .. },
            ..
        }) = self.nodes.get_mut(id)
        {
            attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        }
    }

    pub fn classes(&self, id: NodeId) -> Vec<&str> {
        self.attribute(id, "class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).contains(&class)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if class.is_empty() || self.has_class(id, class) {
            return;
        }
        let mut classes: Vec<String> = self.classes(id).into_iter().map(str::to_string).collect();
        classes.push(class.to_string());
        self.set_attribute(id, "class", &classes.join(" "));
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        if !self.has_class(id, class) {
            return;
        }
        let classes: Vec<String> = self
            .classes(id)
            .into_iter()
            .filter(|c| *c != class)
            .map(str::to_string)
            .collect();
        self.set_attribute(id, "class", &classes.join(" "));
    }

    /// Toggle `class`; returns whether it is present afterwards.
    pub fn toggle_class(&mut self, id: NodeId, class: &str) -> bool {
        if self.has_class(id, class) {
            self.remove_class(id, class);
            false
        } else {
            self.add_class(id, class);
            true
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(NodeData::Text(t)) = self.data(id) {
            return t.clone();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|n| match self.data(n) {
                Some(NodeData::Text(t)) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace all children of `id` with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        if let Some(Node {
            data: NodeData::Text(t),
            ..
        }) = self.nodes.get_mut(id)
        {
            *t = text.to_string();
            return;
        }
        if id >= self.nodes.len() {
            return;
        }
        self.clear_children(id);
        if !text.is_empty() {
            let node = self.create_text(text);
            self.append_child(id, node);
        }
    }

    fn child_with_tag(&self, parent: NodeId, tag: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&c| self.tag_name(c) == Some(tag))
    }

    /// The `<html>` element.
    pub fn document_element(&self) -> Option<NodeId> {
        self.child_with_tag(self.root(), "html")
    }

    pub fn head(&self) -> Option<NodeId> {
        self.document_element()
            .and_then(|html| self.child_with_tag(html, "head"))
    }

    pub fn body(&self) -> Option<NodeId> {
        self.document_element()
            .and_then(|html| self.child_with_tag(html, "body"))
    }

    pub fn get_element_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|&n| self.is_element(n) && self.attribute(n, "id") == Some(element_id))
    }

    /// First element below `scope` matching `selector`.
    pub fn query_selector(
        &self,
        scope: NodeId,
        selector: &str,
    ) -> Result<Option<NodeId>, SelectorError> {
        let list = SelectorList::parse(selector)?;
        Ok(self
            .descendants(scope)
            .into_iter()
            .find(|&n| list.matches(self, n)))
    }

    /// All elements below `scope` matching `selector`, in document order.
    pub fn query_selector_all(
        &self,
        scope: NodeId,
        selector: &str,
    ) -> Result<Vec<NodeId>, SelectorError> {
        let list = SelectorList::parse(selector)?;
        Ok(self.select_all(scope, &list))
    }

    pub fn select_all(&self, scope: NodeId, list: &SelectorList) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&n| list.matches(self, n))
            .collect()
    }

    /// Serialized markup of the children of `id`.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.serialize_into(child, &mut out);
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize_into(id, &mut out);
        out
    }

    /// Replace the children of `id` with the nodes parsed from `markup`.
    pub fn set_inner_html(&mut self, id: NodeId, markup: &str) {
        if id >= self.nodes.len() || matches!(self.data(id), Some(NodeData::Text(_))) {
            return;
        }
        self.clear_children(id);
        self.append_fragment(id, markup);
    }

    fn serialize_into(&self, id: NodeId, out: &mut String) {
        match self.data(id) {
            Some(NodeData::Document) => {
                for &child in self.children(id) {
                    self.serialize_into(child, out);
                }
            }
            Some(NodeData::Element { tag, attrs }) => {
                out.push('<');
                out.push_str(tag);
                for (k, v) in attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    out.push_str(&escape(v, true));
                    out.push('"');
                }
                out.push('>');
                if is_void_element(tag) {
                    return;
                }
                for &child in self.children(id) {
                    self.serialize_into(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            Some(NodeData::Text(t)) => out.push_str(&escape(t, false)),
            Some(NodeData::Comment(c)) => {
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->");
            }
            None => {}
        }
    }
}

fn escape(s: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document::parse(
            r#"<div id="app"><div class="card"><h1 id="title">Loading</h1><p id="description"></p></div></div>"#,
        )
    }

    #[test]
    fn class_list_operations() {
        let mut doc = sample();
        let app = doc.get_element_by_id("app").unwrap();
        assert!(doc.toggle_class(app, "dark"));
        assert!(doc.has_class(app, "dark"));
        doc.add_class(app, "dark");
        assert_eq!(doc.classes(app), vec!["dark"]);
        assert!(!doc.toggle_class(app, "dark"));
        assert!(doc.classes(app).is_empty());
    }

    #[test]
    fn set_text_content_replaces_children() {
        let mut doc = sample();
        let card = doc.query_selector(doc.root(), ".card").unwrap().unwrap();
        doc.set_text_content(card, "gone");
        assert_eq!(doc.text_content(card), "gone");
        assert!(doc.get_element_by_id("title").is_none());
    }

    #[test]
    fn append_child_refuses_cycles() {
        let mut doc = sample();
        let app = doc.get_element_by_id("app").unwrap();
        let title = doc.get_element_by_id("title").unwrap();
        assert!(!doc.append_child(title, app));
        assert!(doc.append_child(app, title));
        assert_eq!(doc.parent(title), Some(app));
    }

    #[test]
    fn inner_html_round_trips_through_set_inner_html() {
        let mut doc = sample();
        let desc = doc.get_element_by_id("description").unwrap();
        doc.set_inner_html(desc, "Hello <strong>there</strong> &amp; welcome");
        assert_eq!(doc.text_content(desc), "Hello there & welcome");
        assert_eq!(
            doc.inner_html(desc),
            "Hello <strong>there</strong> &amp; welcome"
        );
    }
}
