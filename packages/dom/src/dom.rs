//! Arena-backed document tree.
//!
//! Nodes are never freed: removing a node detaches it from its parent and it
//! stays addressable by its [`NodeId`]. Only mutations to nodes connected to
//! the document root are reported to observers.

use crate::observer::{MutationKind, MutationRecord};
use dve_model::NODE_MARKER_ATTR;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    /// Lowercase tag name
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

impl ElementData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|value| value.split_ascii_whitespace().any(|c| c == class))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Document,
    Doctype(String),
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

type Listener = Box<dyn FnMut(&MutationRecord)>;

pub struct Document {
    nodes: Vec<Node>,
    listeners: Vec<Listener>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.nodes.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
            listeners: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attr(name))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Parent if it is an element (never the document node)
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.is_element(*p))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |c| self.is_element(*c))
    }

    /// Element siblings preceding `id`, nearest first
    pub fn previous_element_siblings(&self, id: NodeId) -> Vec<NodeId> {
        let Some(parent) = self.parent(id) else {
            return Vec::new();
        };
        let siblings = self.children(parent);
        let index = siblings.iter().position(|c| *c == id).unwrap_or(0);
        siblings[..index]
            .iter()
            .rev()
            .copied()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|c| *c == id)?;
        siblings.get(index + 1).copied()
    }

    /// Pre-order descendants of `id`, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Elements connected to the document, in document order
    pub fn elements(&self) -> Vec<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|id| self.is_element(*id))
            .collect()
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root() {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    pub fn find_element<F>(&self, predicate: F) -> Option<NodeId>
    where
        F: Fn(&ElementData) -> bool,
    {
        self.elements()
            .into_iter()
            .find(|id| self.element(*id).is_some_and(&predicate))
    }

    pub fn get_element_by_id(&self, value: &str) -> Option<NodeId> {
        self.find_element(|el| el.attr("id") == Some(value))
    }

    pub fn first_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.find_element(|el| el.tag.eq_ignore_ascii_case(tag))
    }

    pub fn head(&self) -> Option<NodeId> {
        self.first_by_tag("head")
    }

    pub fn body(&self) -> Option<NodeId> {
        self.first_by_tag("body")
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        match self.data(id) {
            NodeData::Text(text) | NodeData::Comment(text) => text.clone(),
            _ => self
                .descendants(id)
                .into_iter()
                .filter_map(|d| match self.data(d) {
                    NodeData::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Element key of the nearest ancestor-or-self carrying the node marker
    pub fn nearest_marker_key(&self, id: NodeId) -> Option<String> {
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(key) = self.attr(node, NODE_MARKER_ATTR) {
                return Some(key.to_string());
            }
            current = self.parent(node);
        }
        None
    }

    // -- construction --------------------------------------------------------

    fn push(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Comment(text.into()))
    }

    pub fn create_doctype(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Doctype(text.into()))
    }

    // -- mutation --------------------------------------------------------------

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let NodeData::Element(el) = &mut self.nodes[id.0].data else {
            return;
        };
        match el.attrs.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some((_, existing)) if *existing == value => return,
            Some((_, existing)) => *existing = value.to_string(),
            None => el.attrs.push((name.to_ascii_lowercase(), value.to_string())),
        }
        self.notify(MutationKind::Attributes(name.to_ascii_lowercase()), id);
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        let NodeData::Element(el) = &mut self.nodes[id.0].data else {
            return;
        };
        let before = el.attrs.len();
        el.attrs.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        if el.attrs.len() != before {
            self.notify(MutationKind::Attributes(name.to_ascii_lowercase()), id);
        }
    }

    /// Replace the payload of a text or comment node
    pub fn set_character_data(&mut self, id: NodeId, text: &str) {
        match &mut self.nodes[id.0].data {
            NodeData::Text(existing) | NodeData::Comment(existing) => {
                *existing = text.to_string();
            }
            _ => return,
        }
        self.notify(MutationKind::CharacterData, id);
    }

    /// Detach `id` from its parent
    pub fn remove(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id.0].parent.take() else {
            return;
        };
        let connected = self.is_connected(parent);
        self.nodes[parent.0].children.retain(|c| *c != id);
        if connected {
            self.notify(MutationKind::ChildList, parent);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        let first = self.children(parent).first().copied();
        self.insert_before(parent, child, first);
    }

    /// Insert `child` under `parent` before `reference` (append when `None`
    /// or when `reference` is not a child of `parent`).
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if child == parent || self.is_ancestor(child, parent) {
            return;
        }
        self.remove(child);
        let children = &mut self.nodes[parent.0].children;
        let index = reference
            .and_then(|r| children.iter().position(|c| *c == r))
            .unwrap_or(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        self.notify(MutationKind::ChildList, parent);
    }

    /// Insert every node of `nodes` before `reference`, preserving order
    pub fn insert_all_before(&mut self, parent: NodeId, nodes: &[NodeId], reference: Option<NodeId>) {
        for node in nodes {
            self.insert_before(parent, *node, reference);
        }
    }

    pub fn remove_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        if children.is_empty() {
            return;
        }
        for child in &children {
            self.nodes[child.0].parent = None;
        }
        self.notify(MutationKind::ChildList, id);
    }

    /// Replace all children with a single text node
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        if !self.is_element(id) {
            self.set_character_data(id, text);
            return;
        }
        if let [only] = self.children(id) {
            let only = *only;
            if matches!(self.data(only), NodeData::Text(existing) if existing == text) {
                return;
            }
        }
        self.remove_children(id);
        if !text.is_empty() {
            let node = self.create_text(text);
            self.append_child(id, node);
        }
    }

    fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    // -- observation -----------------------------------------------------------

    /// Register a callback invoked for every mutation of a connected node
    pub fn observe(&mut self, listener: Box<dyn FnMut(&MutationRecord)>) {
        self.listeners.push(listener);
    }

    pub fn disconnect_observers(&mut self) {
        self.listeners.clear();
    }

    fn notify(&mut self, kind: MutationKind, target: NodeId) {
        if self.listeners.is_empty() || !self.is_connected(target) {
            return;
        }
        let record = MutationRecord {
            kind,
            target,
            marker_key: self.nearest_marker_key(target),
        };
        for listener in self.listeners.iter_mut() {
            listener(&record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sample() -> (Document, NodeId, NodeId) {
        let mut doc = Document::new();
        let html = doc.create_element("HTML");
        let body = doc.create_element("body");
        let root = doc.root();
        doc.append_child(root, html);
        doc.append_child(html, body);
        (doc, html, body)
    }

    #[test]
    fn test_tags_are_lowercased() {
        let (doc, html, _) = sample();
        assert_eq!(doc.tag(html), Some("html"));
        assert_eq!(doc.body(), Some(doc.children(html)[0]));
    }

    #[test]
    fn test_insert_before_reorders() {
        let (mut doc, _, body) = sample();
        let a = doc.create_element("p");
        let b = doc.create_element("div");
        doc.append_child(body, a);
        doc.insert_before(body, b, Some(a));
        assert_eq!(doc.children(body), &[b, a]);

        // re-inserting moves rather than duplicates
        doc.append_child(body, b);
        assert_eq!(doc.children(body), &[a, b]);
    }

    #[test]
    fn test_cannot_insert_ancestor_into_descendant() {
        let (mut doc, html, body) = sample();
        doc.append_child(body, html);
        assert_eq!(doc.parent(html), Some(doc.root()));
    }

    #[test]
    fn test_text_content() {
        let (mut doc, _, body) = sample();
        doc.set_text_content(body, "hello");
        assert_eq!(doc.text_content(body), "hello");
        doc.set_text_content(body, "");
        assert!(doc.children(body).is_empty());
    }

    #[test]
    fn test_observers_see_connected_mutations_only() {
        let (mut doc, _, body) = sample();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        doc.observe(Box::new(move |record: &MutationRecord| sink.borrow_mut().push(record.clone())));

        let detached = doc.create_element("span");
        doc.set_attr(detached, "class", "x");
        assert!(seen.borrow().is_empty());

        doc.set_attr(body, NODE_MARKER_ATTR, "hero");
        doc.append_child(body, detached);
        let records = seen.borrow();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].kind, MutationKind::ChildList);
        assert_eq!(records[1].marker_key.as_deref(), Some("hero"));
    }

    #[test]
    fn test_set_attr_same_value_is_silent() {
        let (mut doc, _, body) = sample();
        doc.set_attr(body, "id", "main");
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        doc.observe(Box::new(move |_: &MutationRecord| *sink.borrow_mut() += 1));
        doc.set_attr(body, "id", "main");
        assert_eq!(*count.borrow(), 0);
    }
}
