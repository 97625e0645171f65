//! Arena-based DOM for page rewriting.
//!
//! Nodes live in one contiguous vector and refer to each other by index, so
//! passes can hold [`NodeId`]s across mutations. Ids are never reused: a node
//! that is detached keeps its id (and its payload) but is no longer reachable
//! from the document root.

use html5ever::{LocalName, Namespace, QualName, ns};

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The document root is always the first node allocated.
    pub const ROOT: NodeId = NodeId(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Node payload.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root.
    Document,
    /// Document type declaration.
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
    /// Element with name and attributes.
    Element {
        name: QualName,
        attrs: Vec<Attribute>,
        /// Pre-extracted id for fast matching.
        id: Option<String>,
        /// Pre-extracted classes for fast matching.
        classes: Vec<String>,
    },
    /// Text content (entities already decoded).
    Text(String),
    /// Comment.
    Comment(String),
}

/// HTML attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

impl Attribute {
    /// Attribute in the null namespace, which is where every HTML attribute lives.
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: QualName::new(None, ns!(), LocalName::from(name)),
            value: value.into(),
        }
    }
}

/// A node in the arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub prev_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }
}

/// Build an HTML-namespace element name.
pub fn html_name(local: &str) -> QualName {
    QualName::new(None, ns!(html), LocalName::from(local))
}

/// Arena-allocated node tree with a single document root.
#[derive(Debug, Clone)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    /// Create an arena holding only the document root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Document)],
        }
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(data));
        id
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// Number of nodes ever allocated, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Create a new, detached element node.
    pub fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>) -> NodeId {
        let (id, classes) = extract_id_and_classes(&attrs);
        self.alloc(NodeData::Element {
            name,
            attrs,
            id,
            classes,
        })
    }

    /// Shorthand for an HTML element with `(name, value)` attributes.
    pub fn create_html_element(&mut self, local: &str, attrs: &[(&str, &str)]) -> NodeId {
        let attrs = attrs
            .iter()
            .map(|(name, value)| Attribute::new(name, *value))
            .collect();
        self.create_element(html_name(local), attrs)
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Comment(text.into()))
    }

    pub fn create_doctype(&mut self, name: String, public_id: String, system_id: String) -> NodeId {
        self.alloc(NodeData::Doctype {
            name,
            public_id,
            system_id,
        })
    }

    /// Unlink a node from its parent and siblings. Its subtree stays intact.
    pub fn detach(&mut self, id: NodeId) {
        let (parent, prev, next) = match self.node(id) {
            Some(n) => (n.parent, n.prev_sibling, n.next_sibling),
            None => return,
        };

        match prev {
            Some(prev) => self.nodes[prev.index()].next_sibling = next,
            None => {
                if let Some(parent) = parent {
                    self.nodes[parent.index()].first_child = next;
                }
            }
        }

        match next {
            Some(next) => self.nodes[next.index()].prev_sibling = prev,
            None => {
                if let Some(parent) = parent {
                    self.nodes[parent.index()].last_child = prev;
                }
            }
        }

        let node = &mut self.nodes[id.index()];
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        let last = self.nodes[parent.index()].last_child;

        {
            let node = &mut self.nodes[child.index()];
            node.parent = Some(parent);
            node.prev_sibling = last;
        }

        match last {
            Some(last) => self.nodes[last.index()].next_sibling = Some(child),
            None => self.nodes[parent.index()].first_child = Some(child),
        }
        self.nodes[parent.index()].last_child = Some(child);
    }

    /// Insert `child` as the first child of `parent`.
    pub fn prepend(&mut self, parent: NodeId, child: NodeId) {
        match self.nodes[parent.index()].first_child {
            Some(first) => self.insert_before(first, child),
            None => self.append(parent, child),
        }
    }

    /// Insert `new_node` immediately before `sibling`.
    pub fn insert_before(&mut self, sibling: NodeId, new_node: NodeId) {
        if sibling == new_node {
            return;
        }
        self.detach(new_node);
        let (parent, prev) = {
            let s = &self.nodes[sibling.index()];
            (s.parent, s.prev_sibling)
        };

        {
            let node = &mut self.nodes[new_node.index()];
            node.parent = parent;
            node.prev_sibling = prev;
            node.next_sibling = Some(sibling);
        }
        self.nodes[sibling.index()].prev_sibling = Some(new_node);

        match prev {
            Some(prev) => self.nodes[prev.index()].next_sibling = Some(new_node),
            None => {
                if let Some(parent) = parent {
                    self.nodes[parent.index()].first_child = Some(new_node);
                }
            }
        }
    }

    /// Insert `new_node` immediately after `sibling`.
    pub fn insert_after(&mut self, sibling: NodeId, new_node: NodeId) {
        match self.nodes[sibling.index()].next_sibling {
            Some(next) => self.insert_before(next, new_node),
            None => {
                if let Some(parent) = self.nodes[sibling.index()].parent {
                    self.append(parent, new_node);
                }
            }
        }
    }

    /// Put `new_node` where `old` is and detach `old`.
    pub fn replace(&mut self, old: NodeId, new_node: NodeId) {
        self.insert_before(old, new_node);
        self.detach(old);
    }

    /// Detach every child of `parent`.
    pub fn clear_children(&mut self, parent: NodeId) {
        while let Some(child) = self.nodes[parent.index()].first_child {
            self.detach(child);
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.next_sibling)
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.first_child)
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.last_child)
    }

    /// Whether the node is reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == NodeId::ROOT {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Iterate over children of a node.
    pub fn children(&self, parent: NodeId) -> ChildrenIter<'_> {
        ChildrenIter {
            arena: self,
            current: self.first_child(parent),
        }
    }

    /// All descendants of `id` in document order (excluding `id` itself).
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).collect();
        stack.reverse();
        while let Some(next) = stack.pop() {
            out.push(next);
            let mark = stack.len();
            stack.extend(self.children(next));
            stack[mark..].reverse();
        }
        out
    }

    /// Descendant elements of `id` with the given local name, in document order.
    pub fn elements_by_tag(&self, id: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&n| self.is_element_named(n, tag))
            .collect()
    }

    /// Deep-copy `id` from another arena into this one, returning the
    /// detached copy.
    pub fn import(&mut self, other: &NodeArena, id: NodeId) -> NodeId {
        let Some(node) = other.node(id) else {
            return self.create_text("");
        };
        let copy = self.alloc(node.data.clone());
        let children: Vec<_> = other.children(id).collect();
        for child in children {
            let child_copy = self.import(other, child);
            self.append(copy, child_copy);
        }
        copy
    }
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_id_and_classes(attrs: &[Attribute]) -> (Option<String>, Vec<String>) {
    let mut id = None;
    let mut classes = Vec::new();
    for attr in attrs {
        match attr.name.local.as_ref() {
            "id" => id = Some(attr.value.clone()),
            "class" => {
                classes = attr
                    .value
                    .split_whitespace()
                    .map(|s| s.to_string())
                    .collect()
            }
            _ => {}
        }
    }
    (id, classes)
}

/// Iterator over children of a node.
pub struct ChildrenIter<'a> {
    arena: &'a NodeArena,
    current: Option<NodeId>,
}

impl Iterator for ChildrenIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        self.current = self.arena.next_sibling(id);
        Some(id)
    }
}

/// Convenience methods for element and text nodes.
impl NodeArena {
    /// Get element's local name (tag).
    pub fn element_name(&self, id: NodeId) -> Option<&LocalName> {
        self.node(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(&name.local),
            _ => None,
        })
    }

    /// Get element's full name.
    pub fn qual_name(&self, id: NodeId) -> Option<&QualName> {
        self.node(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        })
    }

    /// Get element's namespace.
    pub fn element_namespace(&self, id: NodeId) -> Option<&Namespace> {
        self.qual_name(id).map(|name| &name.ns)
    }

    pub fn is_element_named(&self, id: NodeId, tag: &str) -> bool {
        self.element_name(id).is_some_and(|n| n.as_ref() == tag)
    }

    /// Get an attribute value.
    pub fn get_attr(&self, id: NodeId, attr_name: &str) -> Option<&str> {
        self.node(id).and_then(|n| match &n.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|a| a.name.local.as_ref() == attr_name)
                .map(|a| a.value.as_str()),
            _ => None,
        })
    }

    /// Set (or add) an attribute. No-op on non-elements.
    pub fn set_attr(&mut self, id: NodeId, attr_name: &str, value: &str) {
        let Some(NodeData::Element {
            attrs, id: elem_id, classes, ..
        }) = self.node_mut(id).map(|n| &mut n.data)
        else {
            return;
        };

        match attrs.iter_mut().find(|a| a.name.local.as_ref() == attr_name) {
            Some(attr) => attr.value = value.to_string(),
            None => attrs.push(Attribute::new(attr_name, value)),
        }
        let (new_id, new_classes) = extract_id_and_classes(attrs);
        *elem_id = new_id;
        *classes = new_classes;
    }

    /// Remove an attribute if present.
    pub fn remove_attr(&mut self, id: NodeId, attr_name: &str) {
        let Some(NodeData::Element {
            attrs, id: elem_id, classes, ..
        }) = self.node_mut(id).map(|n| &mut n.data)
        else {
            return;
        };

        attrs.retain(|a| a.name.local.as_ref() != attr_name);
        let (new_id, new_classes) = extract_id_and_classes(attrs);
        *elem_id = new_id;
        *classes = new_classes;
    }

    /// Get element's id attribute.
    pub fn element_id(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(|n| match &n.data {
            NodeData::Element { id, .. } => id.as_deref(),
            _ => None,
        })
    }

    /// Get element's classes.
    pub fn element_classes(&self, id: NodeId) -> &[String] {
        self.node(id)
            .and_then(|n| match &n.data {
                NodeData::Element { classes, .. } => Some(classes.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element_classes(id).iter().any(|c| c == class)
    }

    /// Check if node is an element.
    pub fn is_element(&self, id: NodeId) -> bool {
        self.node(id)
            .is_some_and(|n| matches!(n.data, NodeData::Element { .. }))
    }

    /// Check if node is a text node.
    pub fn is_text(&self, id: NodeId) -> bool {
        self.node(id)
            .is_some_and(|n| matches!(n.data, NodeData::Text(_)))
    }

    /// Get the content of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(|n| match &n.data {
            NodeData::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Concatenated text of `id` and all its descendants (DOM `textContent`).
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    /// Replace all children of `id` with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        if let Some(Node {
            data: NodeData::Text(existing),
            ..
        }) = self.node_mut(id)
        {
            *existing = text.to_string();
            return;
        }
        self.clear_children(id);
        if !text.is_empty() {
            let node = self.create_text(text);
            self.append(id, node);
        }
    }

    /// Whether every child of `id` is a text node (vacuously true when empty).
    pub fn has_only_text_children(&self, id: NodeId) -> bool {
        self.children(id).all(|c| self.is_text(c))
    }
}
