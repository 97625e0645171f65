//! html5ever TreeSink implementation for NodeArena.
//!
//! Used for markup that has no source location: rendered math, icon
//! fragments and HTML inserted by page scripts. The span-recording parser in
//! [`super::parser`] handles page sources.

use std::cell::RefCell;

use html5ever::driver::ParseOpts;
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeBuilderOpts, TreeSink};
use html5ever::{Attribute as Html5Attribute, QualName, parse_document};

use super::arena::{Attribute, NodeArena, NodeData, NodeId};

/// TreeSink implementation that builds a NodeArena.
///
/// Uses interior mutability (RefCell) because html5ever's TreeSink trait
/// requires methods to take `&self` but we need to mutate the tree.
pub struct FragmentSink {
    arena: RefCell<NodeArena>,
    quirks_mode: RefCell<QuirksMode>,
}

impl Default for FragmentSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentSink {
    pub fn new() -> Self {
        Self {
            arena: RefCell::new(NodeArena::new()),
            quirks_mode: RefCell::new(QuirksMode::NoQuirks),
        }
    }

    /// Consume the sink and return the tree.
    pub fn into_arena(self) -> NodeArena {
        self.arena.into_inner()
    }

    fn append_text(arena: &mut NodeArena, parent: NodeId, text: &str) {
        if let Some(last) = arena.last_child(parent)
            && let Some(NodeData::Text(existing)) = arena.node_mut(last).map(|n| &mut n.data)
        {
            existing.push_str(text);
            return;
        }
        let node = arena.create_text(text);
        arena.append(parent, node);
    }
}

/// Parse an HTML fragment as body content.
///
/// Returns a scratch arena and the top-level nodes of the fragment, which
/// are children of the scratch document's `body`.
pub fn parse_fragment(html: &str) -> (NodeArena, Vec<NodeId>) {
    let wrapped = format!("<html><head></head><body>{html}</body></html>");
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            scripting_enabled: false,
            ..Default::default()
        },
        ..Default::default()
    };
    let sink = parse_document(FragmentSink::new(), opts)
        .from_utf8()
        .one(wrapped.as_bytes());
    let arena = sink.into_arena();

    let nodes = arena
        .elements_by_tag(arena.root(), "body")
        .first()
        .map(|&body| arena.children(body).collect())
        .unwrap_or_default();
    (arena, nodes)
}

impl TreeSink for FragmentSink {
    type Handle = NodeId;
    type Output = Self;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self
    }

    fn parse_error(&self, _msg: std::borrow::Cow<'static, str>) {}

    fn get_document(&self) -> Self::Handle {
        self.arena.borrow().root()
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        static EMPTY: QualName = QualName {
            prefix: None,
            ns: html5ever::ns!(),
            local: html5ever::local_name!(""),
        };

        let arena = self.arena.borrow();
        match arena.qual_name(*target) {
            // SAFETY: nodes are never dropped while the sink is alive, and
            // html5ever only holds the name for a comparison, before the next
            // node is allocated.
            Some(name) => unsafe { std::mem::transmute::<&QualName, &'a QualName>(name) },
            None => &EMPTY,
        }
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Html5Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        let attrs = attrs
            .into_iter()
            .map(|a| Attribute {
                name: a.name,
                value: a.value.to_string(),
            })
            .collect();
        self.arena.borrow_mut().create_element(name, attrs)
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        self.arena.borrow_mut().create_comment(text.to_string())
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        self.arena.borrow_mut().create_comment(String::new())
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        let mut arena = self.arena.borrow_mut();
        match child {
            NodeOrText::AppendNode(node) => arena.append(*parent, node),
            NodeOrText::AppendText(text) => Self::append_text(&mut arena, *parent, &text),
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let parent = self.arena.borrow().parent(*element);
        match parent {
            Some(parent) => self.append(&parent, child),
            None => self.append(prev_element, child),
        }
    }

    fn append_doctype_to_document(
        &self,
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    ) {
        let mut arena = self.arena.borrow_mut();
        let doctype = arena.create_doctype(
            name.to_string(),
            public_id.to_string(),
            system_id.to_string(),
        );
        let root = arena.root();
        arena.append(root, doctype);
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        *target
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        x == y
    }

    fn set_quirks_mode(&self, mode: QuirksMode) {
        *self.quirks_mode.borrow_mut() = mode;
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let mut arena = self.arena.borrow_mut();
        match new_node {
            NodeOrText::AppendNode(node) => arena.insert_before(*sibling, node),
            NodeOrText::AppendText(text) => {
                let node = arena.create_text(text.to_string());
                arena.insert_before(*sibling, node);
            }
        }
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Html5Attribute>) {
        let mut arena = self.arena.borrow_mut();
        for attr in attrs {
            if arena.get_attr(*target, &attr.name.local).is_none() {
                arena.set_attr(*target, &attr.name.local, &attr.value);
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        self.arena.borrow_mut().detach(*target);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let mut arena = self.arena.borrow_mut();
        let children: Vec<_> = arena.children(*node).collect();
        for child in children {
            arena.append(*new_parent, child);
        }
    }
}
