//! Page tree with source provenance.
//!
//! A [`Document`] owns three things that travel together through the
//! pipeline: the node tree, the original source text, and the
//! [`SourceIndex`] that maps every parsed node back to its byte range in
//! that source. Nodes added after parsing are synthetic and have no span.

pub mod arena;
pub mod parser;
pub mod select;
pub mod serialize;
pub mod span;
pub mod tokenizer;
pub mod tree_sink;

pub use arena::{Attribute, NodeArena, NodeData, NodeId, html_name};
pub use select::Selector;
pub use span::{SourceIndex, Span};

/// One parsed page.
#[derive(Debug, Clone, Default)]
pub struct Document {
    tree: NodeArena,
    index: SourceIndex,
    source: String,
}

impl Document {
    /// Parse a page, recording the source span of every node.
    pub fn parse(source: impl Into<String>) -> Self {
        let source = source.into();
        let (tree, index) = parser::parse_document(&source);
        Self {
            tree,
            index,
            source,
        }
    }

    /// The text the document was parsed from. Never changes.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tree(&self) -> &NodeArena {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut NodeArena {
        &mut self.tree
    }

    pub fn index(&self) -> &SourceIndex {
        &self.index
    }

    pub(crate) fn index_mut(&mut self) -> &mut SourceIndex {
        &mut self.index
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// Where `node` came from, or `None` if it is synthetic.
    pub fn location_of(&self, node: NodeId) -> Option<Span> {
        self.index.location_of(node)
    }

    pub fn select(&self, selector: &Selector) -> Vec<NodeId> {
        selector.select(&self.tree, self.root())
    }

    pub fn select_first(&self, selector: &Selector) -> Option<NodeId> {
        selector.select_first(&self.tree, self.root())
    }

    /// Text of the first `<title>` element.
    pub fn title(&self) -> Option<String> {
        self.tree
            .elements_by_tag(self.root(), "title")
            .first()
            .map(|&t| self.tree.text_content(t))
    }

    /// Serialize the whole page.
    pub fn to_html(&self) -> String {
        serialize::outer_html(&self.tree, self.root())
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        serialize::outer_html(&self.tree, node)
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        serialize::inner_html(&self.tree, node)
    }

    /// Parse markup that did not come from the page source. The returned
    /// nodes are detached and synthetic.
    pub fn parse_synthetic(&mut self, html: &str) -> Vec<NodeId> {
        let (scratch, nodes) = tree_sink::parse_fragment(html);
        nodes
            .into_iter()
            .map(|node| self.tree.import(&scratch, node))
            .collect()
    }

    /// Re-parse `source[start..end]`. The returned nodes are detached and
    /// keep their true source spans.
    pub(crate) fn reparse(&mut self, start: usize, end: usize) -> Vec<NodeId> {
        parser::parse_fragment_into(&self.source, &mut self.tree, &mut self.index, start, end)
    }
}
