//! Source locations recorded at parse time.
//!
//! Every node the span-recording parser creates gets a [`Span`] into the
//! page's original source. Nodes created later (rendered math, icons, markup
//! inserted by page scripts) have no span; they are *synthetic* and
//! [`SourceIndex::location_of`] returns `None` for them.

use std::collections::HashMap;

use super::arena::NodeId;

/// Byte range a node was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Offset of the first byte (the `<` of a start tag, or the first text byte).
    pub start: usize,
    /// Offset one past the last byte. For an element whose end tag was never
    /// seen this is where the parser implicitly closed it.
    pub end: usize,
    /// Offset where the element's children end: the start of its end tag, or
    /// `end` when there is none. Equal to `end` for non-elements.
    pub content_end: usize,
    /// Whether the element's end is known: its end tag was consumed, it is a
    /// void element, or repair inferred where it ends.
    pub has_closing_tag: bool,
}

impl Span {
    /// Span of a leaf node (text, comment, doctype).
    pub fn leaf(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            content_end: end,
            has_closing_tag: true,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Provenance of every node: spanned (from source) or synthetic.
#[derive(Debug, Clone, Default)]
pub struct SourceIndex {
    spans: HashMap<NodeId, Span>,
}

impl SourceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where `node` came from in the source, or `None` for synthetic nodes.
    pub fn location_of(&self, node: NodeId) -> Option<Span> {
        self.spans.get(&node).copied()
    }

    pub fn is_synthetic(&self, node: NodeId) -> bool {
        !self.spans.contains_key(&node)
    }

    pub(crate) fn record(&mut self, node: NodeId, span: Span) {
        self.spans.insert(node, span);
    }

    pub(crate) fn get_mut(&mut self, node: NodeId) -> Option<&mut Span> {
        self.spans.get_mut(&node)
    }

    /// Record the end repair inferred for an element that had no end tag.
    pub(crate) fn resolve_end(&mut self, node: NodeId, content_end: usize, end: usize) {
        if let Some(span) = self.spans.get_mut(&node) {
            span.content_end = content_end;
            span.end = end;
            span.has_closing_tag = true;
        }
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}
