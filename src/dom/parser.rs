//! Span-recording tree builder.
//!
//! Builds a [`NodeArena`] from the [`Tokenizer`]'s output and records the
//! source range of every node it creates in a [`SourceIndex`]. The builder
//! follows the HTML tree construction rules that matter for generated pages:
//!
//! - void elements never take children;
//! - a `<p>` is implicitly closed by a block-level start tag, `<li>` by the
//!   next `<li>`, `<dt>`/`<dd>` by each other, `<option>` by the next one;
//! - an `<a>` start tag while an `<a>` is open closes the open one (and
//!   everything opened inside it), so anchors never nest;
//! - end tags with no matching open element are dropped, and the text on
//!   either side of a dropped tag becomes one text node whose span covers it.
//!
//! Elements closed implicitly keep `has_closing_tag = false` and an `end` at
//! the point where they were closed.

use html5ever::{LocalName, Namespace, QualName, ns};

use super::arena::{Attribute, NodeArena, NodeData, NodeId, html_name};
use super::span::{SourceIndex, Span};
use super::tokenizer::{Token, TokenKind, Tokenizer};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Start tags that close an open `p`.
const CLOSES_P: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "details",
    "div",
    "dl",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hgroup",
    "hr",
    "main",
    "menu",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "ul",
];

/// Elements that stop the search for an element to close implicitly.
const SCOPE_BOUNDARIES: &[&str] = &[
    "applet", "button", "caption", "html", "marquee", "object", "table", "td", "template", "th",
];

/// Parse a whole page.
pub fn parse_document(src: &str) -> (NodeArena, SourceIndex) {
    let mut arena = NodeArena::new();
    let mut index = SourceIndex::new();
    let root = arena.root();
    TreeBuilder::new(src, &mut arena, &mut index, root).run(0, src.len());
    (arena, index)
}

/// Parse `src[start..end]` into `arena`, recording absolute spans. The new
/// nodes are returned detached, in source order.
pub fn parse_fragment_into(
    src: &str,
    arena: &mut NodeArena,
    index: &mut SourceIndex,
    start: usize,
    end: usize,
) -> Vec<NodeId> {
    let container = arena.create_element(html_name("body"), Vec::new());
    TreeBuilder::new(src, arena, index, container).run(start, end);

    let children: Vec<_> = arena.children(container).collect();
    for &child in &children {
        arena.detach(child);
    }
    children
}

struct TreeBuilder<'a> {
    src: &'a str,
    arena: &'a mut NodeArena,
    index: &'a mut SourceIndex,
    /// Stack of open elements; `open[0]` is the container and is never popped.
    open: Vec<NodeId>,
}

impl<'a> TreeBuilder<'a> {
    fn new(
        src: &'a str,
        arena: &'a mut NodeArena,
        index: &'a mut SourceIndex,
        container: NodeId,
    ) -> Self {
        Self {
            src,
            arena,
            index,
            open: vec![container],
        }
    }

    fn run(&mut self, start: usize, end: usize) {
        for token in Tokenizer::with_range(self.src, start, end) {
            self.process(token);
        }
        self.pop_to(1, end);
    }

    fn current(&self) -> NodeId {
        self.open[self.open.len() - 1]
    }

    fn process(&mut self, token: Token) {
        let Token { kind, start, end } = token;
        match kind {
            TokenKind::Doctype { name } => {
                let id = self.arena.create_doctype(name, String::new(), String::new());
                self.insert_leaf(id, start, end);
            }
            TokenKind::Comment(text) => {
                let id = self.arena.create_comment(text);
                self.insert_leaf(id, start, end);
            }
            TokenKind::Text(text) => self.text(text, start, end),
            TokenKind::StartTag {
                name,
                attrs,
                self_closing,
            } => self.start_tag(&name, attrs, self_closing, start, end),
            TokenKind::EndTag { name } => self.end_tag(&name, start, end),
        }
    }

    fn insert_leaf(&mut self, id: NodeId, start: usize, end: usize) {
        self.arena.append(self.current(), id);
        self.index.record(id, Span::leaf(start, end));
    }

    fn text(&mut self, text: String, start: usize, end: usize) {
        let parent = self.current();

        // Merge with a directly preceding text run.
        if let Some(last) = self.arena.last_child(parent)
            && self.index.location_of(last).is_some_and(|s| s.end == start)
            && let Some(NodeData::Text(existing)) =
                self.arena.node_mut(last).map(|n| &mut n.data)
        {
            existing.push_str(&text);
            if let Some(span) = self.index.get_mut(last) {
                span.end = end;
                span.content_end = end;
            }
            return;
        }

        let id = self.arena.create_text(text);
        self.insert_leaf(id, start, end);
    }

    fn start_tag(
        &mut self,
        name: &str,
        attrs: Vec<(String, String)>,
        self_closing: bool,
        start: usize,
        end: usize,
    ) {
        if name == "a"
            && let Some(pos) = self.find_open("a", &[])
        {
            self.pop_to(pos, start);
        }

        if CLOSES_P.contains(&name) {
            self.close_in_scope("p", SCOPE_BOUNDARIES, start);
        }
        match name {
            "li" => self.close_in_scope("li", &["ul", "ol"], start),
            "dt" | "dd" => {
                self.close_in_scope("dt", &["dl"], start);
                self.close_in_scope("dd", &["dl"], start);
            }
            "option" => self.close_in_scope("option", &["select", "datalist"], start),
            _ => {}
        }

        let ns = self.namespace_for(name);
        let foreign = ns != ns!(html);
        // SVG and MathML names are case-sensitive; take them as written.
        let local = if foreign {
            &self.src[start + 1..start + 1 + name.len()]
        } else {
            name
        };
        let attrs = attrs
            .into_iter()
            .map(|(name, value)| {
                let name = if foreign { name } else { name.to_ascii_lowercase() };
                Attribute::new(&name, value)
            })
            .collect();
        let id = self
            .arena
            .create_element(QualName::new(None, ns, LocalName::from(local)), attrs);
        self.arena.append(self.current(), id);

        let complete = (!foreign && VOID_ELEMENTS.contains(&name)) || (foreign && self_closing);
        self.index.record(
            id,
            Span {
                start,
                end,
                content_end: end,
                has_closing_tag: complete,
            },
        );
        if !complete {
            self.open.push(id);
        }
    }

    fn end_tag(&mut self, name: &str, start: usize, end: usize) {
        let Some(pos) = self.find_open(name, &[]) else {
            self.drop_stray_end_tag(start, end);
            return;
        };

        self.pop_to(pos + 1, start);
        let id = self.open.pop().unwrap_or(NodeId::ROOT);
        if let Some(span) = self.index.get_mut(id) {
            span.content_end = start;
            span.end = end;
            span.has_closing_tag = true;
        }
    }

    /// A dropped end tag is folded into a directly preceding text run, so
    /// that text which follows merges with it.
    fn drop_stray_end_tag(&mut self, start: usize, end: usize) {
        if let Some(last) = self.arena.last_child(self.current())
            && self.arena.is_text(last)
            && let Some(span) = self.index.get_mut(last)
            && span.end == start
        {
            span.end = end;
            span.content_end = end;
        }
    }

    fn namespace_for(&self, name: &str) -> Namespace {
        match name {
            "svg" => ns!(svg),
            "math" => ns!(mathml),
            _ => match self.arena.element_namespace(self.current()) {
                Some(ns) if *ns == ns!(svg) && name != "foreignobject" => ns!(svg),
                Some(ns) if *ns == ns!(mathml) => ns!(mathml),
                _ => ns!(html),
            },
        }
    }

    /// Position in the open stack of the innermost open `name`, not looking
    /// past any of `boundaries`.
    fn find_open(&self, name: &str, boundaries: &[&str]) -> Option<usize> {
        for pos in (1..self.open.len()).rev() {
            let id = self.open[pos];
            let Some(local) = self.arena.element_name(id) else {
                continue;
            };
            if local.as_ref().eq_ignore_ascii_case(name) {
                return Some(pos);
            }
            if boundaries.contains(&local.as_ref()) {
                return None;
            }
        }
        None
    }

    fn close_in_scope(&mut self, name: &str, boundaries: &[&str], at: usize) {
        if let Some(pos) = self.find_open(name, boundaries) {
            self.pop_to(pos, at);
        }
    }

    /// Pop until the stack has `len` entries; popped elements end at `at`
    /// without an end tag.
    fn pop_to(&mut self, len: usize, at: usize) {
        while self.open.len() > len.max(1) {
            let Some(id) = self.open.pop() else { break };
            if let Some(span) = self.index.get_mut(id) {
                span.content_end = at;
                span.end = at;
                span.has_closing_tag = false;
            }
        }
    }
}
