//! Nested-anchor repair.
//!
//! HTML forbids `<a>` inside `<a>`, so the parser closes an open anchor when
//! it meets the next `<a>` start tag. Authors still write nested anchors (an
//! icon link inside a larger clickable card), and the tree that comes out has
//! the outer anchor cut short with its intended content following it as
//! siblings.
//!
//! Repair works from the source text rather than the tree. For an anchor the
//! parser closed implicitly, the following siblings are walked in order and
//! the source between them (and inside text siblings) is searched for the
//! literal `</a>` the author wrote. Everything up to that token moves back
//! into the anchor; a text sibling containing the token is split there by
//! re-parsing the two halves at their original offsets.
//!
//! Synthetic siblings have no source range and are never split: they move
//! into the anchor only together with a later sibling that comes from source.

use memchr::memchr;

use crate::dom::tokenizer::find_end_tag;
use crate::dom::{Document, NodeId, Span};

/// Byte range of a literal anchor end tag in the page source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CloseTag {
    start: usize,
    end: usize,
}

/// Repair every anchor the parser closed implicitly. Returns how many were
/// repaired.
pub fn repair_anchors(doc: &mut Document) -> usize {
    let candidates: Vec<NodeId> = doc
        .tree()
        .elements_by_tag(doc.root(), "a")
        .into_iter()
        .filter(|&a| is_unclosed_anchor(doc, a))
        .collect();

    let mut repaired = 0;
    for anchor in candidates {
        // An earlier repair may have handled it recursively.
        if is_unclosed_anchor(doc, anchor) && repair(doc, anchor) {
            repaired += 1;
        }
    }
    repaired
}

fn is_unclosed_anchor(doc: &Document, node: NodeId) -> bool {
    doc.tree().is_element_named(node, "a")
        && doc.location_of(node).is_some_and(|s| !s.has_closing_tag)
}

/// Repair one anchor. Returns `false`, leaving the tree untouched, when no
/// closing token follows it before its parent ends.
pub fn repair(doc: &mut Document, anchor: NodeId) -> bool {
    let Some(span) = doc.location_of(anchor) else {
        return false;
    };
    if span.has_closing_tag || !doc.tree().is_attached(anchor) {
        return false;
    }

    let limit = content_limit(doc, anchor);
    let mut prev_end = span.end;
    let mut absorbed = Vec::new();
    let mut synthetic = Vec::new();
    let mut current = doc.tree().next_sibling(anchor);

    while let Some(sibling) = current {
        let Some(sib_span) = doc.location_of(sibling) else {
            synthetic.push(sibling);
            current = doc.tree().next_sibling(sibling);
            continue;
        };

        if let Some(tag) = find_close_tag(doc.source(), prev_end, sib_span.start) {
            finish(doc, anchor, absorbed, tag);
            return true;
        }
        absorbed.append(&mut synthetic);

        if doc.tree().is_text(sibling) {
            if let Some(tag) = find_close_tag(doc.source(), sib_span.start, sib_span.end) {
                absorbed.extend(split_text(doc, sibling, sib_span, tag));
                finish(doc, anchor, absorbed, tag);
                return true;
            }
        } else if is_unclosed_anchor(doc, sibling) {
            repair(doc, sibling);
        }

        absorbed.push(sibling);
        let end = doc.location_of(sibling).map_or(sib_span.end, |s| s.end);
        prev_end = prev_end.max(end);
        current = doc.tree().next_sibling(sibling);
    }

    match find_close_tag(doc.source(), prev_end, limit) {
        Some(tag) => {
            finish(doc, anchor, absorbed, tag);
            true
        }
        None => {
            tracing::debug!(offset = span.start, "No closing tag for anchor");
            false
        }
    }
}

/// Where the anchor's parent stops holding children in the source.
fn content_limit(doc: &Document, anchor: NodeId) -> usize {
    doc.tree()
        .parent(anchor)
        .filter(|&p| p != doc.root())
        .and_then(|p| doc.location_of(p))
        .map_or(doc.source().len(), |s| s.content_end)
}

/// Find `</a ...>` in `src[from..to]`.
fn find_close_tag(src: &str, from: usize, to: usize) -> Option<CloseTag> {
    if from >= to {
        return None;
    }
    let bytes = src.as_bytes().get(..to)?;
    let start = find_end_tag(bytes, from, "a")?;
    let gt = memchr(b'>', &bytes[start..])?;
    Some(CloseTag {
        start,
        end: start + gt + 1,
    })
}

/// Split a text node around `tag`. The part after the tag replaces the text
/// node in place; the nodes of the part before it are returned detached.
fn split_text(doc: &mut Document, text: NodeId, span: Span, tag: CloseTag) -> Vec<NodeId> {
    let before = doc.reparse(span.start, tag.start);
    let after = doc.reparse(tag.end, span.end);

    let tree = doc.tree_mut();
    for node in after {
        tree.insert_before(text, node);
    }
    tree.detach(text);
    before
}

fn finish(doc: &mut Document, anchor: NodeId, absorbed: Vec<NodeId>, tag: CloseTag) {
    let tree = doc.tree_mut();
    for node in absorbed {
        tree.append(anchor, node);
    }
    doc.index_mut().resolve_end(anchor, tag.start, tag.end);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repaired(src: &str) -> (Document, usize) {
        let mut doc = Document::parse(src);
        let count = repair_anchors(&mut doc);
        (doc, count)
    }

    #[test]
    fn test_nested_anchor_is_rebuilt() {
        let src = r#"<a href="/x">outer <a href="/y">inner</a> tail</a>"#;
        let (doc, count) = repaired(src);
        assert_eq!(count, 1);

        let root = doc.root();
        let tree = doc.tree();
        let top: Vec<_> = tree.children(root).collect();
        assert_eq!(top.len(), 1);

        let outer = top[0];
        assert_eq!(tree.get_attr(outer, "href"), Some("/x"));
        let children: Vec<_> = tree.children(outer).collect();
        assert_eq!(children.len(), 3);
        assert_eq!(tree.text(children[0]), Some("outer "));
        assert_eq!(tree.get_attr(children[1], "href"), Some("/y"));
        assert_eq!(tree.text_content(children[1]), "inner");
        assert_eq!(tree.text(children[2]), Some(" tail"));

        assert_eq!(doc.to_html(), src);
    }

    #[test]
    fn test_closing_tag_in_gap_between_elements() {
        let src = r#"<p><a href="/card"><b>Card</b><a href="/icon">i</a></a><span>after</span></p>"#;
        let (doc, count) = repaired(src);
        assert_eq!(count, 1);
        assert_eq!(doc.to_html(), src);
    }

    #[test]
    fn test_closing_tag_at_end_of_parent() {
        let src = r#"<div><a href="/o">o<a href="/i">i</a></a></div>"#;
        let (doc, _) = repaired(src);
        assert_eq!(doc.to_html(), src);
    }

    #[test]
    fn test_three_levels() {
        let src = r#"<a href="/1">a<a href="/2">b<a href="/3">c</a>d</a>e</a>f"#;
        let (doc, count) = repaired(src);
        // The middle anchor is repaired while repairing the outer one.
        assert_eq!(count, 1);
        assert_eq!(doc.to_html(), src);
    }

    #[test]
    fn test_unmatched_anchor_is_left_alone() {
        let src = r#"<p><a href="/x">x<a href="/y">y</a> tail</p>"#;
        let mut doc = Document::parse(src);
        let before = doc.to_html();
        assert_eq!(repair_anchors(&mut doc), 0);
        assert_eq!(doc.to_html(), before);
    }

    #[test]
    fn test_case_insensitive_closing_tag() {
        let src = r#"<a href="/x">x<a href="/y">y</a> z</A >"#;
        let (doc, count) = repaired(src);
        assert_eq!(count, 1);
        let outer = doc.tree().first_child(doc.root()).unwrap();
        assert_eq!(doc.tree().text_content(outer), "xy z");
    }

    #[test]
    fn test_split_text_keeps_markup_and_entities() {
        let src = r#"<a href="/x">x<a href="/y">y</a> &amp; more</b></a> rest &lt;"#;
        let (doc, _) = repaired(src);
        let tree = doc.tree();
        let top: Vec<_> = tree.children(doc.root()).collect();
        assert_eq!(top.len(), 2);
        assert_eq!(tree.text_content(top[0]), "xy & more");
        assert_eq!(tree.text(top[1]), Some(" rest <"));
    }

    #[test]
    fn test_repair_is_idempotent() {
        let src = r#"<a href="/x">outer <a href="/y">inner</a> tail</a><p>next</p>"#;
        let mut doc = Document::parse(src);
        repair_anchors(&mut doc);
        let once = doc.to_html();
        assert_eq!(repair_anchors(&mut doc), 0);
        assert_eq!(doc.to_html(), once);
    }

    #[test]
    fn test_synthetic_sibling_absorbed_with_later_source_sibling() {
        let src = r#"<a href="/x">x<a href="/y">y</a><b>z</b></a>"#;
        let mut doc = Document::parse(src);
        let inner = doc.tree().elements_by_tag(doc.root(), "a")[1];
        let synthetic = doc.parse_synthetic("<i>new</i>")[0];
        doc.tree_mut().insert_after(inner, synthetic);

        assert_eq!(repair_anchors(&mut doc), 1);
        assert_eq!(
            doc.to_html(),
            r#"<a href="/x">x<a href="/y">y</a><i>new</i><b>z</b></a>"#
        );
    }

    #[test]
    fn test_synthetic_sibling_after_closing_tag_stays_outside() {
        let src = r#"<a href="/x">x<a href="/y">y</a></a><b>z</b>"#;
        let mut doc = Document::parse(src);
        let b = doc.tree().elements_by_tag(doc.root(), "b")[0];
        let synthetic = doc.parse_synthetic("<i>new</i>")[0];
        doc.tree_mut().insert_before(b, synthetic);

        repair_anchors(&mut doc);
        assert_eq!(
            doc.to_html(),
            r#"<a href="/x">x<a href="/y">y</a></a><i>new</i><b>z</b>"#
        );
    }

    #[test]
    fn test_closing_tag_in_attribute_is_not_matched() {
        let src = r#"<a href="/x">x<a href="/y">y</a><span title="</a>">s</span> t</a>"#;
        let (doc, count) = repaired(src);
        assert_eq!(count, 1);
        let outer = doc.tree().first_child(doc.root()).unwrap();
        assert_eq!(doc.tree().text_content(outer), "xys t");
    }
}
