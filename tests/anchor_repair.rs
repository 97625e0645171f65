//! Property tests for nested-anchor repair.
//!
//! Sources are generated properly nested, so the parser's flattening is the
//! only thing that breaks them; repair has to bring back exactly what the
//! author wrote.

use proptest::prelude::*;
use sitepost::Document;
use sitepost::transform::repair_anchors;

fn content() -> impl Strategy<Value = String> {
    let text = "[a-z ]{0,6}";
    text.prop_recursive(4, 32, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(|parts| {
            format!(r#"<a href="/l">{}</a>"#, parts.concat())
        })
    })
}

fn page() -> impl Strategy<Value = String> {
    prop::collection::vec(content(), 1..4).prop_map(|parts| format!("<p>{}</p>", parts.concat()))
}

fn visible_text(doc: &Document) -> String {
    doc.tree().text_content(doc.root())
}

proptest! {
    #[test]
    fn prop_repair_restores_source(src in page()) {
        let mut doc = Document::parse(src.as_str());
        repair_anchors(&mut doc);
        prop_assert_eq!(doc.to_html(), src);
    }

    #[test]
    fn prop_repair_keeps_visible_text(src in page()) {
        let mut doc = Document::parse(src.as_str());
        let before = visible_text(&doc);
        repair_anchors(&mut doc);
        prop_assert_eq!(visible_text(&doc), before);
    }

    #[test]
    fn prop_repair_is_idempotent(src in page()) {
        let mut doc = Document::parse(src.as_str());
        repair_anchors(&mut doc);
        let once = doc.to_html();
        prop_assert_eq!(repair_anchors(&mut doc), 0);
        prop_assert_eq!(doc.to_html(), once);
    }
}

#[test]
fn test_unrepairable_anchor_is_left_alone() {
    let src = r#"<p><a href="/x">open <a href="/y">inner</a> never closed</p>"#;
    let mut doc = Document::parse(src);
    let before = doc.to_html();
    assert_eq!(repair_anchors(&mut doc), 0);
    assert_eq!(doc.to_html(), before);
}
