//! Pseudo-markup expansion.
//!
//! Markdown has no syntax for icons or machine-readable dates, so pages
//! smuggle them through links and emphasis:
//!
//! - `[](fa:github)` or `*fa-github*` becomes
//!   `<i class="fa fa-github" aria-hidden="true"></i>`
//! - `[](time:2024-01-05)` or `*time-2024-01-05*` becomes
//!   `<time datetime="2024-01-05">2024-01-05</time>`
//!
//! Icon names the [`IconSet`] does not know become a plain
//! `<span class="icon-fallback">` marker.

use crate::dom::{Document, NodeArena, NodeId};
use crate::icons::IconSet;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PseudoMarkup {
    Icon(String),
    Time(String),
}

/// Expand every pseudo-markup element in the page. Returns the number of
/// elements replaced.
pub fn expand_inline(doc: &mut Document, icons: &IconSet) -> usize {
    let candidates: Vec<(NodeId, PseudoMarkup)> = doc
        .tree()
        .descendants(doc.root())
        .into_iter()
        .filter_map(|node| classify(doc.tree(), node).map(|m| (node, m)))
        .collect();

    let tree = doc.tree_mut();
    let mut count = 0;
    for (node, markup) in candidates {
        // Inside an element replaced earlier.
        if !tree.is_attached(node) {
            continue;
        }
        let replacement = match markup {
            PseudoMarkup::Icon(name) => icon_element(tree, &name, icons),
            PseudoMarkup::Time(instant) => {
                let time = tree.create_html_element("time", &[("datetime", instant.as_str())]);
                let text = tree.create_text(instant);
                tree.append(time, text);
                time
            }
        };
        tree.replace(node, replacement);
        count += 1;
    }
    count
}

fn classify(tree: &NodeArena, node: NodeId) -> Option<PseudoMarkup> {
    let name = tree.element_name(node)?;
    let markup = match name.as_ref() {
        "a" => {
            let href = tree.get_attr(node, "href")?;
            if let Some(icon) = href.strip_prefix("fa:") {
                PseudoMarkup::Icon(icon.to_string())
            } else if let Some(instant) = href.strip_prefix("time:") {
                PseudoMarkup::Time(instant.to_string())
            } else {
                return None;
            }
        }
        "em" | "i" if tree.has_only_text_children(node) => {
            let text = tree.text_content(node);
            let text = text.trim();
            if let Some(icon) = text.strip_prefix("fa-") {
                PseudoMarkup::Icon(icon.to_string())
            } else if let Some(instant) = text.strip_prefix("time-") {
                PseudoMarkup::Time(instant.to_string())
            } else {
                return None;
            }
        }
        _ => return None,
    };

    match &markup {
        PseudoMarkup::Icon(s) | PseudoMarkup::Time(s) if s.is_empty() => None,
        _ => Some(markup),
    }
}

fn icon_element(tree: &mut NodeArena, name: &str, icons: &IconSet) -> NodeId {
    if icons.contains(name) {
        let class = format!("fa fa-{name}");
        return tree.create_html_element("i", &[("class", class.as_str()), ("aria-hidden", "true")]);
    }

    tracing::debug!(icon = name, "Unknown icon, using fallback");
    let span = tree.create_html_element("span", &[("class", "icon-fallback")]);
    let text = tree.create_text(name);
    tree.append(span, text);
    span
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(src: &str) -> String {
        let mut doc = Document::parse(src);
        expand_inline(&mut doc, &IconSet::builtin());
        doc.to_html()
    }

    #[test]
    fn test_icon_link_and_emphasis() {
        let expected = r#"<p><i class="fa fa-heart" aria-hidden="true"></i></p>"#;
        assert_eq!(expand(r#"<p><a href="fa:heart"></a></p>"#), expected);
        assert_eq!(expand("<p><em>fa-heart</em></p>"), expected);
        assert_eq!(expand("<p><i>fa-heart</i></p>"), expected);
    }

    #[test]
    fn test_unknown_icon_falls_back() {
        assert_eq!(
            expand(r#"<a href="fa:unicorn-sparkle">x</a>"#),
            r#"<span class="icon-fallback">unicorn-sparkle</span>"#
        );
    }

    #[test]
    fn test_time_expansion() {
        let expected = r#"<time datetime="2024-01-05T00:00:00Z">2024-01-05T00:00:00Z</time>"#;
        assert_eq!(expand(r#"<a href="time:2024-01-05T00:00:00Z">when</a>"#), expected);
        assert_eq!(expand("<em>time-2024-01-05T00:00:00Z</em>"), expected);
    }

    #[test]
    fn test_ordinary_elements_untouched() {
        let src = r#"<p><a href="/fa:x">link</a> <em>fancy</em> <em>fa-<b>x</b></em> <a href="fa:">e</a></p>"#;
        assert_eq!(expand(src), src);
    }

    #[test]
    fn test_nested_markup_counts_once() {
        let mut doc = Document::parse(
            r#"<p><a href="fa:heart"><em>fa-rss</em></a> <a href="time:2024-01-05"><i>fa-x</i></a></p>"#,
        );
        assert_eq!(expand_inline(&mut doc, &IconSet::builtin()), 2);
        assert_eq!(
            doc.to_html(),
            r#"<p><i class="fa fa-heart" aria-hidden="true"></i> <time datetime="2024-01-05">2024-01-05</time></p>"#
        );
    }

    #[test]
    fn test_expanded_elements_are_synthetic() {
        let mut doc = Document::parse(r#"<p><em>fa-rss</em></p>"#);
        assert_eq!(expand_inline(&mut doc, &IconSet::builtin()), 1);
        let i = doc.tree().elements_by_tag(doc.root(), "i")[0];
        assert!(doc.location_of(i).is_none());
    }
}
