//! Site chrome rewrites.
//!
//! The generator's default chrome is tuned for books: chapter navigation
//! arrows, a "Search this book" placeholder and the book title appended to
//! every `<title>`. These rewrites turn it into blog chrome and add the feed
//! and sponsor buttons. Running them twice changes nothing.

use crate::config::Config;
use crate::dom::{Document, NodeArena, NodeId, Selector};
use crate::error::Result;
use crate::icons::IconSet;

const FEED_CLASS: &str = "sitepost-feed";
const SPONSOR_CLASS: &str = "sitepost-sponsor";

/// A link button injected into the button container.
#[derive(Debug, Clone)]
struct Button {
    class: &'static str,
    label: &'static str,
    href: String,
    icon: String,
}

#[derive(Debug, Clone)]
pub struct ChromeRewriter {
    title_suffix: Option<String>,
    remove: Vec<Selector>,
    search_input: Selector,
    search_placeholder: String,
    buttons: Selector,
    feed: Button,
    sponsor: Option<Button>,
}

impl ChromeRewriter {
    pub fn from_config(config: &Config) -> Result<Self> {
        let chrome = &config.chrome;
        let book_title = config.site.book_title.trim();
        Ok(Self {
            title_suffix: (!book_title.is_empty()).then(|| format!(" - {book_title}")),
            remove: chrome
                .remove
                .iter()
                .map(|s| Selector::parse(s))
                .collect::<Result<_>>()?,
            search_input: Selector::parse(&chrome.search_input)?,
            search_placeholder: chrome.search_placeholder.clone(),
            buttons: Selector::parse(&chrome.buttons)?,
            feed: Button {
                class: FEED_CLASS,
                label: "Feed",
                href: chrome.feed_href.clone(),
                icon: chrome.feed_icon.clone(),
            },
            sponsor: chrome.sponsor_href.as_ref().map(|href| Button {
                class: SPONSOR_CLASS,
                label: "Sponsor",
                href: href.clone(),
                icon: chrome.sponsor_icon.clone(),
            }),
        })
    }

    pub fn apply(&self, doc: &mut Document, icons: &IconSet) {
        self.rewrite_title(doc);

        for selector in &self.remove {
            for node in doc.select(selector) {
                doc.tree_mut().detach(node);
            }
        }

        if let Some(input) = doc.select_first(&self.search_input) {
            doc.tree_mut()
                .set_attr(input, "placeholder", &self.search_placeholder);
        }

        if let Some(container) = doc.select_first(&self.buttons) {
            // Prepending in reverse leaves the feed button first.
            if let Some(sponsor) = &self.sponsor {
                inject_button(doc, container, sponsor, icons);
            }
            inject_button(doc, container, &self.feed, icons);
            strip_whitespace(doc.tree_mut(), container);
        }
    }

    fn rewrite_title(&self, doc: &mut Document) {
        let Some(suffix) = &self.title_suffix else {
            return;
        };
        let Some(&title) = doc.tree().elements_by_tag(doc.root(), "title").first() else {
            return;
        };
        let text = doc.tree().text_content(title);
        if let Some(stripped) = text.strip_suffix(suffix.as_str()) {
            let stripped = stripped.to_string();
            doc.tree_mut().set_text_content(title, &stripped);
        }
    }
}

fn inject_button(doc: &mut Document, container: NodeId, button: &Button, icons: &IconSet) {
    let tree = doc.tree();
    if tree
        .children(container)
        .any(|c| tree.has_class(c, button.class))
    {
        return;
    }

    let icon = match icons.svg(&button.icon) {
        Some(svg) => doc.parse_synthetic(svg),
        None => {
            let tree = doc.tree_mut();
            let span = tree.create_html_element("span", &[("class", "icon-fallback")]);
            let text = tree.create_text(button.icon.as_str());
            tree.append(span, text);
            vec![span]
        }
    };

    let tree = doc.tree_mut();
    let link = tree.create_html_element(
        "a",
        &[
            ("class", button.class),
            ("href", button.href.as_str()),
            ("title", button.label),
            ("aria-label", button.label),
        ],
    );
    for node in icon {
        tree.append(link, node);
    }
    tree.prepend(container, link);
}

fn strip_whitespace(tree: &mut NodeArena, container: NodeId) {
    let blank: Vec<_> = tree
        .children(container)
        .filter(|&c| tree.text(c).is_some_and(|t| t.trim().is_empty()))
        .collect();
    for node in blank {
        tree.detach(node);
    }
}
