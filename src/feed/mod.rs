//! Site-wide syndication feeds.
//!
//! Page processing yields at most one [`FeedItem`] per page. The run loop
//! pushes them into a [`FeedAggregator`] in traversal order and, once every
//! page has been visited, [`FeedAggregator::finish`] consumes the aggregator
//! and renders the same item list as RSS 2.0, Atom 1.0 and JSON Feed 1.1.

mod atom;
mod json;
mod rss;

use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use url::Url;

pub use atom::Atom;
pub use json::JsonFeed;
pub use rss::Rss;

use crate::config::{AuthorConfig, Config, FeedConfig};
use crate::dom::{Document, Selector};
use crate::error::Result;

/// One syndication entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub url: Url,
    pub published: DateTime<Utc>,
    pub author: AuthorConfig,
}

/// Feed-level metadata shared by every format.
#[derive(Debug, Clone)]
pub struct Channel {
    pub title: String,
    pub description: String,
    pub home: Url,
    pub author: AuthorConfig,
    pub rss_url: Url,
    pub atom_url: Url,
    pub json_url: Url,
}

impl Channel {
    pub fn from_config(config: &Config) -> Result<Self> {
        let home = Url::parse(&config.site.origin)?;
        Ok(Self {
            title: config.site.title.clone(),
            description: config.site.description.clone(),
            author: config.author.clone(),
            rss_url: home.join(&config.feed.rss)?,
            atom_url: home.join(&config.feed.atom)?,
            json_url: home.join(&config.feed.json)?,
            home,
        })
    }
}

/// A wire encoding of the feed.
pub trait FeedFormat {
    fn render(channel: &Channel, items: &[FeedItem]) -> Result<String>;
}

/// Decides which pages are posts and extracts their feed items.
#[derive(Debug, Clone)]
pub struct FeedRules {
    post_pattern: Regex,
    exclude: Vec<String>,
    info: Selector,
    origin: Url,
    author: AuthorConfig,
}

impl FeedRules {
    pub fn from_config(config: &Config) -> Result<Self> {
        let FeedConfig {
            post_pattern,
            exclude,
            info_selector,
            ..
        } = &config.feed;
        Ok(Self {
            post_pattern: Regex::new(post_pattern)?,
            exclude: exclude.clone(),
            info: Selector::parse(info_selector)?,
            origin: Url::parse(&config.site.origin)?,
            author: config.author.clone(),
        })
    }

    /// Whether the page at `path` (relative, `/`-separated) is a post.
    pub fn is_post(&self, path: &str) -> bool {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        self.post_pattern.is_match(path) && !self.exclude.iter().any(|e| e == file_name)
    }

    /// Canonical URL of the page at `path`; `index.html` is dropped so
    /// directories are linked as such.
    pub fn canonical_url(&self, path: &str) -> Result<Url> {
        let path = path.strip_suffix("index.html").unwrap_or(path);
        Ok(self.origin.join(path)?)
    }

    /// The feed item for a processed page, or `None` if it is not a post or
    /// has no publish date.
    pub fn item_for(&self, path: &str, doc: &Document) -> Result<Option<FeedItem>> {
        if !self.is_post(path) {
            return Ok(None);
        }

        let Some(published) = self.published(doc) else {
            tracing::warn!(page = path, "Post has no publish date; left out of feeds");
            return Ok(None);
        };
        let title = doc
            .title()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| path.to_string());

        Ok(Some(FeedItem {
            title,
            url: self.canonical_url(path)?,
            published,
            author: self.author.clone(),
        }))
    }

    fn published(&self, doc: &Document) -> Option<DateTime<Utc>> {
        let tree = doc.tree();
        doc.select(&self.info).into_iter().find_map(|info| {
            let time = tree.elements_by_tag(info, "time").into_iter().next()?;
            let value = tree
                .get_attr(time, "datetime")
                .map(str::to_string)
                .unwrap_or_else(|| tree.text_content(time));
            parse_instant(value.trim())
        })
    }
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
        return Some(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
}

/// Items collected while pages are processed.
#[derive(Debug, Default)]
pub struct FeedAggregator {
    items: Vec<FeedItem>,
}

impl FeedAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: FeedItem) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Render all formats. Items keep the order they were pushed in.
    pub fn finish(self, channel: &Channel) -> Result<SerializedFeeds> {
        Ok(SerializedFeeds {
            rss: Rss::render(channel, &self.items)?,
            atom: Atom::render(channel, &self.items)?,
            json: JsonFeed::render(channel, &self.items)?,
            items: self.items.len(),
        })
    }
}

/// The three feed artifacts of a run.
#[derive(Debug, Clone)]
pub struct SerializedFeeds {
    pub rss: String,
    pub atom: String,
    pub json: String,
    pub items: usize,
}

impl SerializedFeeds {
    /// Write the artifacts into `root` under the configured names.
    pub fn write_to(&self, root: &Path, names: &FeedConfig) -> Result<()> {
        fs::write(root.join(&names.rss), &self.rss)?;
        fs::write(root.join(&names.atom), &self.atom)?;
        fs::write(root.join(&names.json), &self.json)?;
        Ok(())
    }
}

/// Latest publish instant, used as the feed's update time.
fn updated(items: &[FeedItem]) -> DateTime<Utc> {
    items
        .iter()
        .map(|i| i.published)
        .max()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> FeedRules {
        let mut config = Config::default();
        config.site.origin = "https://example.com/".into();
        config.author.name = "Jane Doe".into();
        FeedRules::from_config(&config).unwrap()
    }

    #[test]
    fn test_post_eligibility() {
        let rules = rules();
        assert!(rules.is_post("2024/my-post/index.html"));
        assert!(!rules.is_post("toc.html"));
        assert!(!rules.is_post("about/index.html"));
        assert!(!rules.is_post("2024/toc.html"));
    }

    #[test]
    fn test_canonical_url() {
        let rules = rules();
        assert_eq!(
            rules.canonical_url("2024/my-post/index.html").unwrap().as_str(),
            "https://example.com/2024/my-post/"
        );
        assert_eq!(
            rules.canonical_url("2024/notes.html").unwrap().as_str(),
            "https://example.com/2024/notes.html"
        );
    }

    #[test]
    fn test_parse_instant() {
        let full = parse_instant("2024-01-05T10:30:00+02:00").unwrap();
        assert_eq!(full.to_rfc3339(), "2024-01-05T08:30:00+00:00");
        let date = parse_instant("2024-01-05").unwrap();
        assert_eq!(date.to_rfc3339(), "2024-01-05T00:00:00+00:00");
        assert!(parse_instant("January 5th").is_none());
    }

    #[test]
    fn test_item_for_page() {
        let doc = Document::parse(
            r#"<html><head><title>My Post</title></head><body><div class="info">
            Posted <time datetime="2024-01-05T00:00:00Z">January 5</time></div></body></html>"#,
        );
        let rules = rules();
        let item = rules
            .item_for("2024/my-post/index.html", &doc)
            .unwrap()
            .unwrap();
        assert_eq!(item.title, "My Post");
        assert_eq!(item.url.as_str(), "https://example.com/2024/my-post/");
        assert_eq!(item.published, parse_instant("2024-01-05").unwrap());
        assert_eq!(item.author.name, "Jane Doe");

        assert!(rules.item_for("toc.html", &doc).unwrap().is_none());
    }

    #[test]
    fn test_time_text_fallback_and_missing_date() {
        let rules = rules();
        let doc = Document::parse(r#"<div class="info"><time>2023-12-31</time></div>"#);
        let item = rules.item_for("2023/x.html", &doc).unwrap().unwrap();
        assert_eq!(item.published, parse_instant("2023-12-31").unwrap());
        assert_eq!(item.title, "2023/x.html");

        let doc = Document::parse("<p>no info</p>");
        assert!(rules.item_for("2023/x.html", &doc).unwrap().is_none());
    }
}
