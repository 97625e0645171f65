//! JSON Feed 1.1.

use serde::Serialize;

use super::{Channel, FeedFormat, FeedItem};
use crate::config::AuthorConfig;
use crate::error::Result;

const VERSION: &str = "https://jsonfeed.org/version/1.1";

pub struct JsonFeed;

#[derive(Serialize)]
struct Document<'a> {
    version: &'static str,
    title: &'a str,
    home_page_url: &'a str,
    feed_url: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    authors: Vec<Author<'a>>,
    items: Vec<Item<'a>>,
}

#[derive(Serialize)]
struct Author<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    url: &'a str,
}

#[derive(Serialize)]
struct Item<'a> {
    id: &'a str,
    url: &'a str,
    title: &'a str,
    content_text: &'a str,
    date_published: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    authors: Vec<Author<'a>>,
}

/// JSON Feed authors need at least a name.
fn authors(author: &AuthorConfig) -> Vec<Author<'_>> {
    if author.name.is_empty() {
        return Vec::new();
    }
    vec![Author {
        name: &author.name,
        url: &author.url,
    }]
}

impl FeedFormat for JsonFeed {
    fn render(channel: &Channel, items: &[FeedItem]) -> Result<String> {
        let doc = Document {
            version: VERSION,
            title: &channel.title,
            home_page_url: channel.home.as_str(),
            feed_url: channel.json_url.as_str(),
            description: &channel.description,
            authors: authors(&channel.author),
            items: items
                .iter()
                .map(|item| Item {
                    id: item.url.as_str(),
                    url: item.url.as_str(),
                    title: &item.title,
                    content_text: &item.title,
                    date_published: item.published.to_rfc3339(),
                    authors: authors(&item.author),
                })
                .collect(),
        };

        let mut json = serde_json::to_string_pretty(&doc)?;
        json.push('\n');
        Ok(json)
    }
}
