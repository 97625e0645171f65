//! RSS 2.0.

use std::fmt::Write;

use quick_xml::escape::escape;

use super::{Channel, FeedFormat, FeedItem, updated};
use crate::config::AuthorConfig;
use crate::error::Result;

pub struct Rss;

impl FeedFormat for Rss {
    fn render(channel: &Channel, items: &[FeedItem]) -> Result<String> {
        let mut out = String::new();
        out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        out.push('\n');
        out.push_str(r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">"#);
        out.push_str("<channel>");
        let _ = write!(
            out,
            "<title>{}</title><link>{}</link><description>{}</description>",
            escape(channel.title.as_str()),
            escape(channel.home.as_str()),
            escape(channel.description.as_str()),
        );
        let _ = write!(
            out,
            r#"<atom:link href="{}" rel="self" type="application/rss+xml"/>"#,
            escape(channel.rss_url.as_str()),
        );
        let _ = write!(
            out,
            "<lastBuildDate>{}</lastBuildDate>",
            updated(items).to_rfc2822()
        );

        for item in items {
            out.push_str("<item>");
            let _ = write!(
                out,
                r#"<title>{}</title><link>{url}</link><guid isPermaLink="true">{url}</guid>"#,
                escape(item.title.as_str()),
                url = escape(item.url.as_str()),
            );
            let _ = write!(out, "<pubDate>{}</pubDate>", item.published.to_rfc2822());
            if let Some(author) = author_field(&item.author) {
                let _ = write!(out, "<author>{}</author>", escape(author.as_str()));
            }
            out.push_str("</item>");
        }

        out.push_str("</channel></rss>\n");
        Ok(out)
    }
}

/// RSS wants `email (Name)` and nothing at all without an address.
fn author_field(author: &AuthorConfig) -> Option<String> {
    match (author.email.is_empty(), author.name.is_empty()) {
        (true, _) => None,
        (false, true) => Some(author.email.clone()),
        (false, false) => Some(format!("{} ({})", author.email, author.name)),
    }
}
