//! Atom 1.0.

use std::fmt::Write;

use chrono::SecondsFormat;
use quick_xml::escape::escape;

use super::{Channel, FeedFormat, FeedItem, updated};
use crate::config::AuthorConfig;
use crate::error::Result;

pub struct Atom;

impl Atom {
    fn write_author(out: &mut String, author: &AuthorConfig) {
        if author.name.is_empty() {
            return;
        }
        let _ = write!(out, "<author><name>{}</name>", escape(author.name.as_str()));
        if !author.email.is_empty() {
            let _ = write!(out, "<email>{}</email>", escape(author.email.as_str()));
        }
        if !author.url.is_empty() {
            let _ = write!(out, "<uri>{}</uri>", escape(author.url.as_str()));
        }
        out.push_str("</author>");
    }
}

impl FeedFormat for Atom {
    fn render(channel: &Channel, items: &[FeedItem]) -> Result<String> {
        let mut out = String::new();
        out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        out.push('\n');
        out.push_str(r#"<feed xmlns="http://www.w3.org/2005/Atom">"#);
        let _ = write!(
            out,
            "<id>{home}</id><title>{}</title>",
            escape(channel.title.as_str()),
            home = escape(channel.home.as_str()),
        );
        if !channel.description.is_empty() {
            let _ = write!(
                out,
                "<subtitle>{}</subtitle>",
                escape(channel.description.as_str())
            );
        }
        let _ = write!(
            out,
            r#"<updated>{}</updated><link href="{}"/><link href="{}" rel="self"/>"#,
            updated(items).to_rfc3339_opts(SecondsFormat::Secs, true),
            escape(channel.home.as_str()),
            escape(channel.atom_url.as_str()),
        );
        Self::write_author(&mut out, &channel.author);

        for item in items {
            let published = item.published.to_rfc3339_opts(SecondsFormat::Secs, true);
            let _ = write!(
                out,
                r#"<entry><id>{url}</id><title>{}</title><link href="{url}"/><published>{published}</published><updated>{published}</updated>"#,
                escape(item.title.as_str()),
                url = escape(item.url.as_str()),
            );
            Self::write_author(&mut out, &item.author);
            out.push_str("</entry>");
        }

        out.push_str("</feed>\n");
        Ok(out)
    }
}
