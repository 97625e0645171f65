//! Icon lookup.
//!
//! Knows which Font Awesome names the site's stylesheet provides, and which
//! of them also have an inline SVG rendering. Extra SVGs can be dropped into
//! a directory as `<name>.svg`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Font Awesome icon names the site's stylesheet is built with.
const FONT_ICONS: &[&str] = &[
    "book",
    "calendar",
    "check",
    "clock-o",
    "code",
    "comment",
    "download",
    "envelope",
    "exclamation-triangle",
    "external-link",
    "github",
    "heart",
    "home",
    "info-circle",
    "key",
    "lightbulb-o",
    "link",
    "lock",
    "mastodon",
    "rss",
    "search",
    "star",
    "tag",
    "terminal",
    "times",
    "twitter",
    "user",
];

const RSS_SVG: &str = r#"<svg class="icon" viewBox="0 0 16 16" aria-hidden="true"><circle cx="2.5" cy="13.5" r="2.5"/><path d="M0 6v3a7 7 0 0 1 7 7h3A10 10 0 0 0 0 6z"/><path d="M0 0v3a13 13 0 0 1 13 13h3A16 16 0 0 0 0 0z"/></svg>"#;

const HEART_SVG: &str = r#"<svg class="icon" viewBox="0 0 16 16" aria-hidden="true"><path d="M8 15 1.4 8.4a4 4 0 0 1 5.7-5.7L8 3.6l.9-.9a4 4 0 0 1 5.7 5.7z"/></svg>"#;

#[derive(Debug, Clone)]
pub struct IconSet {
    names: BTreeSet<String>,
    svgs: BTreeMap<String, String>,
}

impl IconSet {
    pub fn builtin() -> Self {
        Self {
            names: FONT_ICONS.iter().map(|n| n.to_string()).collect(),
            svgs: [("rss", RSS_SVG), ("heart", HEART_SVG)]
                .into_iter()
                .map(|(n, s)| (n.to_string(), s.to_string()))
                .collect(),
        }
    }

    /// Built-in icons plus every `*.svg` in `dir`. A file named like a
    /// built-in replaces its SVG.
    pub fn with_dir(dir: &Path) -> Result<Self> {
        let mut icons = Self::builtin();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "svg") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let svg = fs::read_to_string(&path)?;
            tracing::debug!(icon = name, "Loaded icon");
            icons.names.insert(name.to_string());
            icons.svgs.insert(name.to_string(), svg.trim().to_string());
        }
        Ok(icons)
    }

    pub fn from_dir(dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(dir) => Self::with_dir(dir),
            None => Ok(Self::builtin()),
        }
    }

    /// Whether `name` can be shown as a font icon.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Inline SVG markup for `name`, if there is one.
    pub fn svg(&self, name: &str) -> Option<&str> {
        self.svgs.get(name).map(String::as_str)
    }
}

impl Default for IconSet {
    fn default() -> Self {
        Self::builtin()
    }
}
