//! Run configuration.
//!
//! Read from a TOML file. Every table and key has a default, so a missing or
//! empty file gives a usable configuration:
//!
//! ```toml
//! [site]
//! origin = "https://example.com/"
//! book_title = "Example Blog"
//!
//! [author]
//! name = "Jane Doe"
//! email = "jane@example.com"
//!
//! [chrome]
//! sponsor_href = "https://github.com/sponsors/jane"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default configuration file name, looked up in the site's parent directory.
pub const CONFIG_FILE: &str = "sitepost.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub author: AuthorConfig,
    pub chrome: ChromeConfig,
    pub feed: FeedConfig,
    pub math: MathConfig,
    pub scripts: ScriptConfig,
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Load `path` if given (it must exist), otherwise `candidate` if it
    /// exists, otherwise the defaults.
    pub fn discover(path: Option<&Path>, candidate: &Path) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if candidate.is_file() => Self::load(candidate),
            None => Ok(Self::default()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Absolute origin that page paths are joined onto for canonical URLs.
    pub origin: String,
    pub title: String,
    pub description: String,
    /// Suffix the generator appends to every page title (`"Post - Book"`).
    pub book_title: String,
    /// Directory of `<name>.svg` files extending the built-in icons.
    pub icons_dir: Option<PathBuf>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost/".into(),
            title: "Blog".into(),
            description: String::new(),
            book_title: String::new(),
            icons_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthorConfig {
    pub name: String,
    pub email: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChromeConfig {
    /// Generator navigation to delete.
    pub remove: Vec<String>,
    pub search_input: String,
    pub search_placeholder: String,
    /// Container the site buttons are prepended to.
    pub buttons: String,
    pub feed_href: String,
    pub feed_icon: String,
    pub sponsor_href: Option<String>,
    pub sponsor_icon: String,
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            remove: vec![
                ".nav-chapters.next".into(),
                ".nav-chapters.previous".into(),
            ],
            search_input: "input#searchbar".into(),
            search_placeholder: "Search this site ...".into(),
            buttons: ".right-buttons".into(),
            feed_href: "/atom.xml".into(),
            feed_icon: "rss".into(),
            sponsor_href: None,
            sponsor_icon: "heart".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Relative page paths matching this pattern are posts.
    pub post_pattern: String,
    /// File names that never become feed items.
    pub exclude: Vec<String>,
    /// Region holding the post's `<time>`.
    pub info_selector: String,
    pub rss: String,
    pub atom: String,
    pub json: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            post_pattern: "^[0-9]{4}/".into(),
            exclude: vec!["toc.html".into()],
            info_selector: ".info".into(),
            rss: "rss.xml".into(),
            atom: "atom.xml".into(),
            json: "feed.json".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MathConfig {
    /// KaTeX CLI program followed by any leading arguments.
    pub command: Vec<String>,
    /// KaTeX stylesheet linked from pages with rendered math. Empty to skip.
    pub stylesheet: String,
    /// Subresource integrity hash for `stylesheet`.
    pub stylesheet_integrity: Option<String>,
}

impl Default for MathConfig {
    fn default() -> Self {
        Self {
            command: vec!["./node_modules/.bin/katex".into()],
            stylesheet: "https://cdnjs.cloudflare.com/ajax/libs/KaTeX/0.11.1/katex.min.css".into(),
            stylesheet_integrity: Some(
                "sha384-zB1R0rpPzHqg7Kpt0Aljp8JPLqbXI3bhnPWROx27a9N0Ll6ZP/+DiW/UqRcLbRjq".into(),
            ),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// `type` attribute of post-processing script elements.
    #[serde(rename = "type")]
    pub script_type: String,
    /// Lua instructions a page's scripts may run in total; 0 for no limit.
    pub instruction_limit: u64,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            script_type: "text/x-postproc".into(),
            instruction_limit: 100_000_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.feed.post_pattern, "^[0-9]{4}/");
        assert_eq!(config.chrome.search_input, "input#searchbar");
        assert_eq!(config.scripts.script_type, "text/x-postproc");
        assert!(config.chrome.sponsor_href.is_none());
        assert!(config.math.stylesheet.ends_with("katex.min.css"));
    }

    #[test]
    fn test_math_stylesheet_can_be_disabled() {
        let config = Config::from_toml("[math]\nstylesheet = \"\"\n").unwrap();
        assert!(config.math.stylesheet.is_empty());
        assert!(config.math.stylesheet_integrity.is_some());
    }

    #[test]
    fn test_partial_tables_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [site]
            origin = "https://example.com/"

            [scripts]
            type = "text/lua"

            [feed]
            exclude = ["toc.html", "print.html"]
            "#,
        )
        .unwrap();
        assert_eq!(config.site.origin, "https://example.com/");
        assert_eq!(config.site.title, "Blog");
        assert_eq!(config.scripts.script_type, "text/lua");
        assert_eq!(config.feed.exclude.len(), 2);
        assert_eq!(config.feed.info_selector, ".info");
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        assert!(Config::from_toml("[site\norigin = 1").is_err());
    }

    #[test]
    fn test_discover() {
        let dir = tempfile::tempdir().unwrap();
        let candidate = dir.path().join(CONFIG_FILE);
        assert_eq!(
            Config::discover(None, &candidate).unwrap().site.origin,
            "http://localhost/"
        );

        fs::write(&candidate, "[site]\norigin = \"https://a.test/\"\n").unwrap();
        assert_eq!(
            Config::discover(None, &candidate).unwrap().site.origin,
            "https://a.test/"
        );

        let missing = dir.path().join("nope.toml");
        assert!(Config::discover(Some(&missing), &candidate).is_err());
    }
}
