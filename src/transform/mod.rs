//! Page transform pipeline.
//!
//! Every page goes through the same passes, each mutating the parsed
//! [`Document`] in place.
//!
//! ## Pipeline Order
//!
//! 1. **Anchors** - Re-nest links the parser flattened
//! 2. **Inline** - Expand `fa:`/`time:` pseudo-markup
//! 3. **Math** - Typeset `language-math` blocks and `$...$` code
//! 4. **Scripts** - Run and remove embedded page scripts
//! 5. **Chrome** - Blog navigation, search box and header buttons
//!
//! Anchor repair must come first: it works from source offsets and only
//! nodes that still carry their original span can be repaired.

pub mod anchors;
pub mod chrome;
pub mod inline;
pub mod math;
pub mod script;

pub use anchors::repair_anchors;
pub use chrome::ChromeRewriter;
pub use inline::expand_inline;
pub use math::{
    KatexCommand, MathEngine, MathError, MathErrorKind, RenderOptions, StrictPolicy, Strictness,
    Stylesheet, default_policy, link_stylesheet, render_math,
};
pub use script::run_scripts;

use crate::config::Config;
use crate::dom::{Document, Selector};
use crate::error::Result;
use crate::feed::{FeedItem, FeedRules};
use crate::icons::IconSet;

/// The result of running one page through the pipeline.
#[derive(Debug, Clone)]
pub struct ProcessedPage {
    pub html: String,
    pub feed_item: Option<FeedItem>,
}

/// Compiled per-run state shared by every page.
pub struct Pipeline<'a> {
    chrome: ChromeRewriter,
    scripts: Selector,
    script_limit: u64,
    feed: FeedRules,
    math: &'a dyn MathEngine,
    math_css: Option<Stylesheet>,
    icons: &'a IconSet,
    strict: StrictPolicy,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &Config, math: &'a dyn MathEngine, icons: &'a IconSet) -> Result<Self> {
        Ok(Self {
            chrome: ChromeRewriter::from_config(config)?,
            scripts: Selector::parse(&format!(
                "script[type=\"{}\"]",
                config.scripts.script_type
            ))?,
            script_limit: config.scripts.instruction_limit,
            feed: FeedRules::from_config(config)?,
            math,
            math_css: Stylesheet::from_config(&config.math),
            icons,
            strict: default_policy,
        })
    }

    /// Use a different math strictness policy.
    pub fn with_strictness(mut self, strict: StrictPolicy) -> Self {
        self.strict = strict;
        self
    }

    pub fn feed_rules(&self) -> &FeedRules {
        &self.feed
    }

    /// Run every pass over one page. `path` is relative to the site root
    /// and `/`-separated.
    ///
    /// Nothing is written here; on error the caller still has the page's
    /// original text untouched on disk.
    pub fn process(&self, path: &str, source: &str) -> Result<ProcessedPage> {
        let mut doc = Document::parse(source);

        let repaired = repair_anchors(&mut doc);
        let expanded = expand_inline(&mut doc, self.icons);
        let formulas = render_math(&mut doc, self.math, self.strict)?;
        if formulas > 0
            && let Some(sheet) = &self.math_css
        {
            link_stylesheet(&mut doc, sheet);
        }
        let scripts = run_scripts(&mut doc, &self.scripts, path, self.script_limit)?;
        self.chrome.apply(&mut doc, self.icons);
        tracing::debug!(
            page = path,
            repaired,
            expanded,
            formulas,
            scripts,
            "Transformed page"
        );

        let feed_item = self.feed.item_for(path, &doc)?;
        Ok(ProcessedPage {
            html: doc.to_html(),
            feed_item,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transform::math::tests::StubEngine;

    const POST: &str = r#"<!DOCTYPE html>
<html><head><title>Hello - Example Blog</title></head><body>
<div class="right-buttons"> </div>
<div class="info"><a href="time:2024-01-05">posted</a></div>
<p><a href="/x">outer <a href="/y">inner</a> tail</a></p>
<pre><code class="language-math">x^2</code></pre>
<script type="text/x-postproc">page:set_attr(page:query("p")[1], "class", "lede")</script>
</body></html>"#;

    fn config() -> Config {
        let mut config = Config::default();
        config.site.origin = "https://example.com/".into();
        config.site.book_title = "Example Blog".into();
        config
    }

    #[test]
    fn test_full_pipeline() {
        let engine = StubEngine::default();
        let icons = IconSet::builtin();
        let config = config();
        let pipeline = Pipeline::new(&config, &engine, &icons).unwrap();

        let page = pipeline.process("2024/hello/index.html", POST).unwrap();
        let html = &page.html;

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Hello</title>"));
        assert_eq!(html.matches("katex.min.css").count(), 1);
        assert!(html.contains(
            r#"<p class="lede"><a href="/x">outer <a href="/y">inner</a> tail</a></p>"#
        ));
        assert!(html.contains(r#"<time datetime="2024-01-05">2024-01-05</time>"#));
        assert!(!html.contains("language-math"));
        assert!(!html.contains("x-postproc"));
        assert!(html.contains(r#"<div class="right-buttons"><a class="sitepost-feed""#));

        let item = page.feed_item.unwrap();
        assert_eq!(item.title, "Hello");
        assert_eq!(item.url.as_str(), "https://example.com/2024/hello/");
    }

    #[test]
    fn test_non_post_has_no_feed_item() {
        let engine = StubEngine::default();
        let icons = IconSet::builtin();
        let config = config();
        let pipeline = Pipeline::new(&config, &engine, &icons).unwrap();

        let page = pipeline.process("toc.html", POST).unwrap();
        assert!(page.feed_item.is_none());
    }

    #[test]
    fn test_page_without_math_gets_no_stylesheet() {
        let engine = StubEngine::default();
        let icons = IconSet::builtin();
        let config = config();
        let pipeline = Pipeline::new(&config, &engine, &icons).unwrap();

        let page = pipeline
            .process("about.html", "<html><head></head><body><p>hi</p></body></html>")
            .unwrap();
        assert!(!page.html.contains("katex"));
    }

    #[test]
    fn test_script_failure_is_page_fatal() {
        let engine = StubEngine::default();
        let icons = IconSet::builtin();
        let config = config();
        let pipeline = Pipeline::new(&config, &engine, &icons).unwrap();

        let err = pipeline
            .process(
                "2024/a.html",
                r#"<p>x</p><script type="text/x-postproc">error("nope")</script>"#,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Script(_)));
        assert!(err.is_page_fatal());
    }
}
