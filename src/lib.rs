//! # sitepost
//!
//! Post-processing for statically generated blog pages.
//!
//! A site generator emits raw HTML; sitepost then rewrites every page in
//! place with the structural fixes the generator cannot do itself and
//! writes RSS, Atom and JSON feeds for the dated posts.
//!
//! ## Features
//!
//! - Re-nests `<a>` elements the HTML parser flattened, using source offsets
//! - Expands `fa:`/`time:` pseudo-markup into icons and `<time>` elements
//! - Typesets math through KaTeX
//! - Runs sandboxed Lua scripts embedded in pages
//! - Rewrites book-style chrome into blog chrome
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use sitepost::{Config, KatexCommand};
//!
//! let config = Config::default();
//! let katex = KatexCommand::new(&config.math.command).unwrap();
//! let report = sitepost::run(Path::new("site"), &config, &katex).unwrap();
//! println!("{} pages, {} failed", report.pages, report.failures.len());
//! ```
//!
//! ## Working with Pages
//!
//! A single page can be run through the [`Pipeline`] without touching disk:
//!
//! ```
//! use sitepost::{Config, IconSet, MathEngine, MathError, Pipeline, RenderOptions};
//!
//! struct NoMath;
//!
//! impl MathEngine for NoMath {
//!     fn render(&self, tex: &str, _: &RenderOptions) -> Result<String, MathError> {
//!         Ok(tex.to_string())
//!     }
//! }
//!
//! let config = Config::default();
//! let icons = IconSet::builtin();
//! let pipeline = Pipeline::new(&config, &NoMath, &icons).unwrap();
//! let page = pipeline.process("about.html", "<p>[<em>fa-rss</em>]</p>").unwrap();
//! assert!(page.html.contains(r#"class="fa fa-rss""#));
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod feed;
pub mod icons;
pub mod site;
pub mod transform;

pub use config::Config;
pub use dom::{Document, Selector, SourceIndex, Span};
pub use error::{Error, Result};
pub use feed::{Channel, FeedAggregator, FeedItem, FeedRules, SerializedFeeds};
pub use icons::IconSet;
pub use site::{RunReport, run, wait_for_ready};
pub use transform::{
    KatexCommand, MathEngine, MathError, MathErrorKind, Pipeline, ProcessedPage, RenderOptions,
    Strictness,
};
