//! Whole-site runs.
//!
//! A run visits every `.html` file under the site root once, rewrites it in
//! place and finally writes the feeds next to the pages. A page is only
//! written after every pass succeeded for it, so a failed page keeps the
//! generator's output.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::feed::{Channel, FeedAggregator, SerializedFeeds};
use crate::icons::IconSet;
use crate::transform::{MathEngine, Pipeline};

/// What a finished run did.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Pages rewritten on disk.
    pub pages: usize,
    /// Pages left untouched because a pass failed for them.
    pub failures: Vec<Error>,
    pub feed_items: usize,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Block until the site generator signals it is done by closing `input`.
pub fn wait_for_ready(mut input: impl Read) -> Result<()> {
    tracing::info!("Waiting for the site generator to finish");
    io::copy(&mut input, &mut io::sink())?;
    Ok(())
}

/// HTML files under `root`, skipping hidden entries. Sorted by name within
/// each directory so runs are reproducible.
pub fn html_pages(root: &Path) -> impl Iterator<Item = Result<PathBuf>> + '_ {
    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        .filter_map(|entry| match entry {
            Ok(entry) if entry.file_type().is_file() && is_html(entry.path()) => {
                Some(Ok(entry.into_path()))
            }
            Ok(_) => None,
            Err(err) => Some(Err(err.into())),
        })
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_html(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "html")
}

/// `/`-separated path of `page` relative to `root`.
fn relative_path(root: &Path, page: &Path) -> String {
    let relative = page.strip_prefix(root).unwrap_or(page);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Rewrite every page under `root` and write the feeds.
///
/// Math and script failures are recorded in the report and the run moves
/// on to the next page. Anything else, I/O in particular, stops the run.
pub fn run(root: &Path, config: &Config, math: &dyn MathEngine) -> Result<RunReport> {
    let icons = IconSet::from_dir(config.site.icons_dir.as_deref())?;
    let pipeline = Pipeline::new(config, math, &icons)?;
    let channel = Channel::from_config(config)?;

    let mut report = RunReport::default();
    let mut feed = FeedAggregator::new();

    for page in html_pages(root) {
        let page = page?;
        let path = relative_path(root, &page);
        let _span = tracing::info_span!("page", path = %path).entered();

        let source = fs::read_to_string(&page).map_err(|e| Error::from(e).in_page(&page))?;
        match pipeline.process(&path, &source) {
            Ok(processed) => {
                fs::write(&page, processed.html).map_err(|e| Error::from(e).in_page(&page))?;
                if let Some(item) = processed.feed_item {
                    feed.push(item);
                }
                report.pages += 1;
            }
            Err(err) if err.is_page_fatal() => {
                tracing::error!("{err}; page left as generated");
                report.failures.push(err.in_page(&page));
            }
            Err(err) => return Err(err.in_page(&page)),
        }
    }

    report.feed_items = feed.len();
    let feeds: SerializedFeeds = feed.finish(&channel)?;
    feeds.write_to(root, &config.feed)?;
    tracing::info!(
        pages = report.pages,
        failed = report.failures.len(),
        feed_items = report.feed_items,
        "Site post-processed"
    );
    Ok(report)
}
