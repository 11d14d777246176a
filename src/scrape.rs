//! DOM Scraper: every element's outer HTML, in document order, to one file

use std::path::{Path, PathBuf};

use fantoccini::Locator;
use tracing::info;

use crate::dump;
use crate::errors::{Outcome, ScoutError};
use crate::page::Page;

const ALL_ELEMENTS: &str = "//*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub path: PathBuf,
    pub elements: usize,
}

/// Dump the live page to `output`.
///
/// The whole dump is built in memory and written once; a failure on any
/// element aborts without writing.
pub async fn scrape<P: Page>(page: &P, output: &Path) -> Outcome<ScrapeSummary> {
    scrape_inner(page, output).await.into()
}

async fn scrape_inner<P: Page>(page: &P, output: &Path) -> Result<ScrapeSummary, ScoutError> {
    info!("Scraping all elements using XPath...");
    let markup = page
        .outer_html_all(Locator::XPath(ALL_ELEMENTS))
        .await
        .map_err(|e| ScoutError::Scrape(format!("{:#}", e)))?;

    let content = dump::render(&markup);

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(output, content).await?;

    info!("Saved {} elements to {}", markup.len(), output.display());
    Ok(ScrapeSummary {
        path: output.to_path_buf(),
        elements: markup.len(),
    })
}

#[cfg(test)]
#[path = "scrape_test.rs"]
mod scrape_test;
