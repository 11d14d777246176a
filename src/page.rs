//! The slice of browser automation the pipeline needs

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use fantoccini::Locator;

use crate::credentials::CredentialSet;

/// A live browser page.
///
/// Implemented over WebDriver by [`crate::webdriver::Browser`]; tests use
/// in-memory doubles.
#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str) -> Result<()>;

    /// Wait until `locator` matches an element, failing after `timeout`
    async fn wait_for(&self, locator: Locator<'_>, timeout: Duration) -> Result<()>;

    async fn count(&self, locator: Locator<'_>) -> Result<usize>;

    async fn click(&self, locator: Locator<'_>) -> Result<()>;

    async fn fill(&self, locator: Locator<'_>, text: &str) -> Result<()>;

    /// Outer HTML of every matching element, in document order.
    /// Fails as a whole if any single element cannot be serialized.
    async fn outer_html_all(&self, locator: Locator<'_>) -> Result<Vec<String>>;

    async fn add_cookies(&self, credentials: &CredentialSet) -> Result<()>;

    async fn cookies(&self) -> Result<Vec<cookie::Cookie<'static>>>;

    async fn current_url(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    async fn page_source(&self) -> Result<String>;
}
