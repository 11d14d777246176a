use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::credentials::CredentialSet;
use crate::page::Page;
use crate::webdriver_manager::GLOBAL_WEBDRIVER_MANAGER;

/// Browser instance for WebDriver automation
pub struct Browser {
    pub(crate) client: Client,
    page_load_timeout: Duration,
}

/// Supported browser types
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
pub enum BrowserType {
    /// Mozilla Firefox
    Firefox,
    /// Google Chrome/Chromium
    #[value(alias = "chromium")]
    Chrome,
}

impl BrowserType {
    pub fn driver_name(&self) -> &'static str {
        match self {
            BrowserType::Firefox => "geckodriver",
            BrowserType::Chrome => "chromedriver",
        }
    }

    /// WebDriver capabilities for this browser
    pub fn capabilities(
        &self,
        headless: bool,
        user_data_dir: Option<&std::path::Path>,
    ) -> serde_json::Map<String, serde_json::Value> {
        let mut caps = serde_json::Map::new();

        match self {
            BrowserType::Firefox => {
                let mut args = Vec::new();
                if headless {
                    args.push("--headless".to_string());
                }
                args.push("--width=1920".to_string());
                args.push("--height=1080".to_string());
                caps.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
            }
            BrowserType::Chrome => {
                let mut args = vec!["--no-sandbox".to_string()];
                if headless {
                    args.push("--headless=new".to_string());
                    args.push("--disable-gpu".to_string());
                    args.push("--disable-dev-shm-usage".to_string());
                }
                args.push("--window-size=1920,1080".to_string());
                if let Some(dir) = user_data_dir {
                    // Chrome refuses to share a profile directory between sessions
                    args.push(format!("--user-data-dir={}", dir.display()));
                }
                caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
            }
        }
        caps
    }
}

impl Browser {
    /// Create a new browser instance
    ///
    /// # Arguments
    /// * `browser_type` - Firefox or Chrome
    /// * `headless` - Whether to run in headless mode
    /// * `page_load_timeout` - Upper bound on waiting for `document.readyState`
    pub async fn new(
        browser_type: BrowserType,
        headless: bool,
        page_load_timeout: Duration,
    ) -> Result<Self> {
        info!("Connecting to {:?} WebDriver", browser_type);

        // Ensure WebDriver is running (will auto-start if needed)
        let webdriver_url = GLOBAL_WEBDRIVER_MANAGER
            .ensure_driver(&browser_type)
            .await?;

        let profile_dir = match browser_type {
            BrowserType::Chrome => {
                let temp_dir = tempfile::Builder::new()
                    .prefix("odoo-scout-chrome-")
                    .tempdir()?;
                #[allow(deprecated)]
                Some(temp_dir.into_path())
            }
            BrowserType::Firefox => None,
        };
        let caps = browser_type.capabilities(headless, profile_dir.as_deref());

        debug!("Connecting to WebDriver at {}", webdriver_url);

        let client = match ClientBuilder::rustls()
            .capabilities(caps.clone())
            .connect(&webdriver_url)
            .await
        {
            Ok(client) => client,
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("Session is already started")
                    || error_str.contains("session not created")
                {
                    // WebDriver is in a bad state, try to recover
                    info!("WebDriver appears to be in a bad state, attempting recovery...");
                    GLOBAL_WEBDRIVER_MANAGER.kill_driver(&browser_type);
                    tokio::time::sleep(Duration::from_millis(500)).await;

                    let new_url = GLOBAL_WEBDRIVER_MANAGER
                        .ensure_driver(&browser_type)
                        .await
                        .context("Failed to restart WebDriver after recovery")?;

                    ClientBuilder::rustls()
                        .capabilities(caps)
                        .connect(&new_url)
                        .await
                        .context("Failed to connect to WebDriver after restart")?
                } else {
                    return Err(e).context("Failed to connect to WebDriver");
                }
            }
        };

        Ok(Browser {
            client,
            page_load_timeout,
        })
    }

    async fn wait_ready(&self) {
        let script = "return document.readyState === 'complete';";
        let deadline = tokio::time::Instant::now() + self.page_load_timeout;

        while tokio::time::Instant::now() < deadline {
            match self.client.execute(script, vec![]).await {
                Ok(val) if val.as_bool().unwrap_or(false) => return,
                _ => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
        warn!(
            "Page not ready after {}ms, continuing",
            self.page_load_timeout.as_millis()
        );
    }

    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

#[async_trait]
impl Page for Browser {
    async fn goto(&self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);
        self.client
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {}", url))?;
        self.wait_ready().await;
        Ok(())
    }

    async fn wait_for(&self, locator: Locator<'_>, timeout: Duration) -> Result<()> {
        debug!("Waiting up to {}ms for {:?}", timeout.as_millis(), locator);
        self.client
            .wait()
            .at_most(timeout)
            .for_element(locator)
            .await
            .with_context(|| format!("Timed out waiting for {:?}", locator))?;
        Ok(())
    }

    async fn count(&self, locator: Locator<'_>) -> Result<usize> {
        Ok(self.client.find_all(locator).await?.len())
    }

    async fn click(&self, locator: Locator<'_>) -> Result<()> {
        debug!("Finding element {:?}", locator);
        let element = self
            .client
            .find(locator)
            .await
            .with_context(|| format!("Element not found: {:?}", locator))?;
        info!("Clicking element {:?}", locator);
        element.click().await?;
        Ok(())
    }

    async fn fill(&self, locator: Locator<'_>, text: &str) -> Result<()> {
        let element = self
            .client
            .find(locator)
            .await
            .with_context(|| format!("Element not found: {:?}", locator))?;
        element.clear().await?;
        element.send_keys(text).await?;
        Ok(())
    }

    async fn outer_html_all(&self, locator: Locator<'_>) -> Result<Vec<String>> {
        let elements = self
            .client
            .find_all(locator)
            .await
            .with_context(|| format!("No elements found matching {:?}", locator))?;

        let mut markup = Vec::with_capacity(elements.len());
        for (idx, element) in elements.iter().enumerate() {
            let html = element
                .html(false)
                .await
                .with_context(|| format!("Failed to serialize element {}", idx + 1))?;
            markup.push(html);
        }
        Ok(markup)
    }

    async fn add_cookies(&self, credentials: &CredentialSet) -> Result<()> {
        for record in credentials.iter() {
            debug!("Adding cookie {} for {}", record.name, record.domain);
            self.client
                .add_cookie(record.to_browser_cookie())
                .await
                .with_context(|| format!("Failed to add cookie {}", record.name))?;
        }
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<cookie::Cookie<'static>>> {
        Ok(self.client.get_all_cookies().await?)
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.client.title().await?)
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.client.source().await?)
    }
}

#[cfg(test)]
#[path = "webdriver_test.rs"]
mod webdriver_test;
