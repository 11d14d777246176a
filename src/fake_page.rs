// In-memory page double for unit tests

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use fantoccini::Locator;

use crate::credentials::CredentialSet;
use crate::page::Page;

pub fn key(locator: &Locator<'_>) -> String {
    match locator {
        Locator::Css(s) => format!("css:{s}"),
        Locator::XPath(s) => format!("xpath:{s}"),
        _ => "other".to_string(),
    }
}

#[derive(Default)]
pub struct FakePage {
    pub present: HashSet<String>,
    pub markup: Vec<String>,
    pub fail_serialization_at: Option<usize>,
    pub cookies: Vec<cookie::Cookie<'static>>,
    pub source: String,
    pub title: String,
    pub actions: Mutex<Vec<String>>,
    pub installed: Mutex<CredentialSet>,
    pub url: Mutex<String>,
}

impl FakePage {
    pub fn with_present(selectors: &[&str]) -> Self {
        FakePage {
            present: selectors.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| a.strip_prefix("click:").map(str::to_string))
            .collect()
    }

    fn record(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }

    fn exists(&self, locator: &Locator<'_>) -> bool {
        self.present.contains(&key(locator))
    }
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.record(format!("goto:{url}"));
        *self.url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn wait_for(&self, locator: Locator<'_>, _timeout: Duration) -> Result<()> {
        self.record(format!("wait:{}", key(&locator)));
        if self.exists(&locator) {
            Ok(())
        } else {
            Err(anyhow!("timed out waiting for {}", key(&locator)))
        }
    }

    async fn count(&self, locator: Locator<'_>) -> Result<usize> {
        Ok(usize::from(self.exists(&locator)))
    }

    async fn click(&self, locator: Locator<'_>) -> Result<()> {
        self.record(format!("click:{}", key(&locator)));
        if self.exists(&locator) {
            Ok(())
        } else {
            Err(anyhow!("Element not found: {}", key(&locator)))
        }
    }

    async fn fill(&self, locator: Locator<'_>, text: &str) -> Result<()> {
        self.record(format!("fill:{}={}", key(&locator), text));
        Ok(())
    }

    async fn outer_html_all(&self, _locator: Locator<'_>) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for (idx, markup) in self.markup.iter().enumerate() {
            if self.fail_serialization_at == Some(idx) {
                return Err(anyhow!("stale element reference at {}", idx));
            }
            out.push(markup.clone());
        }
        Ok(out)
    }

    async fn add_cookies(&self, credentials: &CredentialSet) -> Result<()> {
        self.record(format!("add_cookies:{}", credentials.len()));
        *self.installed.lock().unwrap() = credentials.clone();
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<cookie::Cookie<'static>>> {
        Ok(self.cookies.clone())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.url.lock().unwrap().clone())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.title.clone())
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.source.clone())
    }
}
