//! Per-module cache of menu selectors for the interactive traversal

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ScoutError;

pub const CACHE_FILE: &str = "list_of_menu_selectors.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuSelectors {
    #[serde(default)]
    pub available: Vec<String>,
    #[serde(default)]
    pub done: Vec<String>,
}

impl MenuSelectors {
    /// Missing, empty and unparsable files all yield an empty cache
    pub async fn load(path: &Path) -> Self {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                debug!("No selector cache at {}: {}", path.display(), e);
                return Self::default();
            }
        };
        if content.trim().is_empty() {
            return Self::default();
        }
        serde_json::from_str(&content).unwrap_or_else(|e| {
            debug!("Ignoring invalid selector cache {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub async fn save(&self, path: &Path) -> Result<(), ScoutError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ScoutError::Other(anyhow::Error::new(e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub fn mark_done(&mut self, selector: &str) {
        self.available.retain(|s| s != selector);
        if !self.done.iter().any(|s| s == selector) {
            self.done.push(selector.to_string());
        }
    }

    /// Append unseen selectors; returns how many were added
    pub fn extend_available<I, S>(&mut self, selectors: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for selector in selectors {
            let selector = selector.into();
            if selector.is_empty() || self.contains(&selector) {
                continue;
            }
            self.available.push(selector);
            added += 1;
        }
        added
    }

    fn contains(&self, selector: &str) -> bool {
        self.available.iter().chain(&self.done).any(|s| s == selector)
    }
}

#[cfg(test)]
#[path = "selectors_test.rs"]
mod selectors_test;
