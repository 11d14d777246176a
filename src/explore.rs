//! Interactive module traversal: propose menu selectors, click them one at a
//! time, and snapshot every page reached along with its interactive steps.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use fantoccini::Locator;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analyzer::ChatClient;
use crate::config::Settings;
use crate::errors::ScoutError;
use crate::page::Page;
use crate::selectors::MenuSelectors;

/// Page source sent with a proposal request is cut to this many chars
pub const SOURCE_LIMIT: usize = 20_000;
/// Snapshot HTML is cut to this many chars before the `...` marker
pub const SNAPSHOT_HTML_LIMIT: usize = 5_000;

pub const PROPOSAL_PROMPT: &str = "Analyze the following HTML content from an Odoo module page. \
Your task is to provide a brief summary of the page and extract actionable items like menu options or buttons using CSS selectors. \
Your response MUST be valid JSON. The JSON output should be an array of objects, \
where each object has the following keys: 'brief', 'name', 'selector', and 'description'.

Expected JSON format:
[
  {
    \"brief\": \"This is the main inventory page.\",
    \"name\": \"Overview\",
    \"selector\": \"a.o_menu_entry_lvl_1[data-menu-xmlid='stock.menu_stock_transfers']\",
    \"description\": \"Manage stock transfers\"
  }
]";

/// Asks for the interactive steps of one page; `{}` is the module label
const STEPS_PROMPT: &str = "Extract key interactive elements and navigation structure for this page in the {} module. \
Return a JSON array with each step containing 'selector', 'action' (click/type), and 'description'.";

pub fn steps_prompt(module: &str) -> String {
    STEPS_PROMPT.replace("{}", module)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SelectorProposal {
    #[serde(default)]
    pub brief: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub description: String,
}

/// One interactive element reported by the step-extraction pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionStep {
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub description: String,
}

/// Accepts a bare JSON array, an array inside a fenced code block, or an
/// object with an `items` array. Anything else yields no proposals.
pub fn parse_selector_proposals(reply: &str) -> Vec<SelectorProposal> {
    parse_items::<SelectorProposal>(reply)
        .into_iter()
        .filter(|p| !p.selector.trim().is_empty())
        .collect()
}

/// Same reply shapes as [`parse_selector_proposals`]
pub fn parse_interaction_steps(reply: &str) -> Vec<InteractionStep> {
    parse_items::<InteractionStep>(reply)
        .into_iter()
        .filter(|s| !s.selector.trim().is_empty())
        .collect()
}

fn parse_items<T: DeserializeOwned>(reply: &str) -> Vec<T> {
    let body = strip_fence(reply.trim());
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return Vec::new(),
    };
    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("items") {
            Some(serde_json::Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<T>(item).ok())
        .collect()
}

fn strip_fence(text: &str) -> &str {
    let Some(start) = text.find("```") else {
        return text;
    };
    let after = &text[start + 3..];
    // skip the info string (`json`)
    let after = after.split_once('\n').map_or(after, |(_, rest)| rest);
    match after.find("```") {
        Some(end) => after[..end].trim(),
        None => after.trim(),
    }
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// What a traversal step saw, written to `page_{n}.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub html: String,
    pub captured_at: DateTime<Utc>,
}

impl PageSnapshot {
    pub async fn capture<P: Page>(page: &P) -> anyhow::Result<Self> {
        let source = page.page_source().await?;
        Ok(Self {
            url: page.current_url().await?,
            title: page.title().await?,
            html: format!("{}...", truncate_chars(&source, SNAPSHOT_HTML_LIMIT)),
            captured_at: Utc::now(),
        })
    }

    pub async fn write(&self, dir: &Path, page_num: usize) -> Result<PathBuf, ScoutError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("page_{}.json", page_num));
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ScoutError::Other(anyhow::Error::new(e)))?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }
}

/// Step-extraction result, written to `page_{n}_ai.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSteps {
    pub url: String,
    pub ai_steps: Vec<InteractionStep>,
}

impl PageSteps {
    pub async fn write(&self, dir: &Path, page_num: usize) -> Result<PathBuf, ScoutError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("page_{}_ai.json", page_num));
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ScoutError::Other(anyhow::Error::new(e)))?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExploreSummary {
    /// Snapshots written, the landing page included
    pub pages: usize,
    pub visited: Vec<String>,
    pub failed: Vec<String>,
}

pub struct Explorer<'a, P: Page> {
    page: &'a P,
    client: &'a ChatClient,
    module: String,
    module_dir: PathBuf,
    cache_path: PathBuf,
    settle: Duration,
}

impl<'a, P: Page> Explorer<'a, P> {
    pub fn new(page: &'a P, client: &'a ChatClient, settings: &Settings, module: &str) -> Self {
        Self {
            page,
            client,
            module: module.to_string(),
            module_dir: settings.module_dir(module),
            cache_path: settings.selector_cache_path(module),
            settle: Duration::from_secs(2),
        }
    }

    /// Pause after each click before snapshotting
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Run the prompt loop until `exit` or end of input
    pub async fn run<R: BufRead, W: Write>(
        &self,
        mut input: R,
        mut out: W,
    ) -> Result<ExploreSummary, ScoutError> {
        let mut summary = ExploreSummary::default();
        let mut cache = MenuSelectors::load(&self.cache_path).await;

        self.snapshot(1).await?;
        self.record_steps(1, &mut out).await?;
        summary.pages = 1;
        let mut proposed = false;

        loop {
            if cache.available.is_empty() && !proposed {
                proposed = true;
                let added = cache.extend_available(self.propose().await);
                if added > 0 {
                    info!("Added {} proposed selectors", added);
                    writeln!(
                        out,
                        "Extracted available menu selectors: {:?}",
                        cache.available
                    )?;
                    write!(out, "Do you want to save the data? (yes/no): ")?;
                    out.flush()?;
                    let mut answer = String::new();
                    input.read_line(&mut answer)?;
                    if !answer.trim().eq_ignore_ascii_case("yes") {
                        writeln!(out, "Exiting traversal.")?;
                        break;
                    }
                    cache.save(&self.cache_path).await?;
                }
            }

            writeln!(out, "\nAvailable Menu Selectors: {:?}", cache.available)?;
            writeln!(out, "Done Menu Selectors: {:?}", cache.done)?;
            write!(out, "Enter an available menu selector (or 'exit' to stop): ")?;
            out.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                break;
            }
            let selector = line.trim();
            if selector.is_empty() {
                continue;
            }
            if selector.eq_ignore_ascii_case("exit") {
                writeln!(out, "Exiting traversal.")?;
                break;
            }

            match self.page.count(Locator::Css(selector)).await {
                Ok(0) => {
                    warn!("Selector '{}' matches no element", selector);
                    summary.failed.push(selector.to_string());
                    continue;
                }
                Err(e) => {
                    warn!("Cannot look up selector '{}': {}", selector, e);
                    summary.failed.push(selector.to_string());
                    continue;
                }
                Ok(_) => {}
            }
            if let Err(e) = self.page.click(Locator::Css(selector)).await {
                warn!("Error navigating with selector '{}': {}", selector, e);
                summary.failed.push(selector.to_string());
                continue;
            }
            tokio::time::sleep(self.settle).await;

            summary.pages += 1;
            let path = self.snapshot(summary.pages).await?;
            writeln!(out, "Saved page structure to {}", path.display())?;
            self.record_steps(summary.pages, &mut out).await?;

            cache.mark_done(selector);
            cache.save(&self.cache_path).await?;
            summary.visited.push(selector.to_string());
            proposed = false;
        }

        Ok(summary)
    }

    async fn snapshot(&self, page_num: usize) -> Result<PathBuf, ScoutError> {
        let snapshot = PageSnapshot::capture(self.page)
            .await
            .map_err(|e| ScoutError::Scrape(e.to_string()))?;
        snapshot.write(&self.module_dir, page_num).await
    }

    /// Ask for the current page's interactive steps and write them next to
    /// the snapshot. A failed request still writes an empty list.
    async fn record_steps<W: Write>(
        &self,
        page_num: usize,
        out: &mut W,
    ) -> Result<(), ScoutError> {
        let url = self.page.current_url().await.unwrap_or_default();
        let ai_steps = match self.page.page_source().await {
            Ok(source) => {
                let user = format!(
                    "URL: {}\n\n{}",
                    url,
                    truncate_chars(&source, SOURCE_LIMIT)
                );
                match self.client.complete(&steps_prompt(&self.module), &user).await {
                    Ok(reply) => parse_interaction_steps(&reply),
                    Err(e) => {
                        warn!("Step extraction for page {} failed: {}", page_num, e);
                        Vec::new()
                    }
                }
            }
            Err(e) => {
                warn!("Could not read page source: {}", e);
                Vec::new()
            }
        };
        let path = PageSteps { url, ai_steps }
            .write(&self.module_dir, page_num)
            .await?;
        writeln!(out, "Saved AI-based page structure to {}", path.display())?;
        Ok(())
    }

    async fn propose(&self) -> Vec<String> {
        info!("No available menu selectors, asking for proposals...");
        let source = match self.page.page_source().await {
            Ok(source) => source,
            Err(e) => {
                warn!("Could not read page source: {}", e);
                return Vec::new();
            }
        };
        let reply = match self
            .client
            .complete(PROPOSAL_PROMPT, truncate_chars(&source, SOURCE_LIMIT))
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Selector proposal failed: {}", e);
                return Vec::new();
            }
        };
        let proposals = parse_selector_proposals(&reply);
        if proposals.is_empty() {
            warn!("Proposal reply contained no usable selectors");
        }
        proposals.into_iter().map(|p| p.selector).collect()
    }
}

#[cfg(test)]
#[path = "explore_test.rs"]
mod explore_test;
