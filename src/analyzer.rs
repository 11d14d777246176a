//! Remote Analyzer: sends an Element Dump to a chat-completion endpoint

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::dump;
use crate::errors::{Outcome, ScoutError};

/// Upper bound on records sent upstream
pub const MAX_ELEMENTS: usize = 2000;
pub const REPORT_HEADER: &str = "# Odoo Structure Analysis\n\n";
const TEMPERATURE: f32 = 0.3;

pub const SYSTEM_PROMPT: &str = "Analyze this Odoo XML/HTML structure and identify:
1. Core application components (menus, views, templates)
2. Actionable elements (buttons, links, form inputs)
3. Business logic indicators (model references, actions)
4. Inheritance points (xpath expressions)
5. Security and access control elements

Format response in Markdown with Odoo-specific technical insights.";

/// Why a completion produced no usable content
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("no API key configured for the chat-completion endpoint")]
    MissingApiKey,
    #[error("request to the chat-completion endpoint failed: {0}")]
    Transport(String),
    #[error("could not extract content from the completion response (status {status}): {body}")]
    Malformed { status: u16, body: String },
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

/// Minimal OpenAI-compatible chat-completion client
pub struct ChatClient {
    http: reqwest::Client,
    pub api_url: String,
    api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
}

impl ChatClient {
    pub fn new(api_url: &str, api_key: Option<String>, model: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_url: api_url.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            model: model.to_string(),
            temperature: TEMPERATURE,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.api_url, settings.api_key.clone(), &settings.model)
    }

    /// One system + user turn; returns `choices[0].message.content`
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError> {
        let api_key = self.api_key.as_deref().ok_or(CompletionError::MissingApiKey)?;
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
        };

        debug!("POST {} ({} chars of user content)", self.api_url, user.len());
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        extract_content(&body)
            .ok_or(CompletionError::Malformed { status, body })
    }
}

/// `choices[0].message.content` from a raw response body
pub fn extract_content(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/choices/0/message/content")?
        .as_str()
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub path: PathBuf,
    pub elements_sent: usize,
}

/// Analyze the dump at `dump_path` and write the report to `report_path`.
///
/// Remote failures degrade the report body to a diagnostic; only local I/O
/// failures are fatal.
pub async fn analyze(client: &ChatClient, dump_path: &Path, report_path: &Path) -> Outcome<Report> {
    let data = match tokio::fs::read_to_string(dump_path).await {
        Ok(data) => data,
        Err(e) => {
            return Outcome::Fatal(ScoutError::Io(std::io::Error::new(
                e.kind(),
                format!("cannot read dump {}: {}", dump_path.display(), e),
            )));
        }
    };

    let mut elements = dump::records(&data);
    if elements.len() > MAX_ELEMENTS {
        info!(
            "Truncating {} elements to {} for the token budget",
            elements.len(),
            MAX_ELEMENTS
        );
        elements.truncate(MAX_ELEMENTS);
    }
    let elements_sent = elements.len();

    info!(
        "Analyzing {} scraped elements with {}...",
        elements_sent, client.model
    );
    let (body, warning) = match client.complete(SYSTEM_PROMPT, &elements.join("\n")).await {
        Ok(content) => (content, None),
        Err(e) => {
            warn!("Analysis degraded: {}", e);
            (
                format!("Error: {}. Check the logs for more details.", e),
                Some(e.to_string()),
            )
        }
    };

    if let Err(e) = write_report(report_path, &body).await {
        return Outcome::Fatal(e);
    }
    info!("Analysis saved to {}", report_path.display());

    let report = Report {
        path: report_path.to_path_buf(),
        elements_sent,
    };
    match warning {
        None => Outcome::Ok(report),
        Some(warning) => Outcome::Degraded {
            value: report,
            warning,
        },
    }
}

async fn write_report(path: &Path, body: &str) -> Result<(), ScoutError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, format!("{}{}", REPORT_HEADER, body)).await?;
    Ok(())
}

#[cfg(test)]
#[path = "analyzer_test.rs"]
mod analyzer_test;
