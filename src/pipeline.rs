//! Module prompt and end-to-end orchestration of a scouting run

use std::io::{BufRead, Write};
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::analyzer::{self, ChatClient};
use crate::auth::{Authenticator, BrowserLogin, FormLogin};
use crate::config::Settings;
use crate::errors::{Outcome, ScoutError};
use crate::explore::{ExploreSummary, Explorer};
use crate::navigator::{self, ModuleSelector};
use crate::page::Page;
use crate::scrape;
use crate::webdriver::Browser;
use crate::webdriver_manager::GLOBAL_WEBDRIVER_MANAGER;

/// Operator's answer at the module prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Exit,
    Module(String),
}

/// `exit` (any case) or a 1-based index into `modules`
pub fn parse_choice(input: &str, modules: &[String]) -> Result<Choice, ScoutError> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("exit") {
        return Ok(Choice::Exit);
    }
    let invalid = || {
        ScoutError::Config(format!(
            "Invalid input '{}'. Please enter a module number between 1 and {}",
            input,
            modules.len()
        ))
    };
    let index: usize = input.parse().map_err(|_| invalid())?;
    index
        .checked_sub(1)
        .and_then(|i| modules.get(i))
        .map(|label| Choice::Module(label.clone()))
        .ok_or_else(invalid)
}

/// Print the numbered module list and read one answer; end of input means exit
pub fn prompt_choice<R: BufRead, W: Write>(
    modules: &[String],
    mut input: R,
    mut out: W,
) -> Result<Choice, ScoutError> {
    writeln!(out, "Available modules:")?;
    for (idx, module) in modules.iter().enumerate() {
        writeln!(out, "{}. {}", idx + 1, module)?;
    }
    let example = modules.first().map(String::as_str).unwrap_or("Inventory");
    write!(
        out,
        "Enter module number (e.g., 1 for '{}') or type 'exit' to quit: ",
        example
    )?;
    out.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(Choice::Exit);
    }
    parse_choice(&line, modules)
}

/// How the run obtains its session cookies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AuthMode {
    /// POST the login form over HTTP
    #[default]
    Form,
    /// Type into the login form in the driven browser
    Browser,
}

/// What a run produced, printed as JSON on success
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub module: String,
    pub cookies: usize,
    pub url: String,
    pub dump_path: PathBuf,
    pub elements: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elements_analyzed: Option<usize>,
    pub warnings: Vec<String>,
}

fn settle<T>(outcome: Outcome<T>, warnings: &mut Vec<String>) -> Result<T, ScoutError> {
    if let Some(warning) = outcome.warning() {
        warn!("{}", warning);
        warnings.push(warning.to_string());
    }
    outcome.into_result()
}

/// Authenticate, navigate, scrape and optionally analyze on an open page
pub async fn run_stages<P: Page>(
    page: &P,
    authenticator: &dyn Authenticator,
    settings: &Settings,
    module: &ModuleSelector,
    analysis: Option<&ChatClient>,
) -> Result<RunReport, ScoutError> {
    let mut warnings = Vec::new();
    let label = module.label();

    let credentials = authenticator.authenticate(settings).await?;
    info!("Login successful!");

    let view = settle(
        navigator::navigate(page, &credentials, module, settings).await,
        &mut warnings,
    )?;

    let dump_path = settings.dump_path(label);
    let summary = settle(scrape::scrape(page, &dump_path).await, &mut warnings)?;

    let mut report = RunReport {
        module: label.to_string(),
        cookies: credentials.len(),
        url: view.url,
        dump_path: summary.path,
        elements: summary.elements,
        report_path: None,
        elements_analyzed: None,
        warnings: Vec::new(),
    };

    if let Some(client) = analysis {
        let analyzed = settle(
            analyzer::analyze(client, &report.dump_path, &settings.report_path(label)).await,
            &mut warnings,
        )?;
        report.report_path = Some(analyzed.path);
        report.elements_analyzed = Some(analyzed.elements_sent);
    }

    report.warnings = warnings;
    Ok(report)
}

/// Authenticate, navigate, then hand the page to the interactive explorer
pub async fn explore_stages<P: Page, R: BufRead, W: Write>(
    page: &P,
    authenticator: &dyn Authenticator,
    settings: &Settings,
    module: &ModuleSelector,
    client: &ChatClient,
    input: R,
    out: W,
) -> Result<ExploreSummary, ScoutError> {
    let credentials = authenticator.authenticate(settings).await?;
    navigator::navigate(page, &credentials, module, settings)
        .await
        .into_result()?;
    Explorer::new(page, client, settings, module.label())
        .run(input, out)
        .await
}

async fn open_browser(settings: &Settings) -> Result<Browser, ScoutError> {
    match Browser::new(settings.browser, settings.headless(), settings.timeout()).await {
        Ok(browser) => Ok(browser),
        Err(e) => {
            GLOBAL_WEBDRIVER_MANAGER.stop_all();
            Err(ScoutError::WebDriver(format!("{:#}", e)))
        }
    }
}

/// Close the browser and stop the driver; each failure is logged on its own
async fn teardown(browser: Browser) {
    if let Err(e) = browser.close().await {
        warn!("Failed to close browser: {:#}", e);
    }
    GLOBAL_WEBDRIVER_MANAGER.stop_all();
    info!("Browser closed");
}

/// Full pipeline against a real browser. Teardown runs whatever the outcome.
pub async fn run_pipeline(
    settings: &Settings,
    module: &ModuleSelector,
    auth: AuthMode,
    analyze: bool,
) -> Result<RunReport, ScoutError> {
    let client = ChatClient::from_settings(settings);
    let analysis = analyze.then_some(&client);

    let browser = open_browser(settings).await?;
    let result = match auth {
        AuthMode::Form => {
            run_stages(&browser, &FormLogin::default(), settings, module, analysis).await
        }
        AuthMode::Browser => {
            let login = BrowserLogin::new(&browser);
            run_stages(&browser, &login, settings, module, analysis).await
        }
    };
    teardown(browser).await;
    result
}

/// Interactive traversal against a real browser, reading stdin
pub async fn run_explore(
    settings: &Settings,
    module: &ModuleSelector,
    auth: AuthMode,
) -> Result<ExploreSummary, ScoutError> {
    let client = ChatClient::from_settings(settings);
    let browser = open_browser(settings).await?;
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let result = match auth {
        AuthMode::Form => {
            explore_stages(
                &browser,
                &FormLogin::default(),
                settings,
                module,
                &client,
                stdin.lock(),
                stdout.lock(),
            )
            .await
        }
        AuthMode::Browser => {
            let login = BrowserLogin::new(&browser);
            explore_stages(
                &browser,
                &login,
                settings,
                module,
                &client,
                stdin.lock(),
                stdout.lock(),
            )
            .await
        }
    };
    teardown(browser).await;
    result
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod pipeline_test;
