//! Run settings, assembled once from CLI flags and the environment

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::errors::ScoutError;
use crate::webdriver::BrowserType;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8070";
pub const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1:free";
pub const DEFAULT_MODULES: [&str; 8] = [
    "Inventory",
    "Sales",
    "Purchase",
    "Accounting",
    "Employees",
    "CRM",
    "Contacts",
    "Discuss",
];

/// Everything a run needs to know, passed down explicitly
#[derive(Debug, Clone, clap::Args)]
pub struct Settings {
    /// Base URL of the Odoo instance
    #[arg(long, env = "ODOO_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub base_url: String,

    /// Odoo login
    #[arg(long, env = "ODOO_USERNAME", default_value = "", global = true)]
    pub username: String,

    /// Odoo password
    #[arg(long, env = "ODOO_PASSWORD", default_value = "", hide_env_values = true, global = true)]
    pub password: String,

    /// API key for the chat-completion endpoint
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Chat-completion endpoint
    #[arg(long, env = "OPENROUTER_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Model used for the structural analysis
    #[arg(long, env = "ODOO_SCOUT_MODEL", default_value = DEFAULT_MODEL, global = true)]
    pub model: String,

    /// Enable debug logging
    #[arg(long, env = "ODOO_SCOUT_DEBUG", global = true)]
    pub debug: bool,

    /// Page load timeout in milliseconds
    #[arg(long, env = "ODOO_SCOUT_TIMEOUT_MS", default_value = "30000", global = true)]
    pub timeout_ms: u64,

    /// Root directory for dumps, reports and caches
    #[arg(long, default_value = "odoo", global = true)]
    pub output_root: PathBuf,

    /// Odoo version segment of the output layout
    #[arg(long, default_value = "odoo17", global = true)]
    pub odoo_version: String,

    /// Modules offered to the operator
    #[arg(long, value_delimiter = ',', default_values = DEFAULT_MODULES, global = true)]
    pub modules: Vec<String>,

    /// Browser to drive
    #[arg(long, value_enum, default_value = "firefox", global = true)]
    pub browser: BrowserType,

    /// Run browser in visible mode (disables headless)
    #[arg(long = "no-headless", global = true)]
    pub no_headless: bool,
}

impl Settings {
    /// Settings with defaults for everything but the target and credentials
    pub fn new(base_url: &str, username: &str, password: &str) -> Self {
        Settings {
            base_url: base_url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            debug: false,
            timeout_ms: 30_000,
            output_root: PathBuf::from("odoo"),
            odoo_version: "odoo17".to_string(),
            modules: DEFAULT_MODULES.iter().map(|m| m.to_string()).collect(),
            browser: BrowserType::Firefox,
            no_headless: false,
        }
    }

    /// Fail early on settings that would only surface mid-run
    pub fn validate(&self) -> Result<(), ScoutError> {
        self.host()?;
        if self.username.is_empty() || self.password.is_empty() {
            return Err(ScoutError::Config(
                "ODOO_USERNAME and ODOO_PASSWORD must be set".to_string(),
            ));
        }
        if self.modules.is_empty() {
            return Err(ScoutError::Config("module list is empty".to_string()));
        }
        Ok(())
    }

    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Host of the configured base URL; cookies are pinned to it
    pub fn host(&self) -> Result<String, ScoutError> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ScoutError::Config(format!("invalid base URL {}: {}", self.base_url, e)))?;
        url.host_str()
            .map(str::to_string)
            .ok_or_else(|| ScoutError::Config(format!("base URL {} has no host", self.base_url)))
    }

    pub fn login_url(&self) -> String {
        format!("{}/web/login", self.base())
    }

    pub fn web_url(&self) -> String {
        format!("{}/web", self.base())
    }

    pub fn headless(&self) -> bool {
        !self.no_headless
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn module_dir(&self, module: &str) -> PathBuf {
        self.output_root.join(&self.odoo_version).join(module)
    }

    pub fn dump_path(&self, module: &str) -> PathBuf {
        self.module_dir(module).join(format!("{module}_elements.txt"))
    }

    pub fn report_path(&self, module: &str) -> PathBuf {
        self.module_dir(module).join("base").join("odoo_analysis.md")
    }

    pub fn selector_cache_path(&self, module: &str) -> PathBuf {
        self.module_dir(module).join(crate::selectors::CACHE_FILE)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
