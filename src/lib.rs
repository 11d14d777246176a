//! # odoo-scout
#![allow(clippy::uninlined_format_args)]
//!
//! CLI tool that logs into an Odoo instance, walks to one business module,
//! dumps every DOM element of its landing view and asks an LLM for a
//! structural analysis of the dump.
//!
//! ## CLI Usage
//!
//! ```bash
//! # Pick a module interactively, then scrape and analyze it
//! odoo-scout run
//!
//! # Non-interactive: module by number or name
//! odoo-scout run --module 1
//! odoo-scout run --module Sales --auth browser
//!
//! # Stop after the Element Dump
//! odoo-scout scrape --module Inventory
//!
//! # Analyze an existing dump without a browser
//! odoo-scout analyze --module Inventory --dump odoo/odoo17/Inventory/Inventory_elements.txt
//!
//! # Walk a module page by page, clicking proposed menu selectors
//! odoo-scout explore --module Inventory
//!
//! # List supported modules
//! odoo-scout modules
//! ```
//!
//! ## Configuration
//!
//! Every option can come from the environment:
//!
//! | Variable | Meaning |
//! |---|---|
//! | `ODOO_URL` | Base URL of the instance |
//! | `ODOO_USERNAME` / `ODOO_PASSWORD` | Login credentials |
//! | `OPENROUTER_API_KEY` | Bearer token for the chat-completion endpoint |
//! | `OPENROUTER_API_URL` | Chat-completion endpoint |
//! | `ODOO_SCOUT_MODEL` | Model identifier |
//! | `ODOO_SCOUT_DEBUG` | Verbose logging |
//!
//! ## Output layout
//!
//! ```text
//! odoo/odoo17/<Module>/<Module>_elements.txt     Element Dump
//! odoo/odoo17/<Module>/base/odoo_analysis.md     Analysis report
//! odoo/odoo17/<Module>/list_of_menu_selectors.json
//! odoo/odoo17/<Module>/page_<n>.json             Explore snapshots
//! ```
//!
//! ## Library Usage
//!
//! ```no_run
//! use odoo_scout::{AuthMode, ModuleSelector, Settings, run_pipeline};
//!
//! # async fn example() -> Result<(), odoo_scout::ScoutError> {
//! let settings = Settings::new("http://localhost:8070", "admin", "admin");
//! let module = ModuleSelector::parse("Inventory", &settings.modules)?;
//! let report = run_pipeline(&settings, &module, AuthMode::Form, true).await?;
//! println!("{} elements dumped to {}", report.elements, report.dump_path.display());
//! # Ok(())
//! # }
//! ```

/// Remote structural analysis of an Element Dump
pub mod analyzer;
/// Session authentication (form POST or driven browser)
pub mod auth;
/// Run settings from flags and environment
pub mod config;
/// HTTP cookies translated for the browser
pub mod credentials;
/// Element Dump text format
pub mod dump;
/// Error and stage outcome types
pub mod errors;
/// Interactive page-by-page traversal
pub mod explore;
/// Apps-menu navigation to a module landing view
pub mod navigator;
/// Browser page abstraction
pub mod page;
/// Module prompt and run orchestration
pub mod pipeline;
/// DOM scraping into an Element Dump
pub mod scrape;
/// Menu selector cache
pub mod selectors;
/// Cookie-carrying HTTP session with retry
pub mod session;
/// WebDriver browser automation
pub mod webdriver;
/// WebDriver process lifecycle
pub mod webdriver_manager;

#[cfg(test)]
mod fake_page;

pub use analyzer::{ChatClient, Report};
pub use auth::{Authenticator, BrowserLogin, FormLogin};
pub use config::Settings;
pub use credentials::{CredentialRecord, CredentialSet};
pub use errors::{AuthFailure, NavigationFailure, Outcome, ScoutError};
pub use navigator::{ModuleSelector, ModuleView};
pub use page::Page;
pub use pipeline::{AuthMode, Choice, RunReport, parse_choice, run_pipeline};
pub use webdriver::{Browser, BrowserType};
