//! Drives an authenticated page to a module's landing view

use std::time::Duration;

use fantoccini::Locator;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::credentials::CredentialSet;
use crate::errors::{NavigationFailure, Outcome, ScoutError};
use crate::page::Page;

pub const MAIN_NAVBAR: &str = ".o_main_navbar";
pub const APPS_MENU: &str = ".o_navbar_apps_menu";

const NAVBAR_WAIT: Duration = Duration::from_millis(1000);
const MENU_SETTLE: Duration = Duration::from_millis(100);
const LANDING_WAIT: Duration = Duration::from_millis(3000);

/// Landing-view markers for the modules the navigator knows how to reach.
/// The navbar brand only shows a module's name once its action has loaded, so
/// a view left over from the previous action never matches.
const LANDING_MARKERS: &[(&str, &str)] = &[
    ("Inventory", "//nav[contains(@class,'o_main_navbar')]//*[contains(@class,'o_menu_brand') and normalize-space(.)='Inventory']"),
    ("Sales", "//nav[contains(@class,'o_main_navbar')]//*[contains(@class,'o_menu_brand') and normalize-space(.)='Sales']"),
    ("Purchase", "//nav[contains(@class,'o_main_navbar')]//*[contains(@class,'o_menu_brand') and normalize-space(.)='Purchase']"),
    ("Accounting", "//nav[contains(@class,'o_main_navbar')]//*[contains(@class,'o_menu_brand') and normalize-space(.)='Accounting']"),
    ("Employees", "//nav[contains(@class,'o_main_navbar')]//*[contains(@class,'o_menu_brand') and normalize-space(.)='Employees']"),
    ("CRM", "//nav[contains(@class,'o_main_navbar')]//*[contains(@class,'o_menu_brand') and normalize-space(.)='CRM']"),
    ("Contacts", "//nav[contains(@class,'o_main_navbar')]//*[contains(@class,'o_menu_brand') and normalize-space(.)='Contacts']"),
    ("Discuss", "//nav[contains(@class,'o_main_navbar')]//*[contains(@class,'o_menu_brand') and normalize-space(.)='Discuss']"),
];

/// A module label the operator may pick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSelector(String);

impl ModuleSelector {
    /// Accept `label` only if it is one of the configured modules (case-insensitive)
    pub fn parse(label: &str, supported: &[String]) -> Result<Self, ScoutError> {
        supported
            .iter()
            .find(|m| m.eq_ignore_ascii_case(label.trim()))
            .map(|m| ModuleSelector(m.clone()))
            .ok_or_else(|| {
                ScoutError::Config(format!(
                    "unsupported module '{}', expected one of: {}",
                    label,
                    supported.join(", ")
                ))
            })
    }

    pub fn label(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModuleSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn landing_marker(label: &str) -> Option<&'static str> {
    LANDING_MARKERS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(label))
        .map(|(_, marker)| *marker)
}

/// Apps-menu entry whose visible text contains `label`
pub fn menu_entry_xpath(label: &str) -> String {
    format!(
        "//*[contains(concat(' ', normalize-space(@class), ' '), ' o_app ') and contains(normalize-space(.), '{}')]",
        label.replace('\'', "")
    )
}

/// Where the navigator left the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleView {
    pub module: String,
    pub url: String,
}

/// Install `credentials` and walk the apps menu to `module`.
///
/// Never panics on a missing element: every miss is logged and returned as a
/// typed [`NavigationFailure`]. The page stays owned by the caller.
pub async fn navigate<P: Page>(
    page: &P,
    credentials: &CredentialSet,
    module: &ModuleSelector,
    settings: &Settings,
) -> Outcome<ModuleView> {
    let label = module.label();
    let fail = |reason: NavigationFailure| -> Outcome<ModuleView> {
        warn!("Navigation to {} stopped: {}", label, reason);
        Outcome::Fatal(ScoutError::navigation(label, reason))
    };

    // WebDriver only accepts cookies for the origin currently loaded
    if let Err(e) = page.goto(settings.base()).await {
        return fail(NavigationFailure::PageLoad(e.to_string()));
    }
    if let Err(e) = page.add_cookies(credentials).await {
        return fail(NavigationFailure::PageLoad(format!(
            "could not install cookies: {}",
            e
        )));
    }
    let web_url = settings.web_url();
    if let Err(e) = tokio::time::timeout(settings.timeout(), page.goto(&web_url))
        .await
        .unwrap_or_else(|_| Err(anyhow::anyhow!("timed out loading {}", web_url)))
    {
        return fail(NavigationFailure::PageLoad(e.to_string()));
    }

    if let Err(e) = page.wait_for(Locator::Css(MAIN_NAVBAR), NAVBAR_WAIT).await {
        debug!("Main navbar not seen, continuing: {}", e);
    }

    info!("Navigating to {} module...", label);
    if let Err(e) = page.click(Locator::Css(APPS_MENU)).await {
        debug!("Apps menu click failed: {}", e);
        return fail(NavigationFailure::AppsMenuMissing);
    }
    tokio::time::sleep(MENU_SETTLE).await;

    let Some(marker) = landing_marker(label) else {
        return fail(NavigationFailure::ModuleNotFound);
    };

    let entry = menu_entry_xpath(label);
    if let Err(e) = page.click(Locator::XPath(&entry)).await {
        debug!("Menu entry click failed: {}", e);
        return fail(NavigationFailure::MenuEntryMissing);
    }

    if let Err(e) = page.wait_for(Locator::XPath(marker), LANDING_WAIT).await {
        debug!("Landing marker wait failed: {}", e);
        return fail(NavigationFailure::LandingMarkerMissing);
    }

    let url = page.current_url().await.unwrap_or_default();
    info!("{} module page loaded at {}", label, url);
    Outcome::Ok(ModuleView {
        module: label.to_string(),
        url,
    })
}

#[cfg(test)]
#[path = "navigator_test.rs"]
mod navigator_test;
