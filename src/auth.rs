//! Session authentication against the Odoo login form

use std::time::Duration;

use async_trait::async_trait;
use fantoccini::Locator;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ORIGIN, REFERER};
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Settings;
use crate::credentials::{CredentialRecord, CredentialSet};
use crate::errors::{AuthFailure, ScoutError};
use crate::page::Page;
use crate::session::{FollowedResponse, HttpSession, RetryPolicy};

const LOGIN_PATH: &str = "web/login";
const SESSION_COOKIE: &str = "session_id";
const MAIN_NAVBAR: &str = "div#oe_main_menu_navbar";
const SUBMIT_BUTTON: &str = "button[type='submit']";
const SUBMIT_WAIT: Duration = Duration::from_secs(5);

/// Produces a logged-in Credential Set for the configured instance
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, settings: &Settings) -> Result<CredentialSet, ScoutError>;
}

/// Pull the CSRF token from a login page, trying the form input before the meta tag
pub fn extract_csrf_token(html: &str) -> Result<String, AuthFailure> {
    let document = Html::parse_document(html);
    let candidates = [
        ("input[name=\"csrf_token\"]", "value"),
        ("meta[name=\"csrf_token\"]", "content"),
    ];

    for (css, attr) in candidates {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        if let Some(token) = document
            .select(&selector)
            .find_map(|el| el.value().attr(attr))
            .filter(|t| !t.is_empty())
        {
            return Ok(token.to_string());
        }
    }
    Err(AuthFailure::TokenMissing)
}

/// Which of the post-login signals fired
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoginSignals {
    pub redirected_away: bool,
    pub session_cookie: bool,
    pub main_navbar: bool,
}

impl LoginSignals {
    pub fn inspect(response: &FollowedResponse, session_cookie: bool) -> Self {
        let redirected_away =
            !response.history.is_empty() && !response.url.as_str().contains(LOGIN_PATH);
        let main_navbar = Selector::parse(MAIN_NAVBAR)
            .map(|sel| {
                Html::parse_document(&response.body)
                    .select(&sel)
                    .next()
                    .is_some()
            })
            .unwrap_or(false);
        Self {
            redirected_away,
            session_cookie,
            main_navbar,
        }
    }

    /// Any one positive signal is enough
    pub fn authenticated(&self) -> bool {
        self.redirected_away || self.session_cookie || self.main_navbar
    }
}

/// Form-POST strategy: fetch the login page, post credentials with its CSRF token
pub struct FormLogin {
    retry: RetryPolicy,
}

impl FormLogin {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }
}

impl Default for FormLogin {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[async_trait]
impl Authenticator for FormLogin {
    async fn authenticate(&self, settings: &Settings) -> Result<CredentialSet, ScoutError> {
        let host = settings.host()?;
        let login_url = Url::parse(&settings.login_url())
            .map_err(|e| ScoutError::Config(format!("invalid login URL: {}", e)))?;
        let mut session = HttpSession::new(self.retry.clone())?;

        info!("Fetching login page {}", login_url);
        let page = session.get(&login_url).await?;
        if !page.status.is_success() {
            return Err(AuthFailure::Network(format!(
                "login page returned {}",
                page.status
            ))
            .into());
        }

        let token = extract_csrf_token(&page.body).inspect_err(|_| {
            let preview: String = page.body.chars().take(2000).collect();
            debug!("Login page content:\n{}", preview);
        })?;
        debug!(
            "Obtained CSRF token {}...",
            token.chars().take(15).collect::<String>()
        );

        let mut headers = HeaderMap::new();
        if let Ok(origin) = HeaderValue::from_str(settings.base()) {
            headers.insert(ORIGIN, origin);
        }
        if let Ok(referer) = HeaderValue::from_str(login_url.as_str()) {
            headers.insert(REFERER, referer);
        }
        headers.insert(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        );

        let form = [
            ("csrf_token", token.as_str()),
            ("login", settings.username.as_str()),
            ("password", settings.password.as_str()),
            ("redirect", "/web"),
        ];
        let response = session.post_form(&login_url, &form, headers).await?;
        info!("Login response: {} at {}", response.status, response.url);

        let signals = LoginSignals::inspect(&response, session.has_cookie(SESSION_COOKIE));
        debug!("Login signals: {:?}", signals);
        if !signals.authenticated() {
            let preview: String = response.body.chars().take(2000).collect();
            debug!("Auth check failed. Response content:\n{}", preview);
            return Err(AuthFailure::Rejected.into());
        }

        let credentials = CredentialSet::translate(session.cookies(), &host);
        info!("Authenticated with {} cookie(s)", credentials.len());
        Ok(credentials)
    }
}

/// Browser-driven strategy: type into the real login form and read back cookies
pub struct BrowserLogin<'a, P: Page> {
    page: &'a P,
}

impl<'a, P: Page> BrowserLogin<'a, P> {
    pub fn new(page: &'a P) -> Self {
        Self { page }
    }
}

#[async_trait]
impl<P: Page> Authenticator for BrowserLogin<'_, P> {
    async fn authenticate(&self, settings: &Settings) -> Result<CredentialSet, ScoutError> {
        let host = settings.host()?;
        let network = |e: anyhow::Error| ScoutError::from(AuthFailure::Network(e.to_string()));

        info!("Logging in through the browser at {}", settings.login_url());
        self.page.goto(&settings.login_url()).await.map_err(network)?;
        self.page
            .fill(Locator::Css("input[name='login']"), &settings.username)
            .await
            .map_err(network)?;
        self.page
            .fill(Locator::Css("input[name='password']"), &settings.password)
            .await
            .map_err(network)?;

        self.page
            .wait_for(Locator::Css(SUBMIT_BUTTON), SUBMIT_WAIT)
            .await
            .map_err(|e| AuthFailure::SubmitNotFound(format!("{}: {}", SUBMIT_BUTTON, e)))?;
        self.page
            .click(Locator::Css(SUBMIT_BUTTON))
            .await
            .map_err(|e| AuthFailure::SubmitNotFound(format!("{}: {}", SUBMIT_BUTTON, e)))?;

        if let Err(e) = self
            .page
            .wait_for(Locator::Css(".o_main_navbar"), Duration::from_secs(2))
            .await
        {
            warn!("Main navbar not visible after login: {}", e);
        }

        let cookies = self.page.cookies().await.map_err(network)?;
        let credentials = CredentialSet(
            cookies
                .iter()
                .map(|c| CredentialRecord::from_browser_cookie(c, &host))
                .collect(),
        );
        if credentials.get(SESSION_COOKIE).is_none() {
            return Err(AuthFailure::Rejected.into());
        }
        info!("Browser login produced {} cookie(s)", credentials.len());
        Ok(credentials)
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;
