//! HTTP session with its own cookie store, manual redirects and 5xx retry

use std::time::Duration;

use cookie::Cookie;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, LOCATION, SET_COOKIE, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::errors::AuthFailure;

const MAX_REDIRECTS: usize = 10;
const BROWSER_USER_AGENT: &str = "Mozilla/5.0";

/// Retry behavior for idempotent requests.
///
/// Delay before retry `n` (1-based) is `base_delay * 2^(n-1)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    pub base_delay: Duration,
    pub retry_statuses: Vec<StatusCode>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            retry_statuses: vec![
                StatusCode::INTERNAL_SERVER_ERROR,
                StatusCode::BAD_GATEWAY,
                StatusCode::SERVICE_UNAVAILABLE,
                StatusCode::GATEWAY_TIMEOUT,
            ],
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn backoff(&self, retry: usize) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        self.base_delay
            .saturating_mul(1u32 << (retry - 1).min(10) as u32)
    }

    pub fn should_retry(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status)
    }
}

/// A response after redirects were followed
#[derive(Debug)]
pub struct FollowedResponse {
    pub status: StatusCode,
    pub url: Url,
    /// URLs of every response that redirected, in order
    pub history: Vec<Url>,
    pub body: String,
}

pub struct HttpSession {
    client: Client,
    retry: RetryPolicy,
    cookies: Vec<Cookie<'static>>,
}

impl HttpSession {
    pub fn new(retry: RetryPolicy) -> Result<Self, AuthFailure> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AuthFailure::Network(e.to_string()))?;
        Ok(Self {
            client,
            retry,
            cookies: Vec::new(),
        })
    }

    pub fn cookies(&self) -> &[Cookie<'static>] {
        &self.cookies
    }

    pub fn has_cookie(&self, name: &str) -> bool {
        self.cookies.iter().any(|c| c.name() == name)
    }

    /// Store a cookie; same name and path replaces the earlier one in place
    pub fn store_cookie(&mut self, cookie: Cookie<'static>) {
        let existing = self
            .cookies
            .iter()
            .position(|c| c.name() == cookie.name() && c.path() == cookie.path());
        match existing {
            Some(idx) => self.cookies[idx] = cookie,
            None => self.cookies.push(cookie),
        }
    }

    fn absorb_cookies(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            match Cookie::parse(raw.to_string()) {
                Ok(cookie) => {
                    debug!("Stored cookie {}", cookie.name());
                    self.store_cookie(cookie);
                }
                Err(e) => debug!("Ignoring unparsable Set-Cookie: {}", e),
            }
        }
    }

    /// `Cookie` header for every stored cookie that is valid in a header
    fn cookie_header(&self) -> Option<HeaderValue> {
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter_map(|c| {
                let pair = format!("{}={}", c.name(), c.value());
                if HeaderValue::from_str(&pair).is_ok() {
                    Some(pair)
                } else {
                    debug!("Skipping cookie {}: value not valid in a header", c.name());
                    None
                }
            })
            .collect();
        if pairs.is_empty() {
            return None;
        }
        HeaderValue::from_str(&pairs.join("; ")).ok()
    }

    fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, url.clone())
            .header(USER_AGENT, BROWSER_USER_AGENT);
        if let Some(cookies) = self.cookie_header() {
            builder = builder.header(COOKIE, cookies);
        }
        builder
    }

    /// Send an idempotent GET, retrying on configured 5xx statuses and transport errors
    pub async fn get_with_retry(&mut self, url: &Url) -> Result<Response, AuthFailure> {
        let mut retry = 0;
        loop {
            let result = self.request(Method::GET, url).send().await;
            match result {
                Ok(response)
                    if self.retry.should_retry(response.status())
                        && retry < self.retry.max_retries =>
                {
                    retry += 1;
                    warn!(
                        "GET {} returned {}, retry {}/{}",
                        url,
                        response.status(),
                        retry,
                        self.retry.max_retries
                    );
                }
                Ok(response) => {
                    self.absorb_cookies(response.headers());
                    return Ok(response);
                }
                Err(e) if retry < self.retry.max_retries => {
                    retry += 1;
                    warn!(
                        "GET {} failed: {}, retry {}/{}",
                        url, e, retry, self.retry.max_retries
                    );
                }
                Err(e) => return Err(AuthFailure::Network(e.to_string())),
            }
            tokio::time::sleep(self.retry.backoff(retry)).await;
        }
    }

    /// GET a page, following redirects
    pub async fn get(&mut self, url: &Url) -> Result<FollowedResponse, AuthFailure> {
        let response = self.get_with_retry(url).await?;
        self.follow(response, url.clone(), None).await
    }

    /// POST a form once, then follow redirects.
    ///
    /// 307 and 308 resubmit the form to the new location; any other redirect
    /// continues with GET.
    pub async fn post_form(
        &mut self,
        url: &Url,
        form: &[(&str, &str)],
        headers: HeaderMap,
    ) -> Result<FollowedResponse, AuthFailure> {
        let response = self.send_form(url, form, &headers).await?;
        self.follow(response, url.clone(), Some((form, &headers))).await
    }

    async fn send_form(
        &mut self,
        url: &Url,
        form: &[(&str, &str)],
        headers: &HeaderMap,
    ) -> Result<Response, AuthFailure> {
        let response = self
            .request(Method::POST, url)
            .headers(headers.clone())
            .form(form)
            .send()
            .await
            .map_err(|e| AuthFailure::Network(e.to_string()))?;
        self.absorb_cookies(response.headers());
        Ok(response)
    }

    async fn follow(
        &mut self,
        mut response: Response,
        mut current: Url,
        mut resubmit: Option<(&[(&str, &str)], &HeaderMap)>,
    ) -> Result<FollowedResponse, AuthFailure> {
        let mut history = Vec::new();

        while response.status().is_redirection() {
            if history.len() >= MAX_REDIRECTS {
                return Err(AuthFailure::Network(format!(
                    "too many redirects from {}",
                    current
                )));
            }
            let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|l| l.to_str().ok())
            else {
                break;
            };
            let next = current
                .join(location)
                .map_err(|e| AuthFailure::Network(format!("bad redirect {}: {}", location, e)))?;
            debug!("Redirect {} -> {}", current, next);
            history.push(current);
            current = next;
            let keeps_method = matches!(
                response.status(),
                StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
            );
            response = match resubmit {
                Some((form, headers)) if keeps_method => {
                    self.send_form(&current, form, headers).await?
                }
                _ => {
                    resubmit = None;
                    self.get_with_retry(&current).await?
                }
            };
        }

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthFailure::Network(e.to_string()))?;

        Ok(FollowedResponse {
            status,
            url: current,
            history,
            body,
        })
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
