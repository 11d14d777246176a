//! Credential Set: cookies carried from the HTTP session into the browser

use cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Expiry value meaning "session cookie, no fixed expiry"
pub const SESSION_EXPIRY: i64 = -1;

/// Same-site policy of a cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

impl From<SameSite> for SameSitePolicy {
    fn from(value: SameSite) -> Self {
        match value {
            SameSite::Strict => SameSitePolicy::Strict,
            SameSite::Lax => SameSitePolicy::Lax,
            SameSite::None => SameSitePolicy::None,
        }
    }
}

impl From<SameSitePolicy> for SameSite {
    fn from(value: SameSitePolicy) -> Self {
        match value {
            SameSitePolicy::Strict => SameSite::Strict,
            SameSitePolicy::Lax => SameSite::Lax,
            SameSitePolicy::None => SameSite::None,
        }
    }
}

/// One cookie in the shape browser automation layers accept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Unix seconds, or [`SESSION_EXPIRY`]
    pub expires: i64,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSitePolicy,
}

impl CredentialRecord {
    /// Translate a stored cookie, pinning its domain to `host`
    pub fn from_cookie(cookie: &Cookie<'_>, host: &str) -> Self {
        let expires = cookie
            .expires_datetime()
            .map(|dt| dt.unix_timestamp())
            .or_else(|| {
                cookie
                    .max_age()
                    .map(|age| OffsetDateTime::now_utc().unix_timestamp() + age.whole_seconds())
            })
            .unwrap_or(SESSION_EXPIRY);

        CredentialRecord {
            name: cookie.name().to_string(),
            value: cookie.value().to_string(),
            domain: host.to_string(),
            path: cookie
                .path()
                .filter(|p| !p.is_empty())
                .unwrap_or("/")
                .to_string(),
            expires,
            http_only: cookie.http_only().unwrap_or(false),
            secure: cookie.secure().unwrap_or(false),
            same_site: cookie
                .same_site()
                .map(SameSitePolicy::from)
                .unwrap_or(SameSitePolicy::Lax),
        }
    }

    /// Cookie read back from a browser; same translation rules apply
    pub fn from_browser_cookie(cookie: &Cookie<'_>, host: &str) -> Self {
        Self::from_cookie(cookie, host)
    }

    pub fn is_session(&self) -> bool {
        self.expires == SESSION_EXPIRY
    }

    /// Build the WebDriver cookie object for injection
    pub fn to_browser_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(self.name.clone(), self.value.clone())
            .domain(self.domain.clone())
            .path(self.path.clone())
            .http_only(self.http_only)
            .secure(self.secure)
            .same_site(self.same_site.into())
            .finish();

        if !self.is_session()
            && let Ok(at) = OffsetDateTime::from_unix_timestamp(self.expires)
        {
            cookie.set_expires(at);
        }
        cookie
    }
}

/// Ordered cookies produced by authentication, consumed once by the navigator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialSet(pub Vec<CredentialRecord>);

impl CredentialSet {
    pub fn translate<'a, I>(cookies: I, host: &str) -> Self
    where
        I: IntoIterator<Item = &'a Cookie<'static>>,
    {
        CredentialSet(
            cookies
                .into_iter()
                .map(|c| CredentialRecord::from_cookie(c, host))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &CredentialRecord> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&CredentialRecord> {
        self.0.iter().rev().find(|c| c.name == name)
    }
}

#[cfg(test)]
#[path = "credentials_test.rs"]
mod credentials_test;
