use thiserror::Error;

/// Why authentication against the login form failed
#[derive(Debug, Error)]
pub enum AuthFailure {
    /// Neither `input[name=csrf_token]` nor `meta[name=csrf_token]` was present
    #[error("CSRF token not found in login page")]
    TokenMissing,
    /// None of the post-login signals indicated a logged-in session
    #[error("login was rejected (no redirect away from login, no session cookie, no main navbar)")]
    Rejected,
    /// Transport failure or non-success status after retries
    #[error("network failure: {0}")]
    Network(String),
    /// The login submit button never became available
    #[error("submit element not found: {0}")]
    SubmitNotFound(String),
}

/// Why the navigator could not reach a module landing view
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationFailure {
    #[error("apps menu not found")]
    AppsMenuMissing,
    #[error("module not found")]
    ModuleNotFound,
    #[error("menu entry not found")]
    MenuEntryMissing,
    #[error("landing view marker did not appear")]
    LandingMarkerMissing,
    #[error("page did not load: {0}")]
    PageLoad(String),
}

/// Error type for every stage of a scouting run, carrying an exit code
#[derive(Debug, Error)]
pub enum ScoutError {
    /// Invalid settings or operator input (exit code 6)
    #[error("configuration error: {0}")]
    Config(String),
    /// Login failed (exit code 2)
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthFailure),
    /// Could not reach the module's landing view (exit code 3)
    #[error("navigation to {module} failed: {reason}")]
    Navigation {
        module: String,
        reason: NavigationFailure,
    },
    /// Element serialization failed (exit code 4)
    #[error("scrape failed: {0}")]
    Scrape(String),
    /// WebDriver connection failed (exit code 5)
    #[error("WebDriver connection failed: {0}")]
    WebDriver(String),
    /// Filesystem failure (exit code 1)
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Generic error (exit code 1)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScoutError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ScoutError::Authentication(_) => 2,
            ScoutError::Navigation { .. } => 3,
            ScoutError::Scrape(_) => 4,
            ScoutError::WebDriver(_) => 5,
            ScoutError::Config(_) => 6,
            ScoutError::Io(_) | ScoutError::Other(_) => 1,
        }
    }

    pub fn navigation(module: impl Into<String>, reason: NavigationFailure) -> Self {
        ScoutError::Navigation {
            module: module.into(),
            reason,
        }
    }
}

/// Result of a pipeline stage.
///
/// `Fatal` aborts the run. `Degraded` carries a usable value plus a warning
/// describing what went wrong; the run continues.
#[derive(Debug)]
pub enum Outcome<T> {
    Ok(T),
    Degraded { value: T, warning: String },
    Fatal(ScoutError),
}

impl<T> Outcome<T> {
    pub fn warning(&self) -> Option<&str> {
        match self {
            Outcome::Degraded { warning, .. } => Some(warning),
            _ => None,
        }
    }

    /// Drop the degraded/ok distinction, keeping only fatal errors
    pub fn into_result(self) -> Result<T, ScoutError> {
        match self {
            Outcome::Ok(value) | Outcome::Degraded { value, .. } => Ok(value),
            Outcome::Fatal(err) => Err(err),
        }
    }
}

impl<T> From<Result<T, ScoutError>> for Outcome<T> {
    fn from(result: Result<T, ScoutError>) -> Self {
        match result {
            Ok(value) => Outcome::Ok(value),
            Err(err) => Outcome::Fatal(err),
        }
    }
}

#[cfg(test)]
#[path = "errors_test.rs"]
mod errors_test;
