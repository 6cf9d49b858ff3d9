//! Error types for jobpilot.

use std::time::Duration;

/// Errors raised by the browser driver, the LLM providers and the result sink.
///
/// Per-job conditions (missing cookies, expired sessions) are not errors; they
/// surface as [`crate::OutcomeStatus::Skipped`] outcomes instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Browser or CDP failure.
    #[error("Browser error: {0}")]
    Browser(String),
    /// No element matched the target.
    #[error("Element not found: {0}")]
    ElementNotFound(String),
    /// Navigation did not finish inside its budget.
    #[error("Navigation to {url} timed out after {timeout:?}")]
    NavigationTimeout {
        /// Target URL.
        url: String,
        /// Budget that elapsed.
        timeout: Duration,
    },
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// IO error (sink and evidence files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Missing required field in a provider response.
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    /// LLM provider error.
    #[error("LLM error: {0}")]
    Llm(String),
    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,
    /// Request timed out.
    #[error("Request timed out")]
    Timeout,
    /// Invalid run configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(e)
        }
    }
}

#[cfg(feature = "chrome")]
impl From<chromiumoxide::error::CdpError> for Error {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        Self::Browser(e.to_string())
    }
}

/// Fatal configuration problems detected before any browser work starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required identity field is empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    /// No platform carries any cookies.
    #[error("at least one platform cookie set is required")]
    NoCredentials,
    /// A cookie set is present but malformed.
    #[error("invalid cookies for {platform}: {detail}")]
    InvalidCookies {
        /// Platform key.
        platform: String,
        /// What is wrong.
        detail: String,
    },
    /// No decision service key was supplied.
    #[error("an oracle API key is required")]
    MissingApiKey,
}

/// Why the oracle failed to produce a usable action.
///
/// The agent treats every variant the same way: the loop stops for the
/// current job and the job still proceeds to classification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    /// The response text held no balanced `{...}` object.
    #[error("no JSON object in oracle response")]
    NoJsonObject,
    /// The extracted object was not valid JSON.
    #[error("malformed oracle JSON: {0}")]
    Malformed(String),
    /// The object carried a key outside the schema.
    #[error("unexpected key in oracle response: {0}")]
    UnexpectedKey(String),
    /// A key required for this action was absent.
    #[error("oracle response missing key: {0}")]
    MissingKey(&'static str),
    /// `action` named something other than the four known actions.
    #[error("unknown oracle action: {0}")]
    UnknownAction(String),
    /// A key held the wrong JSON type or an empty string.
    #[error("invalid value for key: {0}")]
    InvalidType(&'static str),
    /// The provider call failed.
    #[error("oracle transport error: {0}")]
    Transport(String),
    /// The provider call exceeded its budget.
    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for jobpilot operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_variants() {
        assert_eq!(
            Error::ElementNotFound("#apply".into()).to_string(),
            "Element not found: #apply"
        );
        assert_eq!(Error::Llm("bad".into()).to_string(), "LLM error: bad");
        assert_eq!(Error::RateLimited.to_string(), "Rate limit exceeded");
        let err = Error::NavigationTimeout {
            url: "https://www.linkedin.com/jobs/view/1".into(),
            timeout: Duration::from_secs(30),
        };
        assert!(err.to_string().contains("timed out after 30s"));
    }

    #[test]
    fn test_config_error_is_transparent() {
        let err: Error = ConfigError::MissingField("email").into();
        assert_eq!(err.to_string(), "missing required field: email");
        assert_eq!(
            ConfigError::NoCredentials.to_string(),
            "at least one platform cookie set is required"
        );
    }

    #[test]
    fn test_decision_error_display() {
        assert_eq!(
            DecisionError::UnknownAction("scroll".into()).to_string(),
            "unknown oracle action: scroll"
        );
        assert_eq!(
            DecisionError::Timeout(Duration::from_secs(60)).to_string(),
            "oracle call timed out after 60s"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().starts_with("JSON error:"));
    }
}
