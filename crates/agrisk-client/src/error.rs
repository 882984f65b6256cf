//! Error types for the REST client

use agrisk_model::ValidationErrors;
use thiserror::Error;

/// Errors returned by API calls
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Payload rejected before any network call
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// No access token is stored
    #[error("not signed in")]
    Unauthorized,

    /// Refresh failed or the retried request was rejected again; the
    /// session has been cleared
    #[error("session expired, sign in again")]
    SessionExpired,

    /// Non-success status other than an authorization failure
    #[error("server returned {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// Connection, timeout or transport failure
    #[error("network error: {0}")]
    Network(String),

    /// Response body did not match the expected shape
    #[error("could not decode response: {0}")]
    Decode(String),

    /// Token store could not be read or written
    #[error("token storage error: {0}")]
    Storage(String),

    /// Invalid client configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Whether signing in again would help
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::SessionExpired)
    }

    /// Whether resubmitting the same request might succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// HTTP status, when the server answered
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Per-field messages for inline rendering
    #[must_use]
    pub fn validation(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result type alias for API calls
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(ApiError::SessionExpired.is_auth());
        assert!(ApiError::Unauthorized.is_auth());
        assert!(!ApiError::Network("reset".to_string()).is_auth());

        assert!(ApiError::Network("timeout".to_string()).is_retryable());
        assert!(ApiError::Http {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!ApiError::Http {
            status: 404,
            body: String::new()
        }
        .is_retryable());
    }

    #[test]
    fn validation_is_transparent() {
        let mut errors = ValidationErrors::new();
        errors.add("email", "is required");
        let err = ApiError::from(errors);
        assert_eq!(err.to_string(), "validation failed for: email");
        assert_eq!(err.validation().unwrap().field("email"), ["is required"]);
    }
}
