//! Error types for the Scambus SDK

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the SDK
///
/// The variants mirror how the Scambus API reports failures: client-side
/// misuse surfaces as [`Error::Validation`] or [`Error::Config`], server
/// responses map by status code via [`Error::from_status`], and stream
/// consumption gets its own [`Error::RetentionExpired`] variant so callers
/// can distinguish "your cursor is gone" from a generic server failure.
#[derive(Error, Debug)]
pub enum Error {
    /// 401, or credentials missing/rejected
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// 400 - malformed request or body
    #[error("validation failed: {0}")]
    Validation(String),

    /// 404 - resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// 5xx that was not retried to success
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },

    /// 429 - retryable; carries Retry-After seconds when the server sent it
    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    /// 410/416 during stream consumption - cursor is permanently unusable
    #[error("cursor outside retention window (status {status}); reset to \"0\" or accept data loss")]
    RetentionExpired { status: u16 },

    /// Connection-level HTTP failure (reset, DNS, TLS, timeout inside reqwest)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed SSE event, WebSocket frame, or unexpected JSON shape
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Streaming error (connection state, subscription misuse)
    #[error("streaming error: {0}")]
    Stream(String),

    /// Request timeout
    #[error("request timeout")]
    Timeout,

    /// Other errors
    #[error("error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new authentication error
    pub fn authentication(msg: impl Into<String>) -> Self {
        Error::Authentication(msg.into())
    }

    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    /// Create a new other error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Create a timeout error
    pub fn timeout() -> Self {
        Error::Timeout
    }

    /// Map an HTTP status and response body to the error taxonomy.
    ///
    /// `retention_sensitive` is true for stream-consumption requests, where
    /// 410/416 mean the cursor fell out of the retention window rather than
    /// a generic server-side failure.
    pub fn from_status(
        status: u16,
        body: impl Into<String>,
        retry_after: Option<u64>,
        retention_sensitive: bool,
    ) -> Self {
        let body = body.into();
        match status {
            400 => Error::Validation(body),
            401 => Error::Authentication(body),
            404 => Error::NotFound(body),
            410 | 416 if retention_sensitive => Error::RetentionExpired { status },
            429 => Error::RateLimited { retry_after },
            _ => Error::Server { status, body },
        }
    }

    /// The HTTP status this error originated from, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Authentication(_) => Some(401),
            Error::Validation(_) => Some(400),
            Error::NotFound(_) => Some(404),
            Error::Server { status, .. } => Some(*status),
            Error::RateLimited { .. } => Some(429),
            Error::RetentionExpired { status } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether a retry with backoff has a reasonable chance of succeeding.
    ///
    /// Retention expiry is deliberately non-retryable: the cursor will not
    /// come back, the caller has to reset it.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) => true,
            Error::Timeout => true,
            Error::RateLimited { .. } => true,
            Error::Server { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_authentication() {
        let err = Error::authentication("bad key");
        assert!(matches!(err, Error::Authentication(_)));
        assert_eq!(err.to_string(), "authentication failed: bad key");
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_error_validation() {
        let err = Error::validation("description is required");
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_error_not_found() {
        let err = Error::not_found("case c-123");
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(err.to_string(), "not found: case c-123");
    }

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            Error::from_status(400, "bad", None, false),
            Error::Validation(_)
        ));
        assert!(matches!(
            Error::from_status(401, "nope", None, false),
            Error::Authentication(_)
        ));
        assert!(matches!(
            Error::from_status(404, "gone", None, false),
            Error::NotFound(_)
        ));
        assert!(matches!(
            Error::from_status(429, "slow down", Some(60), false),
            Error::RateLimited {
                retry_after: Some(60)
            }
        ));
        assert!(matches!(
            Error::from_status(500, "boom", None, false),
            Error::Server { status: 500, .. }
        ));
    }

    #[test]
    fn test_from_status_retention_sensitive() {
        // On a stream-consumption request 410/416 are retention expiry...
        assert!(matches!(
            Error::from_status(410, "", None, true),
            Error::RetentionExpired { status: 410 }
        ));
        assert!(matches!(
            Error::from_status(416, "", None, true),
            Error::RetentionExpired { status: 416 }
        ));
        // ...but on a plain REST request they are ordinary server errors.
        assert!(matches!(
            Error::from_status(410, "", None, false),
            Error::Server { status: 410, .. }
        ));
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::timeout().is_retryable());
        assert!(Error::RateLimited { retry_after: None }.is_retryable());
        assert!(Error::Server {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!Error::Server {
            status: 501,
            body: String::new()
        }
        .is_retryable());
        assert!(!Error::RetentionExpired { status: 410 }.is_retryable());
        assert!(!Error::config("missing credentials").is_retryable());
        assert!(!Error::validation("bad body").is_retryable());
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn _returns_result() -> Result<i32> {
            Ok(42)
        }

        fn _returns_error() -> Result<i32> {
            Err(Error::timeout())
        }
    }
}
