//! Error types for discord-client.
//!
//! Every remote failure is folded into one closed set of kinds so callers
//! can match exhaustively instead of inspecting status codes.

use std::time::Duration;

use thiserror::Error;

/// Retry interval used when a rate-limit response carries no hint.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Errors that can occur when talking to the platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The request exceeded its deadline.
    #[error("request timed out")]
    Timeout,

    /// Authorization denied (401/403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The referenced resource no longer exists (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Explicit rate limit (429) with the server's retry hint.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Server-side or connection failure worth retrying later.
    #[error("transient failure{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Transient {
        status: Option<u16>,
        message: String,
    },

    /// Anything else (bad request, undecodable body, ...).
    #[error("unclassified failure: {0}")]
    Unclassified(String),
}

impl PlatformError {
    /// Classify an HTTP error status.
    pub fn from_status(status: u16, retry_after: Option<Duration>, body: String) -> Self {
        match status {
            401 | 403 => PlatformError::Forbidden(body),
            404 => PlatformError::NotFound(body),
            429 => PlatformError::RateLimited {
                retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER),
            },
            500..=599 => PlatformError::Transient {
                status: Some(status),
                message: body,
            },
            _ => PlatformError::Unclassified(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Whether the same request may succeed if sent again later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlatformError::Timeout
                | PlatformError::RateLimited { .. }
                | PlatformError::Transient { .. }
        )
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PlatformError::Timeout
        } else if e.is_connect() || e.is_request() {
            PlatformError::Transient {
                status: None,
                message: e.to_string(),
            }
        } else if let Some(status) = e.status() {
            PlatformError::from_status(status.as_u16(), None, e.to_string())
        } else {
            PlatformError::Unclassified(e.to_string())
        }
    }
}

impl From<serde_json::Error> for PlatformError {
    fn from(e: serde_json::Error) -> Self {
        PlatformError::Unclassified(format!("JSON error: {}", e))
    }
}
