//! Client Errors
//!
//! Every failure of a fetch surfaces as one [`ClientError`] kind.
//!
//! | Kind | Retried internally | Cause |
//! |------|--------------------|-------|
//! | `Configuration` | no | Missing or invalid credentials/settings |
//! | `InvalidRequest` | no | Spec rejected before sending |
//! | `RequestRejected` | no | 4xx other than 429 (bad params, auth) |
//! | `TransientFailure` | yes, bounded | 5xx, 408, network errors |
//! | `InvalidResponse` | no | Body does not match the endpoint schema |
//! | `TimedOut` | no | Caller-supplied deadline elapsed |
//!
//! HTTP 429 is not an error kind: the client waits for the next window and
//! retries the same page.

use std::time::Duration;

use thiserror::Error;

use crate::infrastructure::config::ConfigError;

/// Errors returned by [`crate::RateLimitedClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Credentials or settings are missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The request spec cannot be sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The server refused the request; retrying will not help.
    #[error("request rejected with status {status}: {message}")]
    RequestRejected {
        /// HTTP status code.
        status: u16,
        /// Vendor error code, when the body carried one.
        code: Option<u64>,
        /// Vendor error message or raw body.
        message: String,
    },

    /// Transient failures outlasted the retry budget.
    #[error("transient failure after {attempts} attempts: {last_error}")]
    TransientFailure {
        /// Attempts made for the failing page.
        attempts: u32,
        /// Description of the last failure.
        last_error: String,
    },

    /// A successful response did not match the endpoint's schema.
    #[error("invalid response from {endpoint}: {reason}")]
    InvalidResponse {
        /// Endpoint name.
        endpoint: &'static str,
        /// Parse failure.
        reason: String,
    },

    /// The caller's deadline elapsed.
    #[error("fetch timed out after {after:?}")]
    TimedOut {
        /// Deadline that elapsed.
        after: Duration,
    },
}

impl ClientError {
    /// Whether repeating the whole call later could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientFailure { .. } | Self::TimedOut { .. })
    }

    /// Whether the server rejected the credentials.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::RequestRejected {
                status: 401 | 403,
                ..
            }
        )
    }
}
