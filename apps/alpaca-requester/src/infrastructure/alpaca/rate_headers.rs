//! Server Rate-Limit Headers
//!
//! The data API reports its own view of the quota on every response:
//!
//! - `X-RateLimit-Limit`: requests allowed per window
//! - `X-RateLimit-Remaining`: requests left in the current window
//! - `X-RateLimit-Reset`: Unix time (seconds) at which the window resets
//!
//! 429 responses may also carry `Retry-After` in seconds.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";

/// Rate-limit headers of one response. Absent or unparseable values are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitHeaders {
    /// Requests allowed per window.
    pub limit: Option<u64>,
    /// Requests left in the current window.
    pub remaining: Option<u64>,
    /// Unix time of the next reset.
    pub reset: Option<i64>,
    /// Seconds to wait before retrying.
    pub retry_after: Option<u64>,
}

impl RateLimitHeaders {
    /// Read the headers of a response.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            limit: parse_header(headers, LIMIT_HEADER),
            remaining: parse_header(headers, REMAINING_HEADER),
            reset: parse_header(headers, RESET_HEADER),
            retry_after: parse_header(headers, RETRY_AFTER.as_str()),
        }
    }

    /// Whether the server reports the quota as spent.
    #[must_use]
    pub const fn exhausted(&self) -> bool {
        matches!(self.remaining, Some(0))
    }

    /// Time until the server's reset instant, measured from `now`.
    ///
    /// A reset in the past yields zero.
    #[must_use]
    pub fn reset_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        let reset = DateTime::<Utc>::from_timestamp(self.reset?, 0)?;
        Some((reset - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// How long a spent quota should block new requests.
    ///
    /// `Retry-After` wins over the reset instant. The result is capped at
    /// `max_wait`; `None` means the server gave no usable hint.
    #[must_use]
    pub fn wait_hint(&self, now: DateTime<Utc>, max_wait: Duration) -> Option<Duration> {
        self.retry_after
            .map(Duration::from_secs)
            .or_else(|| self.reset_delay(now))
            .map(|wait| wait.min(max_wait))
    }
}

fn parse_header<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
