//! Retry Classification and Backoff
//!
//! Every failed attempt falls into one [`ErrorCategory`]. Transient failures
//! are retried after an [`ExponentialBackoff`] delay with jitter; rate-limit
//! responses are handed to the request budget instead.

use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;

use crate::infrastructure::config::RetrySettings;

/// How a failed attempt is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Quota spent: wait for the window, then retry without limit.
    RateLimited,
    /// Transient: retry with backoff, a bounded number of times.
    Retryable,
    /// Permanent: fail immediately.
    NonRetryable,
}

impl ErrorCategory {
    /// Label used in log fields.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Retryable => "retryable",
            Self::NonRetryable => "non_retryable",
        }
    }
}

/// Categorize an HTTP status for retry handling.
#[must_use]
pub const fn categorize_status(status: StatusCode) -> ErrorCategory {
    match status.as_u16() {
        429 => ErrorCategory::RateLimited,
        408 | 500..=599 => ErrorCategory::Retryable,
        _ => ErrorCategory::NonRetryable,
    }
}

/// Categorize a transport-level failure.
///
/// Connection failures, timeouts and broken bodies are transient. Errors
/// raised while building the request are not.
#[must_use]
pub fn categorize_transport_error(error: &reqwest::Error) -> ErrorCategory {
    if error.is_builder() || error.is_redirect() {
        ErrorCategory::NonRetryable
    } else {
        ErrorCategory::Retryable
    }
}

/// Exponential backoff with jitter, bounded by a retry count.
#[derive(Debug)]
pub struct ExponentialBackoff {
    retries: u32,
    max_retries: u32,
    current: Duration,
    max_backoff: Duration,
    multiplier: f64,
    jitter_factor: f64,
}

impl ExponentialBackoff {
    /// Fresh backoff state for one page.
    #[must_use]
    pub const fn new(settings: &RetrySettings) -> Self {
        Self {
            retries: 0,
            max_retries: settings.max_retries,
            current: settings.initial_backoff,
            max_backoff: settings.max_backoff,
            multiplier: settings.multiplier,
            jitter_factor: settings.jitter_factor,
        }
    }

    /// Delay before the next retry, or `None` once the retries are spent.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.retries >= self.max_retries {
            return None;
        }
        self.retries += 1;

        let base = self.current.min(self.max_backoff);
        self.current = Duration::from_secs_f64(
            (self.current.as_secs_f64() * self.multiplier).min(self.max_backoff.as_secs_f64()),
        );

        Some(self.apply_jitter(base).min(self.max_backoff))
    }

    /// Retries handed out so far.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    /// Attempts made so far, counting the first.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.retries + 1
    }

    /// Random delay in `[base * (1 - jitter), base * (1 + jitter)]`.
    fn apply_jitter(&self, base: Duration) -> Duration {
        if self.jitter_factor <= 0.0 || base.is_zero() {
            return base;
        }
        let base_secs = base.as_secs_f64();
        let range = base_secs * self.jitter_factor;
        let min = (base_secs - range).max(0.0);
        let max = base_secs + range;
        Duration::from_secs_f64(rand::rng().random_range(min..=max))
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn settings(max_retries: u32, jitter_factor: f64) -> RetrySettings {
        RetrySettings {
            max_retries,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
            multiplier: 2.0,
            jitter_factor,
        }
    }

    #[test_case(429, ErrorCategory::RateLimited ; "too many requests")]
    #[test_case(408, ErrorCategory::Retryable ; "request timeout")]
    #[test_case(500, ErrorCategory::Retryable ; "internal server error")]
    #[test_case(502, ErrorCategory::Retryable ; "bad gateway")]
    #[test_case(503, ErrorCategory::Retryable ; "service unavailable")]
    #[test_case(524, ErrorCategory::Retryable ; "cloudflare timeout")]
    #[test_case(400, ErrorCategory::NonRetryable ; "bad request")]
    #[test_case(401, ErrorCategory::NonRetryable ; "unauthorized")]
    #[test_case(403, ErrorCategory::NonRetryable ; "forbidden")]
    #[test_case(404, ErrorCategory::NonRetryable ; "not found")]
    #[test_case(422, ErrorCategory::NonRetryable ; "unprocessable")]
    fn status_categories(code: u16, expected: ErrorCategory) {
        let status = StatusCode::from_u16(code).unwrap();
        assert_eq!(categorize_status(status), expected);
    }

    #[test]
    fn backoff_doubles_without_jitter() {
        let mut backoff = ExponentialBackoff::new(&settings(5, 0.0));

        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(400)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(800)));
        assert_eq!(backoff.retries(), 4);
        assert_eq!(backoff.attempts(), 5);
    }

    #[test]
    fn backoff_is_capped() {
        let mut backoff = ExponentialBackoff::new(&settings(10, 0.0));
        let delays: Vec<_> = std::iter::from_fn(|| backoff.next_backoff()).collect();

        assert_eq!(delays.len(), 10);
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(1)));
        assert_eq!(delays[9], Duration::from_secs(1));
    }

    #[test]
    fn backoff_stops_after_max_retries() {
        let mut backoff = ExponentialBackoff::new(&settings(2, 0.0));
        assert!(backoff.next_backoff().is_some());
        assert!(backoff.next_backoff().is_some());
        assert!(backoff.next_backoff().is_none());
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn zero_retries_never_waits() {
        let mut backoff = ExponentialBackoff::new(&settings(0, 0.2));
        assert!(backoff.next_backoff().is_none());
        assert_eq!(backoff.attempts(), 1);
    }

    #[test]
    fn jitter_stays_within_range() {
        for _ in 0..100 {
            let mut backoff = ExponentialBackoff::new(&settings(1, 0.2));
            let delay = backoff.next_backoff().unwrap();
            assert!(delay >= Duration::from_millis(79), "{delay:?}");
            assert!(delay <= Duration::from_millis(121), "{delay:?}");
        }
    }

    #[test]
    fn category_labels() {
        assert_eq!(ErrorCategory::RateLimited.as_str(), "rate_limited");
        assert_eq!(ErrorCategory::Retryable.as_str(), "retryable");
        assert_eq!(ErrorCategory::NonRetryable.as_str(), "non_retryable");
    }
}
