//! Client Metrics
//!
//! Records request outcomes, retries and budget waits through the `metrics`
//! facade. No recorder is installed here; the host application picks one
//! (Prometheus, StatsD, ...). Without a recorder every call is a no-op.
//!
//! # Metrics
//!
//! - `alpaca_requester_requests_total{endpoint,outcome}`
//! - `alpaca_requester_retries_total{endpoint,reason}`
//! - `alpaca_requester_rate_limit_waits_total{endpoint}`
//! - `alpaca_requester_rate_limit_wait_seconds{endpoint}`

use std::sync::Once;
use std::time::Duration;

use metrics::{Unit, counter, describe_counter, describe_histogram, histogram};

static DESCRIBE: Once = Once::new();

/// Register metric descriptions with the installed recorder.
///
/// Safe to call repeatedly; only the first call does anything.
pub fn describe_metrics() {
    DESCRIBE.call_once(|| {
        describe_counter!(
            "alpaca_requester_requests_total",
            "HTTP requests sent to the data API by outcome"
        );
        describe_counter!(
            "alpaca_requester_retries_total",
            "Page requests retried by reason"
        );
        describe_counter!(
            "alpaca_requester_rate_limit_waits_total",
            "Times a request waited for the rate budget"
        );
        describe_histogram!(
            "alpaca_requester_rate_limit_wait_seconds",
            Unit::Seconds,
            "Time spent waiting for the rate budget"
        );
    });
}

/// Outcome of one HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// 2xx with a valid body.
    Success,
    /// HTTP 429.
    RateLimited,
    /// 5xx, 408 or a transport failure.
    Transient,
    /// Any other 4xx.
    Rejected,
    /// 2xx with a body that failed to parse.
    InvalidResponse,
}

impl RequestOutcome {
    /// Metric label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::RateLimited => "rate_limited",
            Self::Transient => "transient",
            Self::Rejected => "rejected",
            Self::InvalidResponse => "invalid_response",
        }
    }
}

/// Why a page request was repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// Server said the quota is spent.
    RateLimited,
    /// Server error or network failure.
    Transient,
}

impl RetryReason {
    /// Metric label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Transient => "transient",
        }
    }
}

/// Record one HTTP request.
pub fn record_request(endpoint: &'static str, outcome: RequestOutcome) {
    counter!(
        "alpaca_requester_requests_total",
        "endpoint" => endpoint,
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record a retried page request.
pub fn record_retry(endpoint: &'static str, reason: RetryReason) {
    counter!(
        "alpaca_requester_retries_total",
        "endpoint" => endpoint,
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record time spent waiting for the rate budget. Zero waits are ignored.
pub fn record_rate_limit_wait(endpoint: &'static str, waited: Duration) {
    if waited.is_zero() {
        return;
    }
    counter!(
        "alpaca_requester_rate_limit_waits_total",
        "endpoint" => endpoint
    )
    .increment(1);
    histogram!(
        "alpaca_requester_rate_limit_wait_seconds",
        "endpoint" => endpoint
    )
    .record(waited.as_secs_f64());
}
