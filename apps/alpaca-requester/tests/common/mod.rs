//! Shared fixtures for the mock-server tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::time::Duration;

use serde_json::{Value, json};
use wiremock::MockServer;

use alpaca_requester::{
    ClientConfig, Credentials, RateLimitSettings, RateLimitedClient, RetrySettings,
};

/// Key ID sent by test clients.
pub const TEST_KEY: &str = "test-key";
/// Secret sent by test clients.
pub const TEST_SECRET: &str = "test-secret";

/// Config pointed at `base_url` with fast, deterministic retries.
pub fn config(base_url: &str, max_requests: u32, window: Duration, max_retries: u32) -> ClientConfig {
    ClientConfig::new(Credentials::new(TEST_KEY, TEST_SECRET))
        .with_base_url(base_url)
        .with_timeout(Duration::from_secs(5))
        .with_rate_limit(RateLimitSettings {
            max_requests,
            window,
        })
        .with_retry(RetrySettings {
            max_retries,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
            multiplier: 2.0,
            jitter_factor: 0.0,
        })
        .with_max_rate_limit_wait(Duration::from_secs(5))
}

/// Client with a generous budget and three retries.
pub fn client(server: &MockServer) -> RateLimitedClient {
    RateLimitedClient::new(config(&server.uri(), 1_000, Duration::from_secs(60), 3)).unwrap()
}

/// One hourly bar JSON object.
pub fn bar(hour: u32, close: f64) -> Value {
    json!({
        "t": format!("2024-03-01T{hour:02}:00:00Z"),
        "o": close - 0.5,
        "h": close + 1.0,
        "l": close - 1.0,
        "c": close,
        "v": 1_000 + u64::from(hour),
        "n": 10,
        "vw": close
    })
}

/// A bars page for one symbol.
pub fn bars_page(symbol: &str, bars: Vec<Value>, next_page_token: Option<&str>) -> Value {
    json!({
        "bars": { symbol: bars },
        "next_page_token": next_page_token
    })
}

/// Number of requests the server has seen.
pub async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |r| r.len())
}
