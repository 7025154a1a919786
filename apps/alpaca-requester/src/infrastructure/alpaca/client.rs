//! Rate-Limited Paginating Client
//!
//! One [`RateLimitedClient::fetch`] call performs a whole logical query:
//!
//! 1. Take a slot from the shared [`RateGate`], sleeping if the window is full
//! 2. Send the page request
//! 3. On 429, block the gate until the server's reset and repeat the page
//! 4. On 5xx/408/network failure, back off and repeat the page (bounded)
//! 5. On any other 4xx, fail with `RequestRejected`
//! 6. On success, parse the page and continue while a cursor is returned

use std::time::Duration;

use chrono::Utc;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};

use super::api_types::{AlpacaErrorResponse, Endpoint, StockBars, StockTrades};
use super::rate_headers::RateLimitHeaders;
use super::retry::{ErrorCategory, ExponentialBackoff, categorize_status, categorize_transport_error};
use crate::domain::budget::{BudgetSnapshot, RateGate};
use crate::domain::market::{Bar, Trade};
use crate::domain::request::{BarsQuery, RequestSpec, TradesQuery};
use crate::domain::result::ResultSet;
use crate::error::ClientError;
use crate::infrastructure::config::{ClientConfig, ConfigError, Credentials, RetrySettings};
use crate::infrastructure::metrics::{self, RequestOutcome, RetryReason};

const API_KEY_HEADER: &str = "APCA-API-KEY-ID";
const API_SECRET_HEADER: &str = "APCA-API-SECRET-KEY";

/// Paginating client for the Alpaca data API.
///
/// Clones share one request budget.
#[derive(Debug, Clone)]
pub struct RateLimitedClient {
    http: Client,
    base_url: String,
    gate: RateGate,
    retry: RetrySettings,
    max_rate_limit_wait: Duration,
}

impl RateLimitedClient {
    /// Create a client from validated configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        metrics::describe_metrics();

        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(auth_headers(&config.credentials)?)
            .build()
            .map_err(|e| ConfigError::Invalid {
                field: "http_client",
                reason: e.to_string(),
            })?;

        tracing::debug!(
            base_url = %config.base_url,
            max_requests = config.rate_limit.max_requests,
            window_ms = config.rate_limit.window.as_millis(),
            max_retries = config.retry.max_retries,
            "Created rate-limited client"
        );

        Ok(Self {
            http,
            base_url: config.base_url,
            gate: RateGate::new(config.rate_limit.max_requests, config.rate_limit.window),
            retry: config.retry,
            max_rate_limit_wait: config.max_rate_limit_wait,
        })
    }

    /// Create a client from environment variables (and `.env`).
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current usage of the shared request budget.
    #[must_use]
    pub fn budget(&self) -> BudgetSnapshot {
        self.gate.snapshot()
    }

    /// Historical bars for a query, across all pages.
    pub async fn fetch_bars(&self, query: &BarsQuery) -> Result<ResultSet<Bar>, ClientError> {
        self.fetch::<StockBars>(query.to_spec()?).await
    }

    /// Historical trades for a query, across all pages.
    pub async fn fetch_trades(&self, query: &TradesQuery) -> Result<ResultSet<Trade>, ClientError> {
        self.fetch::<StockTrades>(query.to_spec()?).await
    }

    /// [`fetch`](Self::fetch) bounded by a deadline.
    ///
    /// Dropping the query on timeout cancels any budget wait or request in
    /// flight.
    pub async fn fetch_with_timeout<E: Endpoint>(
        &self,
        spec: RequestSpec,
        after: Duration,
    ) -> Result<ResultSet<E::Record>, ClientError> {
        tokio::time::timeout(after, self.fetch::<E>(spec))
            .await
            .map_err(|_| ClientError::TimedOut { after })?
    }

    /// Run one logical query and return the records of every page in
    /// server order.
    pub async fn fetch<E: Endpoint>(
        &self,
        spec: RequestSpec,
    ) -> Result<ResultSet<E::Record>, ClientError> {
        spec.validate()?;

        let url = format!("{}{}", self.base_url, spec.path());
        let mut cursor = spec.page_token().map(ToString::to_string);
        let mut result = ResultSet::new();

        loop {
            let page = self.fetch_page::<E>(&url, &spec, cursor.as_deref()).await?;
            let (records, next) = E::into_parts(page);

            tracing::debug!(
                endpoint = E::NAME,
                page = result.pages() + 1,
                records = records.len(),
                has_next = next.is_some(),
                "Fetched page"
            );

            result.push_page(records, next.clone());
            match next {
                Some(token) => cursor = Some(token),
                None => break,
            }
        }

        tracing::info!(
            endpoint = E::NAME,
            pages = result.pages(),
            records = result.len(),
            "Fetch complete"
        );

        Ok(result)
    }

    /// Fetch one page, absorbing rate limits and retrying transient failures.
    async fn fetch_page<E: Endpoint>(
        &self,
        url: &str,
        spec: &RequestSpec,
        cursor: Option<&str>,
    ) -> Result<E::Page, ClientError> {
        let mut backoff = ExponentialBackoff::new(&self.retry);

        loop {
            let waited = self.gate.acquire().await;
            metrics::record_rate_limit_wait(E::NAME, waited);

            let response = match self.http.get(url).query(&spec.query(cursor)).send().await {
                Ok(response) => response,
                Err(e) => {
                    let category = categorize_transport_error(&e);
                    tracing::debug!(
                        endpoint = E::NAME,
                        category = category.as_str(),
                        error = %e,
                        "Request failed before a response"
                    );
                    if category == ErrorCategory::NonRetryable {
                        return Err(ClientError::InvalidRequest(e.to_string()));
                    }
                    metrics::record_request(E::NAME, RequestOutcome::Transient);
                    self.backoff_or_fail(E::NAME, &mut backoff, e.to_string())
                        .await?;
                    continue;
                }
            };

            let status = response.status();
            let rate = RateLimitHeaders::from_headers(response.headers());
            tracing::debug!(
                endpoint = E::NAME,
                status = status.as_u16(),
                limit = ?rate.limit,
                remaining = ?rate.remaining,
                reset = ?rate.reset,
                "Response received"
            );

            if status.is_success() {
                if rate.exhausted() {
                    self.block_on_server_quota(&rate, false);
                }

                let body = match response.bytes().await {
                    Ok(body) => body,
                    Err(e) => {
                        metrics::record_request(E::NAME, RequestOutcome::Transient);
                        self.backoff_or_fail(E::NAME, &mut backoff, e.to_string())
                            .await?;
                        continue;
                    }
                };

                return match serde_json::from_slice::<E::Page>(&body) {
                    Ok(page) => {
                        metrics::record_request(E::NAME, RequestOutcome::Success);
                        Ok(page)
                    }
                    Err(e) => {
                        metrics::record_request(E::NAME, RequestOutcome::InvalidResponse);
                        tracing::error!(endpoint = E::NAME, error = %e, "Malformed page");
                        Err(ClientError::InvalidResponse {
                            endpoint: E::NAME,
                            reason: e.to_string(),
                        })
                    }
                };
            }

            let category = categorize_status(status);
            let body = error_body(E::NAME, status, response.text().await);
            tracing::debug!(
                endpoint = E::NAME,
                status = status.as_u16(),
                category = category.as_str(),
                "Request failed"
            );

            match category {
                ErrorCategory::RateLimited => {
                    metrics::record_request(E::NAME, RequestOutcome::RateLimited);
                    metrics::record_retry(E::NAME, RetryReason::RateLimited);
                    tracing::warn!(
                        endpoint = E::NAME,
                        retry_after = ?rate.retry_after,
                        reset = ?rate.reset,
                        "Rate limited, waiting for next window"
                    );
                    self.block_on_server_quota(&rate, true);
                }
                ErrorCategory::Retryable => {
                    metrics::record_request(E::NAME, RequestOutcome::Transient);
                    self.backoff_or_fail(E::NAME, &mut backoff, describe_failure(status, &body))
                        .await?;
                }
                ErrorCategory::NonRetryable => {
                    metrics::record_request(E::NAME, RequestOutcome::Rejected);
                    return Err(rejection(status, body));
                }
            }
        }
    }

    /// Sleep before the next transient retry, or fail once retries are spent.
    async fn backoff_or_fail(
        &self,
        endpoint: &'static str,
        backoff: &mut ExponentialBackoff,
        last_error: String,
    ) -> Result<(), ClientError> {
        let Some(delay) = backoff.next_backoff() else {
            tracing::error!(
                endpoint,
                attempts = backoff.attempts(),
                error = %last_error,
                "Retries exhausted"
            );
            return Err(ClientError::TransientFailure {
                attempts: backoff.attempts(),
                last_error,
            });
        };

        tracing::warn!(
            endpoint,
            attempt = backoff.retries(),
            delay_ms = delay.as_millis(),
            error = %last_error,
            "Transient failure, retrying"
        );
        metrics::record_retry(endpoint, RetryReason::Transient);
        tokio::time::sleep(delay).await;
        Ok(())
    }

    /// Stop granting requests until the server's quota resets.
    ///
    /// Without a usable hint a 429 blocks until the local window has passed;
    /// an exhausted-but-successful response without one blocks nothing.
    fn block_on_server_quota(&self, rate: &RateLimitHeaders, rate_limited: bool) {
        match rate.wait_hint(Utc::now(), self.max_rate_limit_wait) {
            Some(wait) if !wait.is_zero() => {
                tracing::debug!(wait_ms = wait.as_millis(), "Blocking budget until server reset");
                self.gate.block_for(wait);
            }
            _ if rate_limited => self.gate.block_for_window(),
            _ => {}
        }
    }
}

fn auth_headers(credentials: &Credentials) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        HeaderName::from_static("apca-api-key-id"),
        sensitive_value(API_KEY_HEADER, credentials.api_key())?,
    );
    headers.insert(
        HeaderName::from_static("apca-api-secret-key"),
        sensitive_value(API_SECRET_HEADER, credentials.api_secret())?,
    );
    Ok(headers)
}

fn sensitive_value(header: &'static str, value: &str) -> Result<HeaderValue, ConfigError> {
    let mut value = HeaderValue::from_str(value).map_err(|_| ConfigError::Invalid {
        field: header,
        reason: "contains characters not allowed in an HTTP header".to_string(),
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Body of a failed response; an unreadable body is logged and treated as empty.
fn error_body<E: std::fmt::Display>(
    endpoint: &'static str,
    status: StatusCode,
    body: Result<String, E>,
) -> String {
    body.unwrap_or_else(|e| {
        tracing::warn!(
            endpoint,
            status = status.as_u16(),
            error = %e,
            "Failed to read error response body"
        );
        String::new()
    })
}

fn describe_failure(status: StatusCode, body: &str) -> String {
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {body}")
    }
}

fn rejection(status: StatusCode, body: String) -> ClientError {
    let (code, message) = match serde_json::from_str::<AlpacaErrorResponse>(&body) {
        Ok(err) => (err.code, err.message),
        Err(_) => (None, body),
    };

    tracing::error!(
        status = status.as_u16(),
        code = ?code,
        message = %message,
        "Request rejected"
    );

    ClientError::RequestRejected {
        status: status.as_u16(),
        code,
        message,
    }
}
