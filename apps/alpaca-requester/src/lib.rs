#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Alpaca Requester - Rate-Limited Market Data Client
//!
//! Downloads historical market data from Alpaca's data API. One call to
//! [`RateLimitedClient::fetch`] issues as many paginated requests as the
//! query needs, never starts more requests per window than the configured
//! budget allows, and recovers from rate limits and transient failures.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and rules, no I/O
//!   - `request`: Request specs and typed query builders
//!   - `budget`: Rolling-window request budget and the shared gate
//!   - `market`: Bar and trade records
//!   - `result`: Accumulated pages, per-symbol summaries, tables
//!
//! - **Infrastructure**: Adapters and process-wide concerns
//!   - `alpaca`: HTTP client, wire types, retry policy
//!   - `config`: Credentials and settings
//!   - `telemetry`: Logging setup
//!   - `metrics`: Counters and histograms
//!
//! # Request Flow
//!
//! ```text
//! fetch(spec) ──► RateGate ──► GET page ──┬── 2xx ──► parse ──► next cursor? ──► loop / done
//!                    ▲                     ├── 429 ──► block gate until reset ──┐
//!                    │                     ├── 5xx ──► backoff (bounded) ───────┤
//!                    └─────────────────────┴────────────────────────────────────┘
//!                                          └── 4xx ──► RequestRejected
//! ```
//!
//! # Example
//!
//! ```ignore
//! use alpaca_requester::{BarsQuery, RateLimitedClient, TimeFrame};
//!
//! let client = RateLimitedClient::from_env()?;
//! let bars = client
//!     .fetch_bars(&BarsQuery::new(["AAPL", "MSFT"], TimeFrame::DAY))
//!     .await?;
//! for summary in bars.summaries() {
//!     println!("{}: {} bars", summary.symbol, summary.count);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Request, budget and record types with no I/O.
pub mod domain;

/// Client error taxonomy.
pub mod error;

/// Infrastructure layer - HTTP client, configuration, logging, metrics.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::budget::{BudgetSnapshot, RateBudget, RateGate};
pub use domain::market::{Bar, MarketRecord, Tabular, Trade};
pub use domain::request::{
    Adjustment, BarsQuery, DataFeed, RequestSpec, TimeFrame, TimeFrameUnit, TradesQuery,
};
pub use domain::result::{ResultSet, SymbolSummary, Table};

// Errors
pub use error::ClientError;

// Infrastructure
pub use infrastructure::alpaca::{Endpoint, RateLimitedClient, StockBars, StockTrades};
pub use infrastructure::config::{
    ClientConfig, ConfigError, Credentials, RateLimitSettings, RetrySettings,
};
