//! Alpaca Market Data Adapter
//!
//! HTTP client, wire types, server rate-limit headers and retry policy for
//! the historical stock data endpoints.

pub mod api_types;
mod client;
pub mod rate_headers;
pub mod retry;

pub use api_types::{Endpoint, StockBars, StockTrades};
pub use client::RateLimitedClient;
