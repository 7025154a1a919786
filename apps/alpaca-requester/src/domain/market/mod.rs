//! Market Data Records
//!
//! Typed records produced by the data endpoints. Every record carries its
//! symbol so that multi-symbol results flatten into one ordered sequence.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;

/// A record that belongs to one symbol at one instant.
pub trait MarketRecord {
    /// Ticker symbol.
    fn symbol(&self) -> &str;

    /// Event or period start time.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// A record that can be laid out as a table row.
pub trait Tabular {
    /// Column names, in cell order.
    fn columns() -> &'static [&'static str];

    /// Cell values, one per column.
    fn cells(&self) -> Vec<String>;
}

/// OHLCV aggregate for one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bar {
    /// Ticker symbol.
    pub symbol: String,
    /// Period start.
    pub timestamp: DateTime<Utc>,
    /// Opening price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Closing price.
    pub close: Decimal,
    /// Shares traded.
    pub volume: u64,
    /// Number of trades.
    pub trade_count: u64,
    /// Volume-weighted average price.
    pub vwap: Decimal,
}

impl MarketRecord for Bar {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Tabular for Bar {
    fn columns() -> &'static [&'static str] {
        &[
            "symbol",
            "timestamp",
            "open",
            "high",
            "low",
            "close",
            "volume",
            "trade_count",
            "vwap",
        ]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.symbol.clone(),
            self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            self.open.to_string(),
            self.high.to_string(),
            self.low.to_string(),
            self.close.to_string(),
            self.volume.to_string(),
            self.trade_count.to_string(),
            self.vwap.to_string(),
        ]
    }
}

/// A single executed trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    /// Ticker symbol.
    pub symbol: String,
    /// Execution time.
    pub timestamp: DateTime<Utc>,
    /// Exchange code.
    pub exchange: String,
    /// Trade price.
    pub price: Decimal,
    /// Trade size.
    pub size: u64,
    /// Condition flags.
    pub conditions: Vec<String>,
    /// Exchange trade ID.
    pub id: u64,
    /// Tape (A, B or C).
    pub tape: String,
}

impl MarketRecord for Trade {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Tabular for Trade {
    fn columns() -> &'static [&'static str] {
        &[
            "symbol",
            "timestamp",
            "exchange",
            "price",
            "size",
            "conditions",
            "id",
            "tape",
        ]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.symbol.clone(),
            self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            self.exchange.clone(),
            self.price.to_string(),
            self.size.to_string(),
            self.conditions.join(" "),
            self.id.to_string(),
            self.tape.clone(),
        ]
    }
}
