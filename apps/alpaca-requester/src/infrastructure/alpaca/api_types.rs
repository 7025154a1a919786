//! Alpaca Data API Wire Types
//!
//! These types map directly to the JSON pages of the multi-symbol stock
//! endpoints:
//!
//! ```json
//! {"bars": {"AAPL": [{"t": "...", "o": 1.0, ...}]}, "next_page_token": "..."}
//! ```
//!
//! Each [`Endpoint`] names its page type and how a page turns into records.

use std::fmt;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::domain::market::{Bar, Trade};

/// One paginated data endpoint.
pub trait Endpoint {
    /// Name used in logs, metrics and errors.
    const NAME: &'static str;

    /// JSON body of one page.
    type Page: DeserializeOwned;

    /// Record produced by the endpoint.
    type Record: Send;

    /// Split a page into its records (server order) and the next cursor.
    ///
    /// An empty cursor means the query is exhausted.
    fn into_parts(page: Self::Page) -> (Vec<Self::Record>, Option<String>);
}

/// `/v2/stocks/bars`.
#[derive(Debug, Clone, Copy)]
pub struct StockBars;

impl Endpoint for StockBars {
    const NAME: &'static str = "stock_bars";
    type Page = BarsPage;
    type Record = Bar;

    fn into_parts(page: BarsPage) -> (Vec<Bar>, Option<String>) {
        let records = page
            .bars
            .into_iter()
            .flat_map(|(symbol, bars)| bars.into_iter().map(move |raw| raw.into_bar(&symbol)))
            .collect();
        (records, normalize_token(page.next_page_token))
    }
}

/// `/v2/stocks/trades`.
#[derive(Debug, Clone, Copy)]
pub struct StockTrades;

impl Endpoint for StockTrades {
    const NAME: &'static str = "stock_trades";
    type Page = TradesPage;
    type Record = Trade;

    fn into_parts(page: TradesPage) -> (Vec<Trade>, Option<String>) {
        let records = page
            .trades
            .into_iter()
            .flat_map(|(symbol, trades)| {
                trades.into_iter().map(move |raw| raw.into_trade(&symbol))
            })
            .collect();
        (records, normalize_token(page.next_page_token))
    }
}

fn normalize_token(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}

// ============================================================================
// Pages
// ============================================================================

/// Page of `/v2/stocks/bars`.
#[derive(Debug, Deserialize)]
pub struct BarsPage {
    /// Bars per symbol, in response order.
    #[serde(default)]
    pub bars: SymbolMap<RawBar>,
    /// Cursor for the next page.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Page of `/v2/stocks/trades`.
#[derive(Debug, Deserialize)]
pub struct TradesPage {
    /// Trades per symbol, in response order.
    #[serde(default)]
    pub trades: SymbolMap<RawTrade>,
    /// Cursor for the next page.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Bar as sent by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBar {
    /// Period start.
    pub t: DateTime<Utc>,
    /// Open.
    #[serde(with = "rust_decimal::serde::float")]
    pub o: Decimal,
    /// High.
    #[serde(with = "rust_decimal::serde::float")]
    pub h: Decimal,
    /// Low.
    #[serde(with = "rust_decimal::serde::float")]
    pub l: Decimal,
    /// Close.
    #[serde(with = "rust_decimal::serde::float")]
    pub c: Decimal,
    /// Volume.
    pub v: u64,
    /// Trade count.
    #[serde(default)]
    pub n: u64,
    /// VWAP.
    #[serde(default, with = "rust_decimal::serde::float")]
    pub vw: Decimal,
}

impl RawBar {
    fn into_bar(self, symbol: &str) -> Bar {
        Bar {
            symbol: symbol.to_string(),
            timestamp: self.t,
            open: self.o,
            high: self.h,
            low: self.l,
            close: self.c,
            volume: self.v,
            trade_count: self.n,
            vwap: self.vw,
        }
    }
}

/// Trade as sent by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTrade {
    /// Execution time.
    pub t: DateTime<Utc>,
    /// Exchange code.
    pub x: String,
    /// Price.
    #[serde(with = "rust_decimal::serde::float")]
    pub p: Decimal,
    /// Size.
    pub s: u64,
    /// Conditions. Absent and `null` both mean none.
    #[serde(default)]
    pub c: Option<Vec<String>>,
    /// Trade ID.
    pub i: u64,
    /// Tape.
    pub z: String,
}

impl RawTrade {
    fn into_trade(self, symbol: &str) -> Trade {
        Trade {
            symbol: symbol.to_string(),
            timestamp: self.t,
            exchange: self.x,
            price: self.p,
            size: self.s,
            conditions: self.c.unwrap_or_default(),
            id: self.i,
            tape: self.z,
        }
    }
}

// ============================================================================
// Ordered symbol map
// ============================================================================

/// `{SYMBOL: [records]}` object kept in response order. `null` is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMap<T>(Vec<(String, Vec<T>)>);

impl<T> Default for SymbolMap<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> IntoIterator for SymbolMap<T> {
    type Item = (String, Vec<T>);
    type IntoIter = std::vec::IntoIter<(String, Vec<T>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for SymbolMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_option(OptionalMapVisitor(PhantomData))
    }
}

struct OptionalMapVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for OptionalMapVisitor<T> {
    type Value = SymbolMap<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object of symbol to records, or null")
    }

    fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(SymbolMap::default())
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(SymbolMap::default())
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((symbol, records)) = access.next_entry::<String, Option<Vec<T>>>()? {
            entries.push((symbol, records.unwrap_or_default()));
        }
        Ok(SymbolMap(entries))
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error body returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaErrorResponse {
    /// Vendor error code.
    #[serde(default)]
    pub code: Option<u64>,
    /// Error message.
    pub message: String,
}
