//! Request Descriptions
//!
//! A [`RequestSpec`] is the endpoint-agnostic description of one logical
//! query: path, filter parameters and an optional starting cursor. The typed
//! builders ([`BarsQuery`], [`TradesQuery`]) render a spec for the stock data
//! endpoints and apply the vendor defaults.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::error::ClientError;

/// Query parameter carrying the pagination cursor.
pub const PAGE_TOKEN_PARAM: &str = "page_token";

/// Largest page the data API serves; used when no limit is given.
pub const DEFAULT_PAGE_LIMIT: u32 = 10_000;

/// Path of the multi-symbol historical bars endpoint.
pub const STOCK_BARS_PATH: &str = "/v2/stocks/bars";

/// Path of the multi-symbol historical trades endpoint.
pub const STOCK_TRADES_PATH: &str = "/v2/stocks/trades";

/// Endpoint path, filter parameters and starting cursor of one logical query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    path: String,
    params: Vec<(String, String)>,
    page_token: Option<String>,
}

impl RequestSpec {
    /// Create a spec for the given endpoint path (e.g. `/v2/stocks/bars`).
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
            page_token: None,
        }
    }

    /// Set a query parameter, replacing any earlier value for the same key.
    ///
    /// A `page_token` parameter is stored as the starting cursor instead.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();

        if key == PAGE_TOKEN_PARAM {
            self.page_token = Some(value);
            return self;
        }

        if let Some(existing) = self.params.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value;
        } else {
            self.params.push((key, value));
        }
        self
    }

    /// Resume from a cursor returned by an earlier response.
    #[must_use]
    pub fn with_page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }

    /// Endpoint path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Filter parameters in insertion order.
    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Value of a filter parameter.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Starting cursor, if any.
    #[must_use]
    pub fn page_token(&self) -> Option<&str> {
        self.page_token.as_deref()
    }

    /// Query pairs for one page request, with `cursor` appended when present.
    #[must_use]
    pub fn query<'a>(&'a self, cursor: Option<&'a str>) -> Vec<(&'a str, &'a str)> {
        let mut pairs: Vec<(&'a str, &'a str)> = self
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if let Some(token) = cursor {
            pairs.push((PAGE_TOKEN_PARAM, token));
        }
        pairs
    }

    /// Reject specs that cannot be sent.
    pub fn validate(&self) -> Result<(), ClientError> {
        if !self.path.starts_with('/') {
            return Err(ClientError::InvalidRequest(format!(
                "endpoint path must start with '/': {:?}",
                self.path
            )));
        }
        if self.params.iter().any(|(k, _)| k.is_empty()) {
            return Err(ClientError::InvalidRequest(
                "query parameter names cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Parameter Vocabulary
// =============================================================================

/// Unit of a bar aggregation period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFrameUnit {
    /// Minute bars (1-59).
    Minute,
    /// Hour bars (1-23).
    Hour,
    /// Daily bars (1 only).
    Day,
    /// Weekly bars (1 only).
    Week,
    /// Monthly bars (1, 2, 3, 4, 6 or 12).
    Month,
}

impl TimeFrameUnit {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Minute => "Min",
            Self::Hour => "Hour",
            Self::Day => "Day",
            Self::Week => "Week",
            Self::Month => "Month",
        }
    }
}

/// Bar aggregation period, rendered as `{amount}{unit}` (e.g. `5Min`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFrame {
    amount: u32,
    unit: TimeFrameUnit,
}

impl TimeFrame {
    /// Create a timeframe, checking the amount is one the API accepts.
    pub fn new(amount: u32, unit: TimeFrameUnit) -> Result<Self, ClientError> {
        let valid = match unit {
            TimeFrameUnit::Minute => (1..=59).contains(&amount),
            TimeFrameUnit::Hour => (1..=23).contains(&amount),
            TimeFrameUnit::Day | TimeFrameUnit::Week => amount == 1,
            TimeFrameUnit::Month => matches!(amount, 1 | 2 | 3 | 4 | 6 | 12),
        };
        if !valid {
            return Err(ClientError::InvalidRequest(format!(
                "unsupported timeframe {amount}{}",
                unit.suffix()
            )));
        }
        Ok(Self { amount, unit })
    }

    /// One-minute bars.
    pub const MINUTE: Self = Self {
        amount: 1,
        unit: TimeFrameUnit::Minute,
    };

    /// One-hour bars.
    pub const HOUR: Self = Self {
        amount: 1,
        unit: TimeFrameUnit::Hour,
    };

    /// Daily bars.
    pub const DAY: Self = Self {
        amount: 1,
        unit: TimeFrameUnit::Day,
    };

    /// Weekly bars.
    pub const WEEK: Self = Self {
        amount: 1,
        unit: TimeFrameUnit::Week,
    };

    /// Number of units per bar.
    #[must_use]
    pub const fn amount(&self) -> u32 {
        self.amount
    }

    /// Unit of the period.
    #[must_use]
    pub const fn unit(&self) -> TimeFrameUnit {
        self.unit
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

impl FromStr for TimeFrame {
    type Err = ClientError;

    /// Accepts the long form (`5Min`, `1Hour`) and the short aliases the
    /// API also understands (`5T`, `1H`, `1D`, `1W`, `1M`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, suffix) = trimmed.split_at(split);

        let amount: u32 = digits
            .parse()
            .map_err(|_| ClientError::InvalidRequest(format!("invalid timeframe: {s:?}")))?;

        let unit = match suffix.to_ascii_lowercase().as_str() {
            "min" | "t" => TimeFrameUnit::Minute,
            "hour" | "h" => TimeFrameUnit::Hour,
            "day" | "d" => TimeFrameUnit::Day,
            "week" | "w" => TimeFrameUnit::Week,
            "month" | "m" => TimeFrameUnit::Month,
            _ => {
                return Err(ClientError::InvalidRequest(format!(
                    "invalid timeframe unit: {s:?}"
                )));
            }
        };

        Self::new(amount, unit)
    }
}

/// Corporate action adjustment applied to bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Adjustment {
    /// No adjustment.
    #[default]
    Raw,
    /// Split adjusted.
    Split,
    /// Dividend adjusted.
    Dividend,
    /// Split and dividend adjusted.
    All,
}

impl Adjustment {
    /// Wire value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Split => "split",
            Self::Dividend => "dividend",
            Self::All => "all",
        }
    }
}

/// Market data feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataFeed {
    /// SIP (all US exchanges).
    #[default]
    Sip,
    /// IEX only (free tier).
    Iex,
    /// Over-the-counter.
    Otc,
}

impl DataFeed {
    /// Wire value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sip => "sip",
            Self::Iex => "iex",
            Self::Otc => "otc",
        }
    }
}

impl FromStr for DataFeed {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sip" => Ok(Self::Sip),
            "iex" => Ok(Self::Iex),
            "otc" => Ok(Self::Otc),
            _ => Err(ClientError::InvalidRequest(format!("unknown data feed: {s:?}"))),
        }
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn join_symbols(symbols: &[String]) -> Result<String, ClientError> {
    if symbols.is_empty() {
        return Err(ClientError::InvalidRequest(
            "at least one symbol is required".to_string(),
        ));
    }
    if let Some(blank) = symbols.iter().find(|s| s.trim().is_empty()) {
        return Err(ClientError::InvalidRequest(format!(
            "blank symbol in request: {blank:?}"
        )));
    }
    Ok(symbols
        .iter()
        .map(|s| s.trim().to_uppercase())
        .collect::<Vec<_>>()
        .join(","))
}

/// Copy caller-supplied extra parameters, dropping `sort`: pages are
/// assembled in ascending order and a descending sort would interleave them.
fn apply_extra(mut spec: RequestSpec, extra: &[(String, String)]) -> RequestSpec {
    for (key, value) in extra {
        if key == "sort" {
            tracing::warn!(value = %value, "Ignoring sort parameter, results are always ascending");
            continue;
        }
        spec = spec.param(key.clone(), value.clone());
    }
    spec
}

// =============================================================================
// Stock Bars
// =============================================================================

/// Query for `/v2/stocks/bars`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarsQuery {
    symbols: Vec<String>,
    timeframe: TimeFrame,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    limit: Option<u32>,
    adjustment: Option<Adjustment>,
    asof: Option<NaiveDate>,
    feed: Option<DataFeed>,
    currency: Option<String>,
    page_token: Option<String>,
    extra: Vec<(String, String)>,
}

impl BarsQuery {
    /// Bars for `symbols` aggregated by `timeframe`.
    #[must_use]
    pub fn new<I, S>(symbols: I, timeframe: TimeFrame) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
            timeframe,
            start: None,
            end: None,
            limit: None,
            adjustment: None,
            asof: None,
            feed: None,
            currency: None,
            page_token: None,
            extra: Vec::new(),
        }
    }

    /// Inclusive start of the range.
    #[must_use]
    pub const fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Inclusive end of the range.
    #[must_use]
    pub const fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Records per page, clamped to `1..=10_000`.
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit.clamp(1, DEFAULT_PAGE_LIMIT));
        self
    }

    /// Corporate action adjustment.
    #[must_use]
    pub const fn with_adjustment(mut self, adjustment: Adjustment) -> Self {
        self.adjustment = Some(adjustment);
        self
    }

    /// Resolve symbol renames as of this date.
    #[must_use]
    pub const fn with_asof(mut self, asof: NaiveDate) -> Self {
        self.asof = Some(asof);
        self
    }

    /// Source feed.
    #[must_use]
    pub const fn with_feed(mut self, feed: DataFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Price currency (ISO 4217).
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    /// Resume a previous download from its last cursor.
    #[must_use]
    pub fn with_page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }

    /// Pass a parameter the typed builder does not model.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    /// Render the request spec.
    pub fn to_spec(&self) -> Result<RequestSpec, ClientError> {
        let mut spec = RequestSpec::new(STOCK_BARS_PATH)
            .param("symbols", join_symbols(&self.symbols)?)
            .param("timeframe", self.timeframe.to_string());

        if let Some(start) = &self.start {
            spec = spec.param("start", format_timestamp(start));
        }
        if let Some(end) = &self.end {
            spec = spec.param("end", format_timestamp(end));
        }
        spec = spec.param(
            "limit",
            self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).to_string(),
        );
        if let Some(adjustment) = self.adjustment {
            spec = spec.param("adjustment", adjustment.as_str());
        }
        if let Some(asof) = self.asof {
            spec = spec.param("asof", asof.format("%Y-%m-%d").to_string());
        }
        if let Some(feed) = self.feed {
            spec = spec.param("feed", feed.as_str());
        }
        if let Some(currency) = &self.currency {
            spec = spec.param("currency", currency.clone());
        }
        if let Some(token) = &self.page_token {
            spec = spec.with_page_token(token.clone());
        }

        Ok(apply_extra(spec, &self.extra))
    }
}

// =============================================================================
// Stock Trades
// =============================================================================

/// Query for `/v2/stocks/trades`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradesQuery {
    symbols: Vec<String>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    limit: Option<u32>,
    asof: Option<NaiveDate>,
    feed: Option<DataFeed>,
    currency: Option<String>,
    page_token: Option<String>,
    extra: Vec<(String, String)>,
}

impl TradesQuery {
    /// Trades for `symbols`.
    #[must_use]
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
            start: None,
            end: None,
            limit: None,
            asof: None,
            feed: None,
            currency: None,
            page_token: None,
            extra: Vec::new(),
        }
    }

    /// Inclusive start of the range.
    #[must_use]
    pub const fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Inclusive end of the range.
    #[must_use]
    pub const fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Records per page, clamped to `1..=10_000`.
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit.clamp(1, DEFAULT_PAGE_LIMIT));
        self
    }

    /// Resolve symbol renames as of this date.
    #[must_use]
    pub const fn with_asof(mut self, asof: NaiveDate) -> Self {
        self.asof = Some(asof);
        self
    }

    /// Source feed.
    #[must_use]
    pub const fn with_feed(mut self, feed: DataFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Price currency (ISO 4217).
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    /// Resume a previous download from its last cursor.
    #[must_use]
    pub fn with_page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }

    /// Pass a parameter the typed builder does not model.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    /// Render the request spec.
    pub fn to_spec(&self) -> Result<RequestSpec, ClientError> {
        let mut spec =
            RequestSpec::new(STOCK_TRADES_PATH).param("symbols", join_symbols(&self.symbols)?);

        if let Some(start) = &self.start {
            spec = spec.param("start", format_timestamp(start));
        }
        if let Some(end) = &self.end {
            spec = spec.param("end", format_timestamp(end));
        }
        spec = spec.param(
            "limit",
            self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).to_string(),
        );
        if let Some(asof) = self.asof {
            spec = spec.param("asof", asof.format("%Y-%m-%d").to_string());
        }
        if let Some(feed) = self.feed {
            spec = spec.param("feed", feed.as_str());
        }
        if let Some(currency) = &self.currency {
            spec = spec.param("currency", currency.clone());
        }
        if let Some(token) = &self.page_token {
            spec = spec.with_page_token(token.clone());
        }

        Ok(apply_extra(spec, &self.extra))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use test_case::test_case;

    use super::*;

    #[test]
    fn param_replaces_existing_key() {
        let spec = RequestSpec::new("/v2/stocks/bars")
            .param("limit", "10")
            .param("limit", "20");
        assert_eq!(spec.params().len(), 1);
        assert_eq!(spec.get("limit"), Some("20"));
    }

    #[test]
    fn page_token_param_becomes_cursor() {
        let spec = RequestSpec::new("/v2/stocks/bars").param("page_token", "abc");
        assert!(spec.params().is_empty());
        assert_eq!(spec.page_token(), Some("abc"));
    }

    #[test]
    fn query_appends_cursor() {
        let spec = RequestSpec::new("/v2/stocks/bars").param("symbols", "AAPL");
        assert_eq!(spec.query(None), vec![("symbols", "AAPL")]);
        assert_eq!(
            spec.query(Some("next")),
            vec![("symbols", "AAPL"), ("page_token", "next")]
        );
    }

    #[test]
    fn query_borrows_cursor_from_caller() {
        let spec = RequestSpec::new("/v2/stocks/bars").param("symbols", "AAPL");
        let next = String::from("cursor-from-last-page");
        let pairs = spec.query(Some(next.as_str()));
        assert_eq!(pairs.last(), Some(&("page_token", "cursor-from-last-page")));
    }

    #[test]
    fn validate_rejects_relative_path() {
        let spec = RequestSpec::new("v2/stocks/bars");
        assert!(matches!(
            spec.validate(),
            Err(ClientError::InvalidRequest(_))
        ));
    }

    #[test_case("5Min", 5, TimeFrameUnit::Minute ; "long minutes")]
    #[test_case("5T", 5, TimeFrameUnit::Minute ; "short minutes")]
    #[test_case("1Hour", 1, TimeFrameUnit::Hour ; "long hour")]
    #[test_case("1D", 1, TimeFrameUnit::Day ; "short day")]
    #[test_case("1Week", 1, TimeFrameUnit::Week ; "long week")]
    #[test_case("3M", 3, TimeFrameUnit::Month ; "short month")]
    fn timeframe_parsing(input: &str, amount: u32, unit: TimeFrameUnit) {
        let tf: TimeFrame = input.parse().unwrap();
        assert_eq!(tf.amount(), amount);
        assert_eq!(tf.unit(), unit);
    }

    #[test_case("60Min" ; "minute overflow")]
    #[test_case("2Day" ; "multi day")]
    #[test_case("5Month" ; "odd month")]
    #[test_case("Min" ; "missing amount")]
    #[test_case("5Fortnight" ; "unknown unit")]
    fn timeframe_rejects(input: &str) {
        assert!(input.parse::<TimeFrame>().is_err());
    }

    #[test]
    fn timeframe_display() {
        assert_eq!(TimeFrame::new(15, TimeFrameUnit::Minute).unwrap().to_string(), "15Min");
        assert_eq!(TimeFrame::DAY.to_string(), "1Day");
    }

    #[test_case("IEX", DataFeed::Iex ; "upper iex")]
    #[test_case("otc", DataFeed::Otc ; "lower otc")]
    #[test_case(" sip ", DataFeed::Sip ; "padded sip")]
    fn data_feed_parsing(input: &str, expected: DataFeed) {
        assert_eq!(input.parse::<DataFeed>().unwrap(), expected);
    }

    #[test]
    fn unknown_data_feed_is_rejected() {
        assert!(matches!(
            "boats".parse::<DataFeed>(),
            Err(ClientError::InvalidRequest(_))
        ));
    }

    #[test]
    fn bars_query_defaults_limit_and_joins_symbols() {
        let spec = BarsQuery::new(["aapl", "TSLA"], TimeFrame::MINUTE)
            .to_spec()
            .unwrap();
        assert_eq!(spec.path(), STOCK_BARS_PATH);
        assert_eq!(spec.get("symbols"), Some("AAPL,TSLA"));
        assert_eq!(spec.get("timeframe"), Some("1Min"));
        assert_eq!(spec.get("limit"), Some("10000"));
        assert_eq!(spec.page_token(), None);
    }

    #[test]
    fn bars_query_renders_filters() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let spec = BarsQuery::new(["AAPL"], TimeFrame::DAY)
            .with_start(start)
            .with_end(end)
            .with_limit(500)
            .with_adjustment(Adjustment::All)
            .with_asof(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .with_feed(DataFeed::Iex)
            .with_currency("USD")
            .with_page_token("resume-here")
            .to_spec()
            .unwrap();

        assert_eq!(spec.get("start"), Some("2024-01-01T00:00:00Z"));
        assert_eq!(spec.get("end"), Some("2025-01-01T00:00:00Z"));
        assert_eq!(spec.get("limit"), Some("500"));
        assert_eq!(spec.get("adjustment"), Some("all"));
        assert_eq!(spec.get("asof"), Some("2025-01-01"));
        assert_eq!(spec.get("feed"), Some("iex"));
        assert_eq!(spec.get("currency"), Some("USD"));
        assert_eq!(spec.page_token(), Some("resume-here"));
    }

    #[test]
    fn bars_query_clamps_limit() {
        let spec = BarsQuery::new(["AAPL"], TimeFrame::DAY)
            .with_limit(50_000)
            .to_spec()
            .unwrap();
        assert_eq!(spec.get("limit"), Some("10000"));
    }

    #[test]
    fn bars_query_drops_sort() {
        let spec = BarsQuery::new(["AAPL"], TimeFrame::DAY)
            .with_param("sort", "desc")
            .with_param("limit", "25")
            .to_spec()
            .unwrap();
        assert_eq!(spec.get("sort"), None);
        assert_eq!(spec.get("limit"), Some("25"));
    }

    #[test]
    fn bars_query_requires_symbols() {
        let empty: Vec<String> = Vec::new();
        assert!(BarsQuery::new(empty, TimeFrame::DAY).to_spec().is_err());
        assert!(BarsQuery::new(["AAPL", " "], TimeFrame::DAY).to_spec().is_err());
    }

    #[test]
    fn trades_query_renders() {
        let spec = TradesQuery::new(["msft"])
            .with_feed(DataFeed::Sip)
            .with_param("page_token", "tok")
            .to_spec()
            .unwrap();
        assert_eq!(spec.path(), STOCK_TRADES_PATH);
        assert_eq!(spec.get("symbols"), Some("MSFT"));
        assert_eq!(spec.get("limit"), Some("10000"));
        assert_eq!(spec.get("feed"), Some("sip"));
        assert_eq!(spec.page_token(), Some("tok"));
    }
}
