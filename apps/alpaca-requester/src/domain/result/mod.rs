//! Query Results
//!
//! A [`ResultSet`] accumulates the records of every page of one logical
//! query in server order. It can be summarised per symbol or laid out as a
//! [`Table`] for export.

use std::io;

use chrono::{DateTime, Utc};

use crate::domain::market::{MarketRecord, Tabular};

/// Records of all pages of one logical query, in server order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet<R> {
    records: Vec<R>,
    next_page_token: Option<String>,
    pages: u32,
}

impl<R> Default for ResultSet<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> ResultSet<R> {
    /// Empty result.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
            next_page_token: None,
            pages: 0,
        }
    }

    /// Append one page and remember its cursor.
    pub fn push_page(&mut self, records: Vec<R>, next_page_token: Option<String>) {
        self.records.extend(records);
        self.next_page_token = next_page_token;
        self.pages += 1;
    }

    /// Records in server order.
    #[must_use]
    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Take ownership of the records.
    #[must_use]
    pub fn into_records(self) -> Vec<R> {
        self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records were returned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Pages fetched.
    #[must_use]
    pub const fn pages(&self) -> u32 {
        self.pages
    }

    /// Cursor of the last page; `None` once the query is exhausted.
    #[must_use]
    pub fn next_page_token(&self) -> Option<&str> {
        self.next_page_token.as_deref()
    }
}

impl<R: MarketRecord> ResultSet<R> {
    /// Range and count per symbol, in first-seen order.
    #[must_use]
    pub fn summaries(&self) -> Vec<SymbolSummary> {
        let mut summaries: Vec<SymbolSummary> = Vec::new();
        for record in &self.records {
            let ts = record.timestamp();
            match summaries.iter_mut().find(|s| s.symbol == record.symbol()) {
                Some(summary) => {
                    summary.first = summary.first.min(ts);
                    summary.last = summary.last.max(ts);
                    summary.count += 1;
                }
                None => summaries.push(SymbolSummary {
                    symbol: record.symbol().to_string(),
                    first: ts,
                    last: ts,
                    count: 1,
                }),
            }
        }
        summaries
    }
}

impl<R: Tabular> ResultSet<R> {
    /// Lay the records out as rows under the record's columns.
    #[must_use]
    pub fn to_table(&self) -> Table {
        Table {
            columns: R::columns().iter().map(|c| (*c).to_string()).collect(),
            rows: self.records.iter().map(Tabular::cells).collect(),
        }
    }
}

/// Time range and record count for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolSummary {
    /// Ticker symbol.
    pub symbol: String,
    /// Earliest timestamp.
    pub first: DateTime<Utc>,
    /// Latest timestamp.
    pub last: DateTime<Utc>,
    /// Records for the symbol.
    pub count: usize,
}

/// Rows of string cells under named columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows, one per record.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Cells of one column, top to bottom.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(index).map_or("", String::as_str))
                .collect(),
        )
    }

    /// Write the table as CSV with a header row.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.columns)?;
        for row in &self.rows {
            csv_writer.write_record(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}
