//! Price-history provider trait and structured error types.
//!
//! The PriceHistoryProvider trait abstracts over data sources (CSV files,
//! Yahoo Finance, synthetic generation) so the engine never sees where
//! bars came from, and tests can swap in fixtures.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{PriceSeries, SeriesError};

/// Structured error types for data operations.
///
/// Every failure is reported as an error; providers never hand back a
/// partial series.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no bars for '{symbol}' between {start} and {end}")]
    EmptyResult {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("missing close price for '{symbol}' on {date}")]
    MissingClose { symbol: String, date: NaiveDate },

    #[error("required column '{0}' not found")]
    MissingColumn(String),

    #[error("parse error at row {row}: {message}")]
    Parse { row: usize, message: String },

    #[error("invalid series: {0}")]
    Series(#[from] SeriesError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data error: {0}")]
    Other(String),
}

/// Where a series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Csv,
    #[serde(alias = "yahoo")]
    YahooFinance,
    Synthetic,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataSource::Csv => "csv",
            DataSource::YahooFinance => "yahoo_finance",
            DataSource::Synthetic => "synthetic",
        };
        f.write_str(name)
    }
}

/// A source of daily price history for one symbol at a time.
pub trait PriceHistoryProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    fn source(&self) -> DataSource;

    /// Fetch daily bars for `symbol` with dates in `[start, end]`.
    ///
    /// An empty range is an error, not an empty series.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<PriceSeries, DataError>;
}

/// Fail with `EmptyResult` when a provider found nothing in range.
pub(crate) fn non_empty(
    series: PriceSeries,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PriceSeries, DataError> {
    if series.is_empty() {
        return Err(DataError::EmptyResult {
            symbol: series.symbol().to_string(),
            start,
            end,
        });
    }
    Ok(series)
}
