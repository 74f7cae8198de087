//! PriceBar — the fundamental market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily bar for a single symbol.
///
/// Only `close` drives the engine. The remaining OHLCV fields are carried
/// through untouched so reporters can render candles next to the trade log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
}

impl PriceBar {
    /// Bar carrying only a closing price.
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            open: None,
            high: None,
            low: None,
            volume: None,
        }
    }

    /// Bar with the full OHLCV set.
    pub fn with_ohlcv(
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            date,
            close,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            volume: Some(volume),
        }
    }

    /// A close that can be traded against: finite and strictly positive.
    pub fn has_tradable_close(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}
