//! PriceSeries — an ordered, immutable run of bars for one symbol.

use super::bar::PriceBar;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("bar {index} dated {current} does not follow {previous} (dates must be strictly increasing)")]
    NotIncreasing {
        index: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },
}

/// Bars in strictly increasing date order.
///
/// The ordering invariant is checked once at construction; afterwards the
/// series is read-only, so it can be shared across concurrent runs by
/// reference.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        for (i, pair) in bars.windows(2).enumerate() {
            if pair[1].date <= pair[0].date {
                return Err(SeriesError::NotIncreasing {
                    index: i + 1,
                    previous: pair[0].date,
                    current: pair[1].date,
                });
            }
        }
        Ok(Self {
            symbol: symbol.into(),
            bars,
        })
    }

    /// Sort by date before validating. Duplicate dates still fail.
    pub fn from_unsorted(
        symbol: impl Into<String>,
        mut bars: Vec<PriceBar>,
    ) -> Result<Self, SeriesError> {
        bars.sort_by_key(|b| b.date);
        Self::new(symbol, bars)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars.iter().map(|b| b.close)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Bars whose date falls inside `[start, end]`.
    pub fn slice_dates(&self, start: NaiveDate, end: NaiveDate) -> PriceSeries {
        PriceSeries {
            symbol: self.symbol.clone(),
            bars: self
                .bars
                .iter()
                .filter(|b| b.date >= start && b.date <= end)
                .cloned()
                .collect(),
        }
    }
}
