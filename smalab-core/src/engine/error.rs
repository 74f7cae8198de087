//! Engine error types.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::SeriesError;

/// Errors that stop a run. A failed run produces no output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("{name} must be a positive integer, got {value}")]
    InvalidWindow { name: &'static str, value: usize },

    #[error("initial capital must be positive and finite, got {0}")]
    InvalidCapital(f64),

    #[error("bar {index} ({date}) has untradable close {price}: prices must be positive and finite")]
    DegeneratePrice {
        index: usize,
        date: NaiveDate,
        price: f64,
    },

    #[error("bar {index} ({date}): buying with capital {capital} at {price} gives an untradable share count")]
    DegenerateShares {
        index: usize,
        date: NaiveDate,
        capital: f64,
        price: f64,
    },

    #[error("bar {index} ({date}): selling {shares} shares at {price} gives untradable proceeds")]
    DegenerateProceeds {
        index: usize,
        date: NaiveDate,
        shares: f64,
        price: f64,
    },

    #[error(transparent)]
    Series(#[from] SeriesError),
}
