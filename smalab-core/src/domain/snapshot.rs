//! PositionSnapshot — one point of the per-bar capital trajectory.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// State after a bar has been processed.
///
/// `capital` is the flat-only figure: it only changes when a position is
/// closed, so while long it still shows the capital committed at entry.
/// `shares` lets a reporter mark the position to market without replaying
/// the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub date: NaiveDate,
    pub capital: f64,
    pub price: f64,
    pub shares: f64,
}

impl PositionSnapshot {
    pub fn is_long(&self) -> bool {
        self.shares > 0.0
    }

    /// Value of the account at this bar's close.
    pub fn market_value(&self) -> f64 {
        if self.is_long() {
            self.shares * self.price
        } else {
            self.capital
        }
    }
}
