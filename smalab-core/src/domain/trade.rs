//! Trade — one execution in the long/flat simulation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => f.pad("BUY"),
            TradeSide::Sell => f.pad("SELL"),
        }
    }
}

/// A single BUY or SELL at a bar's close.
///
/// `shares` is fractional: the simulation sizes positions by notional value,
/// not by share lots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub date: NaiveDate,
    pub bar_index: usize,
    pub side: TradeSide,
    pub price: f64,
    pub shares: f64,
}

impl Trade {
    /// Cash value exchanged by this execution.
    pub fn notional(&self) -> f64 {
        self.price * self.shares
    }
}

/// A BUY paired with the SELL that closed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundTrip {
    pub entry: Trade,
    pub exit: Trade,
}

impl RoundTrip {
    pub fn pnl(&self) -> f64 {
        self.exit.notional() - self.entry.notional()
    }

    pub fn return_pct(&self) -> f64 {
        if self.entry.price == 0.0 {
            return 0.0;
        }
        self.exit.price / self.entry.price - 1.0
    }

    pub fn bars_held(&self) -> usize {
        self.exit.bar_index.saturating_sub(self.entry.bar_index)
    }

    pub fn is_winner(&self) -> bool {
        self.pnl() > 0.0
    }
}

/// Pair consecutive BUY/SELL executions. A trailing open BUY is left out.
pub fn round_trips(trades: &[Trade]) -> Vec<RoundTrip> {
    let mut trips = Vec::new();
    let mut open: Option<&Trade> = None;
    for trade in trades {
        match (trade.side, open) {
            (TradeSide::Buy, None) => open = Some(trade),
            (TradeSide::Sell, Some(entry)) => {
                trips.push(RoundTrip {
                    entry: entry.clone(),
                    exit: trade.clone(),
                });
                open = None;
            }
            _ => {}
        }
    }
    trips
}
