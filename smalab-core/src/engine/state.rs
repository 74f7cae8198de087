//! Run parameters, mutable engine state, and run output.

use serde::{Deserialize, Serialize};

use super::error::EngineError;
use crate::domain::{PositionSnapshot, Trade};
use crate::signals::SignalPoint;

/// Parameters for one crossover backtest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrossoverParams {
    pub short_window: usize,
    pub long_window: usize,
    pub initial_capital: f64,
}

impl Default for CrossoverParams {
    fn default() -> Self {
        Self {
            short_window: 20,
            long_window: 50,
            initial_capital: 10_000.0,
        }
    }
}

impl CrossoverParams {
    pub fn new(short_window: usize, long_window: usize, initial_capital: f64) -> Self {
        Self {
            short_window,
            long_window,
            initial_capital,
        }
    }

    /// Reject zero windows and non-positive capital.
    ///
    /// `short_window >= long_window` is accepted: the signal can never go
    /// long in that case (see [`CrossoverParams::is_degenerate`]).
    pub fn validate(&self) -> Result<(), EngineError> {
        check_window("short_window", self.short_window)?;
        check_window("long_window", self.long_window)?;
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(EngineError::InvalidCapital(self.initial_capital));
        }
        Ok(())
    }

    pub fn is_degenerate(&self) -> bool {
        self.short_window >= self.long_window
    }
}

pub(crate) fn check_window(name: &'static str, value: usize) -> Result<(), EngineError> {
    if value == 0 {
        return Err(EngineError::InvalidWindow { name, value });
    }
    Ok(())
}

/// Whether the account currently holds shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionState {
    #[default]
    Flat,
    Long,
}

/// Mutable account state for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    /// Cash value while flat. Not marked to market while long.
    pub capital: f64,
    /// Zero when flat, positive and finite when long.
    pub shares: f64,
    pub initial_capital: f64,
    #[serde(default)]
    pub position: PositionState,
}

impl EngineState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            capital: initial_capital,
            shares: 0.0,
            initial_capital,
            position: PositionState::Flat,
        }
    }

    pub fn position(&self) -> PositionState {
        self.position
    }

    pub fn is_flat(&self) -> bool {
        self.position() == PositionState::Flat
    }

    /// Account value at `price`: shares marked to market when long.
    pub fn market_value(&self, price: f64) -> f64 {
        match self.position() {
            PositionState::Long => self.shares * price,
            PositionState::Flat => self.capital,
        }
    }
}

/// Everything a backtest run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestOutput {
    pub signals: Vec<SignalPoint>,
    pub trades: Vec<Trade>,
    pub snapshots: Vec<PositionSnapshot>,
    pub final_state: EngineState,
}

impl BacktestOutput {
    /// Flat-only capital at the end of the run. Stale if a position is
    /// still open.
    pub fn final_capital(&self) -> f64 {
        self.final_state.capital
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    /// Account value at the last bar with any open position marked to market.
    pub fn final_market_value(&self) -> f64 {
        self.snapshots
            .last()
            .map(PositionSnapshot::market_value)
            .unwrap_or(self.final_state.capital)
    }

    pub fn is_open_at_end(&self) -> bool {
        !self.final_state.is_flat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_follow_classic_20_50() {
        let params = CrossoverParams::default();
        assert_eq!(params.short_window, 20);
        assert_eq!(params.long_window, 50);
        assert_eq!(params.initial_capital, 10_000.0);
        assert!(params.validate().is_ok());
        assert!(!params.is_degenerate());
    }

    #[test]
    fn zero_windows_are_rejected() {
        assert_eq!(
            CrossoverParams::new(0, 5, 1_000.0).validate(),
            Err(EngineError::InvalidWindow {
                name: "short_window",
                value: 0
            })
        );
        assert_eq!(
            CrossoverParams::new(2, 0, 1_000.0).validate(),
            Err(EngineError::InvalidWindow {
                name: "long_window",
                value: 0
            })
        );
    }

    #[test]
    fn bad_capital_is_rejected() {
        for capital in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                CrossoverParams::new(2, 4, capital).validate(),
                Err(EngineError::InvalidCapital(_))
            ));
        }
    }

    #[test]
    fn equal_windows_are_degenerate_but_valid() {
        let params = CrossoverParams::new(5, 5, 1_000.0);
        assert!(params.validate().is_ok());
        assert!(params.is_degenerate());
    }

    #[test]
    fn engine_state_initial() {
        let state = EngineState::new(5_000.0);
        assert_eq!(state.capital, 5_000.0);
        assert_eq!(state.shares, 0.0);
        assert!(state.is_flat());
        assert_eq!(state.market_value(123.0), 5_000.0);
    }

    #[test]
    fn long_state_marks_to_market() {
        let state = EngineState {
            capital: 1_000.0,
            shares: 10.0,
            initial_capital: 1_000.0,
            position: PositionState::Long,
        };
        assert_eq!(state.position(), PositionState::Long);
        assert_eq!(state.market_value(120.0), 1_200.0);
    }
}
