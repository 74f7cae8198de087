//! Backtesting engine.
//!
//! One linear pass over the series. For each bar:
//! 1. Signal: update both moving averages, derive signal and transition
//! 2. Simulate: act on the transition (buy all / sell all / nothing)
//! 3. Record: append the bar's position snapshot

pub mod error;
pub mod loop_runner;
pub mod simulator;
pub mod state;

pub use error::EngineError;
pub use loop_runner::{run_backtest, Backtest};
pub use simulator::TradeSimulator;
pub(crate) use state::check_window;
pub use state::{BacktestOutput, CrossoverParams, EngineState, PositionState};
