//! SmaLab Core — price series, moving-average crossover signals, long/flat simulation.
//!
//! This crate contains the engine and nothing that touches a results store:
//! - Domain types (bars, series, trades, position snapshots)
//! - Rolling simple moving average
//! - Crossover signal generator (flat / long, enter / exit transitions)
//! - Trade simulator (fully invested long or flat, fractional shares)
//! - Price-history providers (CSV, Yahoo Finance, synthetic)

pub mod data;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod signals;

pub use domain::{PositionSnapshot, PriceBar, PriceSeries, Trade, TradeSide};
pub use engine::{run_backtest, BacktestOutput, CrossoverParams, EngineError, EngineState};
pub use signals::{Signal, SignalPoint, Transition};
