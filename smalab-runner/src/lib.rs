//! SmaLab Runner — configuration, orchestration, metrics, sweeps, artifacts.
//!
//! This crate builds on `smalab-core` to provide:
//! - TOML run configuration with deterministic run ids
//! - Single-backtest runner over CSV, Yahoo Finance or synthetic data
//! - Performance metrics on the mark-to-market equity curve
//! - Parallel parameter sweeps over window pairs
//! - JSON / CSV / Parquet / Markdown artifacts
//! - Logging setup for the CLI

pub mod config;
pub mod export;
pub mod logging;
pub mod metrics;
pub mod runner;
pub mod sweep;

pub use config::{BacktestConfig, ConfigError, RunId};
pub use export::{load_artifacts, save_artifacts};
pub use logging::{init_logging, LogFormat};
pub use metrics::PerformanceMetrics;
pub use runner::{run_on_series, run_single_backtest, BacktestResult, RunError};
pub use sweep::{ParamGrid, ParamSweep, RankBy, SweepEntry, SweepResults};
