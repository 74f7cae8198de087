//! Backtest runner — wires together config, data provider, engine, and metrics.
//!
//! Two entry points:
//! - `run_single_backtest()`: builds the provider named in the config, loads
//!   the series, then runs. Used by the CLI.
//! - `run_on_series()`: takes a pre-loaded series. Used by sweeps and tests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use smalab_core::data::{
    CsvProvider, DataError, DataSource, PriceHistoryProvider, SyntheticProvider, YahooProvider,
};
use smalab_core::domain::PriceSeries;
use smalab_core::engine::{run_backtest, BacktestOutput, CrossoverParams, EngineError};

use crate::config::{BacktestConfig, ConfigError, RunId};
use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub symbol: String,
    /// First and last bar actually simulated; `None` for an empty series.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub params: CrossoverParams,
    pub data_source: DataSource,
    pub dataset_hash: String,
    pub bar_count: usize,
    pub warmup_bars: usize,
    pub metrics: PerformanceMetrics,
    pub output: BacktestOutput,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Build the provider named by `config.data`.
pub fn build_provider(config: &BacktestConfig) -> Result<Box<dyn PriceHistoryProvider>, RunError> {
    let provider: Box<dyn PriceHistoryProvider> = match config.data.source {
        DataSource::Csv => {
            let path = config.data.path.clone().ok_or(ConfigError::MissingCsvPath)?;
            Box::new(CsvProvider::new(path))
        }
        DataSource::YahooFinance => match &config.data.proxy {
            Some(proxy) => Box::new(YahooProvider::with_proxy(proxy)?),
            None => Box::new(YahooProvider::new()?),
        },
        DataSource::Synthetic => Box::new(SyntheticProvider::with_seed(config.data.seed)),
    };
    Ok(provider)
}

/// Load the series described by `config` through `provider`.
///
/// A synthetic config with `data.bars` set generates that many bars from
/// `start_date` instead of filling the date range.
pub fn load_series(
    config: &BacktestConfig,
    provider: &dyn PriceHistoryProvider,
) -> Result<PriceSeries, RunError> {
    let bt = &config.backtest;
    if let (DataSource::Synthetic, Some(bars)) = (config.data.source, config.data.bars) {
        warn!(symbol = %bt.symbol, bars, "using synthetic price data");
        return Ok(SyntheticProvider::with_seed(config.data.seed).generate(
            &bt.symbol,
            bt.start_date,
            bars,
        ));
    }
    Ok(provider.fetch(&bt.symbol, bt.start_date, bt.end_date)?)
}

/// Run a single backtest from a BacktestConfig.
pub fn run_single_backtest(config: &BacktestConfig) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let provider = build_provider(config)?;
    run_with_provider(config, provider.as_ref())
}

/// Like [`run_single_backtest`] but with a caller-supplied provider.
pub fn run_with_provider(
    config: &BacktestConfig,
    provider: &dyn PriceHistoryProvider,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    info!(
        symbol = %config.backtest.symbol,
        provider = provider.name(),
        start = %config.backtest.start_date,
        end = %config.backtest.end_date,
        "loading price history"
    );
    let series = load_series(config, provider)?;
    run_on_series(&series, &config.to_params(), config.run_id()?, provider.source())
}

/// Run a backtest on a pre-loaded series — no I/O.
pub fn run_on_series(
    series: &PriceSeries,
    params: &CrossoverParams,
    run_id: RunId,
    data_source: DataSource,
) -> Result<BacktestResult, RunError> {
    let output = run_backtest(series, params)?;
    let metrics = PerformanceMetrics::compute(&output);

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        symbol: series.symbol().to_string(),
        start_date: series.first_date(),
        end_date: series.last_date(),
        params: *params,
        data_source,
        dataset_hash: dataset_hash(series),
        bar_count: series.len(),
        warmup_bars: params.short_window.max(params.long_window) - 1,
        metrics,
        output,
    })
}

/// blake3 over every bar's date and close.
pub fn dataset_hash(series: &PriceSeries) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(series.symbol().as_bytes());
    for bar in series.bars() {
        hasher.update(bar.date.to_string().as_bytes());
        hasher.update(&bar.close.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use smalab_core::domain::PriceBar;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn series(closes: &[f64]) -> PriceSeries {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar::new(date(2024, 1, 1) + chrono::Duration::days(i as i64), c))
            .collect();
        PriceSeries::new("TEST", bars).unwrap()
    }

    #[test]
    fn dataset_hash_depends_on_closes() {
        let a = series(&[1.0, 2.0, 3.0]);
        let b = series(&[1.0, 2.0, 3.5]);
        assert_eq!(dataset_hash(&a), dataset_hash(&a.clone()));
        assert_ne!(dataset_hash(&a), dataset_hash(&b));
    }

    #[test]
    fn run_on_series_fills_metadata() {
        let s = series(&[10.0, 10.0, 10.0, 12.0, 12.0]);
        let result = run_on_series(
            &s,
            &CrossoverParams::new(2, 4, 1_000.0),
            "abc".into(),
            DataSource::Csv,
        )
        .unwrap();
        assert_eq!(result.schema_version, SCHEMA_VERSION);
        assert_eq!(result.symbol, "TEST");
        assert_eq!(result.start_date, Some(date(2024, 1, 1)));
        assert_eq!(result.end_date, Some(date(2024, 1, 5)));
        assert_eq!(result.bar_count, 5);
        assert_eq!(result.warmup_bars, 3);
        assert_eq!(result.metrics.trade_count, 1);
    }

    #[test]
    fn engine_errors_surface() {
        let s = series(&[10.0, 0.0]);
        let err = run_on_series(
            &s,
            &CrossoverParams::new(1, 2, 1_000.0),
            "x".into(),
            DataSource::Csv,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RunError::Engine(EngineError::DegeneratePrice { index: 1, .. })
        ));
    }

    #[test]
    fn synthetic_bar_count_overrides_range() {
        let mut config = BacktestConfig::new("SYN", date(2024, 1, 1), date(2024, 1, 5));
        config.data.bars = Some(60);
        let result = run_single_backtest(&config).unwrap();
        assert_eq!(result.bar_count, 60);
        assert_eq!(result.data_source, DataSource::Synthetic);
    }
}
