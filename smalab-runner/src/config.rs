//! TOML backtest configuration.
//!
//! ```toml
//! [backtest]
//! symbol = "AAPL"
//! start_date = "2023-01-01"
//! end_date = "2023-12-31"
//! initial_capital = 10000.0
//!
//! [strategy]
//! short_window = 20
//! long_window = 50
//!
//! [data]
//! source = "csv"
//! path = "prices/AAPL.csv"
//!
//! [output]
//! dir = "results"
//! ```
//!
//! Only `[backtest]` is required; every other section has defaults.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use smalab_core::data::DataSource;
use smalab_core::engine::{CrossoverParams, EngineError};

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("symbol must not be empty")]
    EmptySymbol,

    #[error("start_date {start} is after end_date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("data.source = \"csv\" requires data.path")]
    MissingCsvPath,

    #[error("synthetic bar count must be positive")]
    ZeroBars,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Complete configuration of a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    #[serde(default)]
    pub strategy: StrategySection,
    #[serde(default)]
    pub data: DataSection,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategySection {
    #[serde(default = "default_short_window")]
    pub short_window: usize,
    #[serde(default = "default_long_window")]
    pub long_window: usize,
}

impl Default for StrategySection {
    fn default() -> Self {
        Self {
            short_window: default_short_window(),
            long_window: default_long_window(),
        }
    }
}

/// Where the price series comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSection {
    #[serde(default = "default_source")]
    pub source: DataSource,
    /// CSV file, or a directory holding `<SYMBOL>.csv` files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// HTTP(S) proxy for Yahoo Finance requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Synthetic only: generate this many bars from `start_date` and ignore
    /// `end_date`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bars: Option<usize>,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            source: default_source(),
            path: None,
            proxy: None,
            seed: default_seed(),
            bars: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputSection {
    /// Artifact directory. Nothing is written when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_initial_capital() -> f64 {
    10_000.0
}

fn default_short_window() -> usize {
    20
}

fn default_long_window() -> usize {
    50
}

fn default_source() -> DataSource {
    DataSource::Synthetic
}

fn default_seed() -> u64 {
    42
}

impl BacktestConfig {
    /// Minimal config for `symbol` over `[start, end]` with default strategy
    /// and synthetic data.
    pub fn new(symbol: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            backtest: BacktestSection {
                symbol: symbol.into(),
                start_date,
                end_date,
                initial_capital: default_initial_capital(),
            },
            strategy: StrategySection::default(),
            data: DataSection::default(),
            output: OutputSection::default(),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backtest.symbol.trim().is_empty() {
            return Err(ConfigError::EmptySymbol);
        }
        if self.backtest.start_date > self.backtest.end_date {
            return Err(ConfigError::InvalidDateRange {
                start: self.backtest.start_date,
                end: self.backtest.end_date,
            });
        }
        if self.data.source == DataSource::Csv && self.data.path.is_none() {
            return Err(ConfigError::MissingCsvPath);
        }
        if self.data.bars == Some(0) {
            return Err(ConfigError::ZeroBars);
        }
        self.to_params().validate()?;
        Ok(())
    }

    pub fn to_params(&self) -> CrossoverParams {
        CrossoverParams::new(
            self.strategy.short_window,
            self.strategy.long_window,
            self.backtest.initial_capital,
        )
    }

    /// Deterministic hash of the whole configuration.
    ///
    /// Two runs with identical configs share a RunId. The output section is
    /// excluded: where results are written does not change them.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let mut hashed = self.clone();
        hashed.output = OutputSection::default();
        let json = serde_json::to_vec(&hashed)?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[backtest]
symbol = "AAPL"
start_date = "2023-01-01"
end_date = "2023-12-31"
initial_capital = 25000.0

[strategy]
short_window = 10
long_window = 30

[data]
source = "yahoo"
proxy = "http://127.0.0.1:7890"

[output]
dir = "results"
"#;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_full_config() {
        let config = BacktestConfig::from_toml(FULL).unwrap();
        assert_eq!(config.backtest.symbol, "AAPL");
        assert_eq!(config.backtest.start_date, date(2023, 1, 1));
        assert_eq!(config.backtest.initial_capital, 25_000.0);
        assert_eq!(config.strategy.short_window, 10);
        assert_eq!(config.strategy.long_window, 30);
        assert_eq!(config.data.source, DataSource::YahooFinance);
        assert_eq!(config.data.proxy.as_deref(), Some("http://127.0.0.1:7890"));
        assert_eq!(config.output.dir, Some(PathBuf::from("results")));
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config = BacktestConfig::from_toml(
            r#"
[backtest]
symbol = "SPY"
start_date = "2020-01-01"
end_date = "2020-12-31"
"#,
        )
        .unwrap();
        assert_eq!(config.backtest.initial_capital, 10_000.0);
        assert_eq!(config.strategy, StrategySection::default());
        assert_eq!(config.data.source, DataSource::Synthetic);
        assert_eq!(config.data.seed, 42);
        assert!(config.output.dir.is_none());
        assert_eq!(config.to_params(), CrossoverParams::default());
    }

    #[test]
    fn rejects_inverted_dates() {
        let mut config = BacktestConfig::new("SPY", date(2024, 1, 1), date(2023, 1, 1));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDateRange { .. })
        ));
        config.backtest.end_date = date(2024, 1, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn csv_source_needs_a_path() {
        let mut config = BacktestConfig::new("SPY", date(2023, 1, 1), date(2023, 6, 30));
        config.data.source = DataSource::Csv;
        assert!(matches!(config.validate(), Err(ConfigError::MissingCsvPath)));
        config.data.path = Some(PathBuf::from("SPY.csv"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn engine_checks_are_delegated() {
        let mut config = BacktestConfig::new("SPY", date(2023, 1, 1), date(2023, 6, 30));
        config.strategy.short_window = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Engine(EngineError::InvalidWindow { .. }))
        ));
    }

    #[test]
    fn equal_windows_are_allowed() {
        let mut config = BacktestConfig::new("SPY", date(2023, 1, 1), date(2023, 6, 30));
        config.strategy.short_window = 30;
        config.strategy.long_window = 30;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn run_id_is_deterministic() {
        let config = BacktestConfig::from_toml(FULL).unwrap();
        assert_eq!(config.run_id().unwrap(), config.run_id().unwrap());
        assert_eq!(config.run_id().unwrap().len(), 64);
    }

    #[test]
    fn run_id_changes_with_params_but_not_output_dir() {
        let a = BacktestConfig::from_toml(FULL).unwrap();

        let mut b = a.clone();
        b.strategy.short_window = 15;
        assert_ne!(a.run_id().unwrap(), b.run_id().unwrap());

        let mut c = a.clone();
        c.output.dir = Some(PathBuf::from("elsewhere"));
        assert_eq!(a.run_id().unwrap(), c.run_id().unwrap());
    }

    #[test]
    fn toml_roundtrip() {
        let config = BacktestConfig::from_toml(FULL).unwrap();
        let text = config.to_toml().unwrap();
        assert_eq!(BacktestConfig::from_toml(&text).unwrap(), config);
    }
}
