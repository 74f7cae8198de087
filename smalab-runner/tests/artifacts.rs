//! Artifact bundle written by `save_artifacts` and read back.

use std::fs::File;

use chrono::NaiveDate;
use polars::prelude::*;
use smalab_core::data::SyntheticProvider;
use smalab_runner::export::{export_sweep_csv, load_artifacts, save_artifacts};
use smalab_runner::{run_single_backtest, BacktestConfig, ParamGrid, ParamSweep};

fn synthetic_config() -> BacktestConfig {
    let mut config = BacktestConfig::new(
        "SYN",
        NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
        NaiveDate::from_ymd_opt(2023, 12, 29).unwrap(),
    );
    config.strategy.short_window = 5;
    config.strategy.long_window = 20;
    config
}

#[test]
fn save_and_load_roundtrip() {
    let result = run_single_backtest(&synthetic_config()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let run_dir = save_artifacts(&result, dir.path()).unwrap();

    for name in [
        "manifest.json",
        "trades.csv",
        "snapshots.csv",
        "signals.csv",
        "equity.parquet",
        "report.md",
    ] {
        assert!(run_dir.join(name).exists(), "{name} missing");
    }

    let loaded = load_artifacts(&run_dir).unwrap();
    assert_eq!(loaded.run_id, result.run_id);
    assert_eq!(loaded.params, result.params);
    assert_eq!(loaded.dataset_hash, result.dataset_hash);
    assert_eq!(loaded.output.trades.len(), result.output.trades.len());
    assert_eq!(loaded.output.snapshots.len(), result.bar_count);
    assert!((loaded.metrics.sharpe - result.metrics.sharpe).abs() < 1e-10);
}

#[test]
fn same_config_reuses_directory() {
    let config = synthetic_config();
    let result = run_single_backtest(&config).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let first = save_artifacts(&result, dir.path()).unwrap();
    let second = save_artifacts(&result, dir.path()).unwrap();
    assert_eq!(first, second);
    assert!(first
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("SYN_"));
}

#[test]
fn parquet_has_one_row_per_bar() {
    let result = run_single_backtest(&synthetic_config()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let run_dir = save_artifacts(&result, dir.path()).unwrap();

    let file = File::open(run_dir.join("equity.parquet")).unwrap();
    let df = ParquetReader::new(file).finish().unwrap();
    assert_eq!(df.height(), result.bar_count);
    assert_eq!(df.width(), 5);
    assert!(df.column("equity").is_ok());
}

#[test]
fn sweep_table_has_a_row_per_pair() {
    let series = SyntheticProvider::default().generate(
        "SYN",
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        300,
    );
    let grid = ParamGrid {
        short_windows: vec![5, 10],
        long_windows: vec![20, 40, 60],
        initial_capital: 10_000.0,
    };
    let results = ParamSweep::new(&series).sweep(&grid).unwrap();
    let csv = export_sweep_csv(&results).unwrap();

    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 1 + 6);
    assert!(lines[0].starts_with("short_window,long_window,"));
    assert!(lines[1].starts_with("5,20,"));
    assert!(lines[6].starts_with("10,60,"));
}
