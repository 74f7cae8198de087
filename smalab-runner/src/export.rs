//! Reporting and export — JSON, CSV, Parquet and Markdown artifacts.
//!
//! Export formats for backtest results:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: trade log, position snapshots, signal trace, sweep table
//! - **Parquet**: mark-to-market equity curve for dataframe tooling
//! - **Markdown**: human-readable single-run report
//!
//! All persisted artifacts include a `schema_version` field. Unknown versions
//! are rejected on load.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use tracing::info;

use smalab_core::domain::{PositionSnapshot, Trade};
use smalab_core::signals::SignalPoint;

use crate::runner::{BacktestResult, SCHEMA_VERSION};
use crate::sweep::SweepResults;

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: date, bar_index, side, price, shares, notional
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "bar_index", "side", "price", "shares", "notional"])?;

    for t in trades {
        wtr.write_record([
            &t.date.to_string(),
            &t.bar_index.to_string(),
            &t.side.to_string(),
            &format!("{:.6}", t.price),
            &format!("{:.6}", t.shares),
            &format!("{:.2}", t.notional()),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: date, capital, price, shares, market_value
pub fn export_snapshots_csv(snapshots: &[PositionSnapshot]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "capital", "price", "shares", "market_value"])?;

    for s in snapshots {
        wtr.write_record([
            &s.date.to_string(),
            &format!("{:.2}", s.capital),
            &format!("{:.6}", s.price),
            &format!("{:.6}", s.shares),
            &format!("{:.2}", s.market_value()),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: date, short_avg, long_avg, signal, transition.
/// Averages are empty during warm-up.
pub fn export_signals_csv(signals: &[SignalPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "short_avg", "long_avg", "signal", "transition"])?;

    let fmt_avg = |v: Option<f64>| v.map(|x| format!("{x:.6}")).unwrap_or_default();
    for p in signals {
        wtr.write_record([
            &p.date.to_string(),
            &fmt_avg(p.short_avg),
            &fmt_avg(p.long_avg),
            &p.signal.value().to_string(),
            &p.transition.value().to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per (short, long) pair, in sweep order.
pub fn export_sweep_csv(results: &SweepResults) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "short_window",
        "long_window",
        "total_return",
        "sharpe",
        "max_drawdown",
        "trades",
        "round_trips",
        "win_rate",
        "final_market_value",
    ])?;

    for e in results.all() {
        let m = &e.metrics;
        wtr.write_record([
            &e.params.short_window.to_string(),
            &e.params.long_window.to_string(),
            &format!("{:.6}", m.total_return),
            &format!("{:.4}", m.sharpe),
            &format!("{:.6}", m.max_drawdown),
            &m.trade_count.to_string(),
            &m.round_trips.to_string(),
            &format!("{:.4}", m.win_rate),
            &format!("{:.2}", m.final_market_value),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Parquet export ─────────────────────────────────────────────────

/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Snapshot table with a Date-typed `date` column.
pub fn snapshots_to_dataframe(snapshots: &[PositionSnapshot]) -> Result<DataFrame> {
    let dates: Vec<i32> = snapshots.iter().map(|s| epoch_days(s.date)).collect();
    let capital: Vec<f64> = snapshots.iter().map(|s| s.capital).collect();
    let price: Vec<f64> = snapshots.iter().map(|s| s.price).collect();
    let shares: Vec<f64> = snapshots.iter().map(|s| s.shares).collect();
    let equity: Vec<f64> = snapshots.iter().map(PositionSnapshot::market_value).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .context("date cast")?,
        Column::new("capital".into(), capital),
        Column::new("price".into(), price),
        Column::new("shares".into(), shares),
        Column::new("equity".into(), equity),
    ])
    .context("failed to build equity dataframe")
}

pub fn write_equity_parquet(path: &Path, snapshots: &[PositionSnapshot]) -> Result<()> {
    let mut df = snapshots_to_dataframe(snapshots)?;
    let file = File::create(path)
        .with_context(|| format!("failed to create equity parquet {}", path.display()))?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .context("failed to write equity parquet")?;
    Ok(())
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single backtest run.
///
/// Creates `{symbol}_{run id prefix}/` under `output_dir` containing:
/// - `manifest.json` — the full `BacktestResult`
/// - `trades.csv` — executions
/// - `snapshots.csv` — per-bar capital trajectory
/// - `signals.csv` — per-bar averages, signal and transition
/// - `equity.parquet` — per-bar table including mark-to-market equity
/// - `report.md` — Markdown summary
///
/// Returns the path to the created directory. Re-running the same config
/// overwrites the same directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let prefix: String = result.run_id.chars().take(12).collect();
    let run_dir = output_dir.join(format!("{}_{}", result.symbol, prefix));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_json(result)?)?;
    std::fs::write(
        run_dir.join("trades.csv"),
        export_trades_csv(&result.output.trades)?,
    )?;
    std::fs::write(
        run_dir.join("snapshots.csv"),
        export_snapshots_csv(&result.output.snapshots)?,
    )?;
    std::fs::write(
        run_dir.join("signals.csv"),
        export_signals_csv(&result.output.signals)?,
    )?;
    write_equity_parquet(&run_dir.join("equity.parquet"), &result.output.snapshots)?;
    std::fs::write(run_dir.join("report.md"), generate_report(result))?;

    info!(dir = %run_dir.display(), "artifacts saved");
    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
///
/// Rejects unknown schema versions.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

/// Generate a Markdown report for a single backtest run.
pub fn generate_report(result: &BacktestResult) -> String {
    let fmt_date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
    let mut md = String::with_capacity(2048);

    md.push_str("# Backtest Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Symbol | {} |\n", result.symbol));
    md.push_str(&format!(
        "| Period | {} to {} |\n",
        fmt_date(result.start_date),
        fmt_date(result.end_date)
    ));
    md.push_str(&format!(
        "| Windows | SMA {} / SMA {} |\n",
        result.params.short_window, result.params.long_window
    ));
    md.push_str(&format!(
        "| Initial Capital | ${:.2} |\n",
        result.params.initial_capital
    ));
    md.push_str(&format!(
        "| Bars | {} ({} warmup) |\n",
        result.bar_count, result.warmup_bars
    ));
    md.push_str(&format!("| Data Source | {} |\n", result.data_source));
    md.push_str(&format!("| Dataset Hash | {} |\n", result.dataset_hash));
    md.push_str(&format!("| Run Id | {} |\n", result.run_id));
    md.push('\n');

    let m = &result.metrics;
    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Final Capital | ${:.2} |\n", m.final_capital));
    md.push_str(&format!(
        "| Final Market Value | ${:.2} |\n",
        m.final_market_value
    ));
    md.push_str(&format!("| Total Return | {:.2}% |\n", m.total_return * 100.0));
    md.push_str(&format!("| CAGR | {:.2}% |\n", m.cagr * 100.0));
    md.push_str(&format!("| Sharpe | {:.3} |\n", m.sharpe));
    md.push_str(&format!("| Max Drawdown | {:.2}% |\n", m.max_drawdown * 100.0));
    md.push_str(&format!("| Trades | {} |\n", m.trade_count));
    md.push_str(&format!(
        "| Round Trips | {} ({} won, {} lost) |\n",
        m.round_trips, m.winning_trades, m.losing_trades
    ));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", m.win_rate * 100.0));
    md.push_str(&format!("| Exposure | {:.1}% |\n", m.exposure * 100.0));
    md.push('\n');

    if m.open_at_end {
        md.push_str(
            "> Position still open at the last bar. Final capital is the amount \
             committed at entry; final market value marks it to the last close.\n\n",
        );
    }

    if !result.output.trades.is_empty() {
        md.push_str("## Trades\n\n");
        md.push_str("| Date | Side | Price | Shares |\n");
        md.push_str("| --- | --- | --- | --- |\n");
        for t in &result.output.trades {
            md.push_str(&format!(
                "| {} | {} | {:.2} | {:.4} |\n",
                t.date, t.side, t.price, t.shares
            ));
        }
        md.push('\n');
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use smalab_core::data::DataSource;
    use smalab_core::domain::{PriceBar, PriceSeries};
    use smalab_core::engine::CrossoverParams;

    use crate::runner::run_on_series;

    fn sample_result() -> BacktestResult {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let closes = [10.0, 10.0, 10.0, 12.0, 12.0, 12.0, 12.0, 12.0, 11.0, 14.0];
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar::new(base + chrono::Duration::days(i as i64), c))
            .collect();
        let series = PriceSeries::new("SPY", bars).unwrap();
        run_on_series(
            &series,
            &CrossoverParams::new(2, 4, 1_000.0),
            "0123456789abcdef".into(),
            DataSource::Csv,
        )
        .unwrap()
    }

    // ─── JSON ───────────────────────────────────────────────────────

    #[test]
    fn json_roundtrip() {
        let result = sample_result();
        let json = export_json(&result).unwrap();
        let loaded = import_json(&json).unwrap();
        assert_eq!(loaded.symbol, result.symbol);
        assert_eq!(loaded.run_id, result.run_id);
        assert_eq!(loaded.params, result.params);
        assert_eq!(loaded.output.trades.len(), result.output.trades.len());
        assert_eq!(loaded.output.signals, result.output.signals);
    }

    #[test]
    fn json_rejects_unknown_version() {
        let mut result = sample_result();
        result.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&result).unwrap();
        let err = import_json(&json).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    #[test]
    fn json_missing_version_defaults_to_current() {
        let result = sample_result();
        let mut value: serde_json::Value =
            serde_json::from_str(&export_json(&result).unwrap()).unwrap();
        value.as_object_mut().unwrap().remove("schema_version");
        let loaded = import_json(&value.to_string()).unwrap();
        assert_eq!(loaded.schema_version, SCHEMA_VERSION);
    }

    // ─── CSV ────────────────────────────────────────────────────────

    #[test]
    fn csv_trades_columns_and_rows() {
        let result = sample_result();
        let csv = export_trades_csv(&result.output.trades).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("date,bar_index,side,price,shares,notional")
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("2024-01-05,3,BUY,12.000000,"));
        assert_eq!(csv.lines().count(), 1 + result.output.trades.len());
    }

    #[test]
    fn csv_empty_trades_has_header_only() {
        let csv = export_trades_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn csv_signals_leave_warmup_blank() {
        let result = sample_result();
        let csv = export_signals_csv(&result.output.signals).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "date,short_avg,long_avg,signal,transition");
        assert_eq!(lines[1], "2024-01-02,,,0,0");
        assert_eq!(lines.len(), 1 + result.bar_count);
    }

    #[test]
    fn csv_snapshots_one_row_per_bar() {
        let result = sample_result();
        let csv = export_snapshots_csv(&result.output.snapshots).unwrap();
        assert_eq!(csv.lines().count(), 1 + result.bar_count);
        assert!(csv.lines().nth(1).unwrap().starts_with("2024-01-02,1000.00,"));
    }

    // ─── Parquet ────────────────────────────────────────────────────

    #[test]
    fn equity_dataframe_shape() {
        let result = sample_result();
        let df = snapshots_to_dataframe(&result.output.snapshots).unwrap();
        assert_eq!(df.height(), result.bar_count);
        assert_eq!(df.width(), 5);
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);
    }

    #[test]
    fn epoch_days_matches_unix_epoch() {
        assert_eq!(epoch_days(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0);
        assert_eq!(epoch_days(NaiveDate::from_ymd_opt(1970, 1, 31).unwrap()), 30);
    }

    // ─── Report ─────────────────────────────────────────────────────

    #[test]
    fn markdown_report_has_sections() {
        let md = generate_report(&sample_result());
        assert!(md.contains("# Backtest Report"));
        assert!(md.contains("## Performance Summary"));
        assert!(md.contains("| Symbol | SPY |"));
        assert!(md.contains("SMA 2 / SMA 4"));
        assert!(md.contains("## Trades"));
    }
}
