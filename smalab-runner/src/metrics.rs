//! Performance metrics — pure functions that compute strategy statistics.
//!
//! The equity curve is the mark-to-market account value per bar (shares at
//! the bar's close while long, cash while flat). Trade statistics work on
//! completed BUY/SELL round trips; a position still open at the end of the
//! run is not counted as a trade.

use serde::{Deserialize, Serialize};
use smalab_core::domain::{round_trips, PositionSnapshot, RoundTrip};
use smalab_core::engine::BacktestOutput;

/// Trading days per year used for annualisation.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Fractional return of mark-to-market equity over the run.
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    /// Largest peak-to-trough fall, as a non-positive fraction.
    pub max_drawdown: f64,
    /// Executions (BUY and SELL each count once).
    pub trade_count: usize,
    pub round_trips: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_trade_return: f64,
    /// Fraction of bars spent long.
    pub exposure: f64,
    /// Flat-only capital; stale when a position is open at the end.
    pub final_capital: f64,
    pub final_market_value: f64,
    pub open_at_end: bool,
}

impl PerformanceMetrics {
    pub fn compute(output: &BacktestOutput) -> Self {
        let equity = equity_curve(&output.snapshots);
        let trips = round_trips(&output.trades);
        let winning_trades = trips.iter().filter(|t| t.is_winner()).count();

        Self {
            total_return: total_return(&equity),
            cagr: cagr(&equity),
            sharpe: sharpe_ratio(&equity),
            max_drawdown: max_drawdown(&equity),
            trade_count: output.trade_count(),
            round_trips: trips.len(),
            winning_trades,
            losing_trades: trips.len() - winning_trades,
            win_rate: win_rate(&trips),
            avg_trade_return: avg_trade_return(&trips),
            exposure: exposure(&output.snapshots),
            final_capital: output.final_capital(),
            final_market_value: output.final_market_value(),
            open_at_end: output.is_open_at_end(),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Mark-to-market account value per bar.
pub fn equity_curve(snapshots: &[PositionSnapshot]) -> Vec<f64> {
    snapshots.iter().map(PositionSnapshot::market_value).collect()
}

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&last)) if equity_curve.len() >= 2 && initial > 0.0 => {
            (last - initial) / initial
        }
        _ => 0.0,
    }
}

/// Compound annual growth rate over `equity_curve.len()` trading days.
pub fn cagr(equity_curve: &[f64]) -> f64 {
    let (Some(&initial), Some(&last)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    if equity_curve.len() < 2 || initial <= 0.0 || last <= 0.0 {
        return 0.0;
    }
    let years = equity_curve.len() as f64 / TRADING_DAYS_PER_YEAR;
    (last / initial).powf(1.0 / years) - 1.0
}

/// Annualized Sharpe ratio from daily returns, zero risk-free rate.
///
/// Returns 0.0 if variance is zero or there are fewer than 3 bars.
pub fn sharpe_ratio(equity_curve: &[f64]) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

/// Fraction of round trips that closed above their entry price.
pub fn win_rate(trips: &[RoundTrip]) -> f64 {
    if trips.is_empty() {
        return 0.0;
    }
    trips.iter().filter(|t| t.is_winner()).count() as f64 / trips.len() as f64
}

pub fn avg_trade_return(trips: &[RoundTrip]) -> f64 {
    let returns: Vec<f64> = trips.iter().map(RoundTrip::return_pct).collect();
    mean_f64(&returns)
}

pub fn exposure(snapshots: &[PositionSnapshot]) -> f64 {
    if snapshots.is_empty() {
        return 0.0;
    }
    snapshots.iter().filter(|s| s.is_long()).count() as f64 / snapshots.len() as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

pub fn daily_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use smalab_core::domain::{PriceBar, PriceSeries, Trade, TradeSide};
    use smalab_core::engine::{run_backtest, CrossoverParams};

    fn date(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap() + chrono::Duration::days(i as i64)
    }

    fn trip(entry: f64, exit: f64) -> RoundTrip {
        let shares = 100.0 / entry;
        RoundTrip {
            entry: Trade {
                date: date(0),
                bar_index: 0,
                side: TradeSide::Buy,
                price: entry,
                shares,
            },
            exit: Trade {
                date: date(3),
                bar_index: 3,
                side: TradeSide::Sell,
                price: exit,
                shares,
            },
        }
    }

    // ── Total return ──

    #[test]
    fn total_return_positive() {
        let eq = vec![100_000.0, 100_500.0, 101_000.0, 110_000.0];
        assert!((total_return(&eq) - 0.1).abs() < 1e-10);
    }

    #[test]
    fn total_return_negative() {
        let eq = vec![100_000.0, 95_000.0, 90_000.0];
        assert!((total_return(&eq) - (-0.1)).abs() < 1e-10);
    }

    #[test]
    fn total_return_degenerate_inputs() {
        assert_eq!(total_return(&[100_000.0]), 0.0);
        assert_eq!(total_return(&[]), 0.0);
    }

    // ── CAGR ──

    #[test]
    fn cagr_one_year() {
        let mut eq = vec![100_000.0];
        for i in 1..252 {
            eq.push(eq[i - 1] * 1.1_f64.powf(1.0 / 251.0));
        }
        let c = cagr(&eq);
        assert!((c - 0.1).abs() < 0.005, "CAGR should be ~10%, got {c}");
    }

    #[test]
    fn cagr_constant_equity() {
        assert_eq!(cagr(&[100_000.0; 252]), 0.0);
    }

    // ── Sharpe ──

    #[test]
    fn sharpe_constant_equity_is_zero() {
        assert_eq!(sharpe_ratio(&[100_000.0; 100]), 0.0);
    }

    #[test]
    fn sharpe_consistent_gains_is_high() {
        let mut eq = vec![100_000.0];
        for i in 1..253 {
            let r = if i % 2 == 0 { 1.002 } else { 1.0005 };
            eq.push(eq[i - 1] * r);
        }
        assert!(sharpe_ratio(&eq) > 5.0);
    }

    // ── Drawdown ──

    #[test]
    fn max_drawdown_from_peak() {
        let eq = vec![100.0, 120.0, 90.0, 130.0, 117.0];
        assert!((max_drawdown(&eq) - (-0.25)).abs() < 1e-12);
    }

    #[test]
    fn max_drawdown_monotonic_is_zero() {
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    // ── Trades ──

    #[test]
    fn win_rate_counts_round_trips() {
        let trips = vec![trip(10.0, 12.0), trip(10.0, 9.0), trip(20.0, 25.0), trip(5.0, 5.0)];
        assert_eq!(win_rate(&trips), 0.5);
        assert_eq!(win_rate(&[]), 0.0);
    }

    #[test]
    fn avg_trade_return_is_mean_of_price_moves() {
        let trips = vec![trip(10.0, 12.0), trip(10.0, 9.0)];
        assert!((avg_trade_return(&trips) - 0.05).abs() < 1e-12);
    }

    // ── Full output ──

    #[test]
    fn compute_marks_open_position_to_market() {
        let closes = [10.0, 10.0, 10.0, 12.0, 15.0, 20.0];
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar::new(date(i), c))
            .collect();
        let series = PriceSeries::new("T", bars).unwrap();
        let output = run_backtest(&series, &CrossoverParams::new(2, 4, 1_000.0)).unwrap();

        let m = PerformanceMetrics::compute(&output);
        assert_eq!(m.trade_count, 1);
        assert_eq!(m.round_trips, 0);
        assert!(m.open_at_end);
        assert_eq!(m.final_capital, 1_000.0);
        assert!((m.final_market_value - 1_000.0 / 12.0 * 20.0).abs() < 1e-9);
        assert!((m.total_return - (20.0 / 12.0 - 1.0)).abs() < 1e-9);
        assert!((m.exposure - 0.5).abs() < 1e-12);
    }

    #[test]
    fn compute_on_empty_output() {
        let output = run_backtest(&PriceSeries::default(), &CrossoverParams::default()).unwrap();
        let m = PerformanceMetrics::compute(&output);
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.trade_count, 0);
        assert_eq!(m.final_market_value, 10_000.0);
        assert_eq!(m.exposure, 0.0);
    }
}
