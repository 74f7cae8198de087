//! Parameter sweep over short/long window pairs.
//!
//! Every run borrows the same immutable [`PriceSeries`] and owns its own
//! engine state, so runs execute in parallel on the rayon pool without
//! locking. Results are always ordered by (short, long) regardless of
//! completion order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use smalab_core::domain::PriceSeries;
use smalab_core::engine::{run_backtest, CrossoverParams};

use crate::metrics::PerformanceMetrics;
use crate::runner::RunError;

/// Parameter grid specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub short_windows: Vec<usize>,
    pub long_windows: Vec<usize>,
    pub initial_capital: f64,
}

impl ParamGrid {
    /// Short windows 5..=30 step 5, long windows 20..=200 step 20.
    pub fn crossover_default() -> Self {
        Self {
            short_windows: (5..=30).step_by(5).collect(),
            long_windows: (20..=200).step_by(20).collect(),
            initial_capital: 10_000.0,
        }
    }

    /// Number of valid (short < long) combinations in this grid.
    pub fn size(&self) -> usize {
        self.generate().len()
    }

    /// All valid combinations, ordered by (short, long).
    ///
    /// Pairs with `short >= long` can never go long and are skipped, as are
    /// duplicate windows.
    pub fn generate(&self) -> Vec<CrossoverParams> {
        let mut shorts = self.short_windows.clone();
        let mut longs = self.long_windows.clone();
        shorts.sort_unstable();
        shorts.dedup();
        longs.sort_unstable();
        longs.dedup();

        let mut params = Vec::new();
        for &short in &shorts {
            for &long in &longs {
                if short >= long {
                    continue;
                }
                params.push(CrossoverParams::new(short, long, self.initial_capital));
            }
        }
        params
    }
}

/// One point of the sweep: parameters plus the metrics they produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    pub params: CrossoverParams,
    pub metrics: PerformanceMetrics,
}

/// Metric used to rank sweep entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    #[default]
    TotalReturn,
    Sharpe,
    /// Shallowest drawdown first.
    MaxDrawdown,
    WinRate,
}

impl RankBy {
    fn score(self, m: &PerformanceMetrics) -> f64 {
        match self {
            RankBy::TotalReturn => m.total_return,
            RankBy::Sharpe => m.sharpe,
            RankBy::MaxDrawdown => m.max_drawdown,
            RankBy::WinRate => m.win_rate,
        }
    }
}

impl std::str::FromStr for RankBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total_return" | "return" => Ok(RankBy::TotalReturn),
            "sharpe" => Ok(RankBy::Sharpe),
            "max_drawdown" | "drawdown" => Ok(RankBy::MaxDrawdown),
            "win_rate" => Ok(RankBy::WinRate),
            other => Err(format!(
                "unknown ranking metric '{other}' (expected total_return, sharpe, max_drawdown, win_rate)"
            )),
        }
    }
}

/// Parameter sweep executor over a single series.
pub struct ParamSweep<'a> {
    series: &'a PriceSeries,
    parallel: bool,
}

impl<'a> ParamSweep<'a> {
    pub fn new(series: &'a PriceSeries) -> Self {
        Self {
            series,
            parallel: true,
        }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn sweep(&self, grid: &ParamGrid) -> Result<SweepResults, RunError> {
        self.sweep_with_progress(grid, |_, _, _| {})
    }

    /// Executes a sweep, invoking `progress_callback(index, total, entry)`
    /// as each run completes. In parallel mode callbacks arrive in
    /// completion order.
    pub fn sweep_with_progress<F>(
        &self,
        grid: &ParamGrid,
        progress_callback: F,
    ) -> Result<SweepResults, RunError>
    where
        F: Fn(usize, usize, &SweepEntry) + Send + Sync,
    {
        let combos = grid.generate();
        let total = combos.len();
        info!(
            symbol = self.series.symbol(),
            bars = self.series.len(),
            combinations = total,
            parallel = self.parallel,
            "starting parameter sweep"
        );

        let run_one = |(idx, params): (usize, &CrossoverParams)| -> Result<SweepEntry, RunError> {
            let output = run_backtest(self.series, params)?;
            let entry = SweepEntry {
                params: *params,
                metrics: PerformanceMetrics::compute(&output),
            };
            progress_callback(idx, total, &entry);
            Ok(entry)
        };

        let entries: Vec<SweepEntry> = if self.parallel {
            combos
                .par_iter()
                .enumerate()
                .map(run_one)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            combos
                .iter()
                .enumerate()
                .map(run_one)
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(SweepResults::new(entries))
    }
}

/// Results from a parameter sweep, ordered by (short, long).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResults {
    entries: Vec<SweepEntry>,
}

impl SweepResults {
    fn new(mut entries: Vec<SweepEntry>) -> Self {
        entries.sort_by_key(|e| (e.params.short_window, e.params.long_window));
        Self { entries }
    }

    pub fn all(&self) -> &[SweepEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, short_window: usize, long_window: usize) -> Option<&SweepEntry> {
        self.entries
            .iter()
            .find(|e| e.params.short_window == short_window && e.params.long_window == long_window)
    }

    /// Entries sorted best-first by `metric`. Ties keep (short, long) order.
    pub fn ranked(&self, metric: RankBy) -> Vec<&SweepEntry> {
        let mut sorted: Vec<_> = self.entries.iter().collect();
        sorted.sort_by(|a, b| {
            metric
                .score(&b.metrics)
                .partial_cmp(&metric.score(&a.metrics))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
    }

    pub fn top_n(&self, metric: RankBy, n: usize) -> Vec<&SweepEntry> {
        self.ranked(metric).into_iter().take(n).collect()
    }

    pub fn best(&self, metric: RankBy) -> Option<&SweepEntry> {
        self.ranked(metric).into_iter().next()
    }
}
