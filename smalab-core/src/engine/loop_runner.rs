//! Bar loop — signal generation followed by trade simulation, one bar at a time.

use chrono::NaiveDate;
use tracing::{info, warn};

use super::error::EngineError;
use super::simulator::TradeSimulator;
use super::state::{BacktestOutput, CrossoverParams};
use crate::domain::{PriceBar, PriceSeries, SeriesError};
use crate::signals::{CrossoverSignal, SignalPoint};

/// Incremental backtest: feed bars one at a time.
///
/// Each bar is checked as it arrives: a bad price or a date that does not
/// follow the previous bar fails that call and the bar is dropped. A failed
/// execution ends the run, and every later call returns the same error. Use
/// [`run_backtest`] for a whole series, which checks every bar before any
/// state is touched.
#[derive(Debug, Clone)]
pub struct Backtest {
    signal: CrossoverSignal,
    simulator: TradeSimulator,
    signals: Vec<SignalPoint>,
    last_date: Option<NaiveDate>,
    halted: Option<EngineError>,
}

impl Backtest {
    pub fn new(params: &CrossoverParams) -> Result<Self, EngineError> {
        params.validate()?;
        if params.is_degenerate() {
            warn!(
                short_window = params.short_window,
                long_window = params.long_window,
                "short window is not shorter than long window; signal will never go long"
            );
        }
        Ok(Self {
            signal: CrossoverSignal::new(params.short_window, params.long_window)?,
            simulator: TradeSimulator::new(params.initial_capital),
            signals: Vec::new(),
            last_date: None,
            halted: None,
        })
    }

    pub fn bars_processed(&self) -> usize {
        self.signals.len()
    }

    pub fn on_bar(&mut self, bar: &PriceBar) -> Result<&SignalPoint, EngineError> {
        if let Some(err) = &self.halted {
            return Err(err.clone());
        }
        let index = self.signals.len();
        check_price(index, bar)?;
        if let Some(previous) = self.last_date {
            if bar.date <= previous {
                return Err(SeriesError::NotIncreasing {
                    index,
                    previous,
                    current: bar.date,
                }
                .into());
            }
        }

        let point = self.signal.next(bar);
        if let Err(err) = self.simulator.on_bar(bar, &point) {
            self.halted = Some(err.clone());
            return Err(err);
        }
        self.last_date = Some(bar.date);
        self.signals.push(point);
        Ok(&self.signals[self.signals.len() - 1])
    }

    pub fn finish(self) -> BacktestOutput {
        let (trades, snapshots, final_state) = self.simulator.finish();
        BacktestOutput {
            signals: self.signals,
            trades,
            snapshots,
            final_state,
        }
    }
}

fn check_price(index: usize, bar: &PriceBar) -> Result<(), EngineError> {
    if bar.has_tradable_close() {
        Ok(())
    } else {
        Err(EngineError::DegeneratePrice {
            index,
            date: bar.date,
            price: bar.close,
        })
    }
}

/// Run a full backtest over `series`.
///
/// Fails fast on invalid parameters or any untradable close; in that case
/// nothing is simulated. An empty series yields empty outputs.
pub fn run_backtest(
    series: &PriceSeries,
    params: &CrossoverParams,
) -> Result<BacktestOutput, EngineError> {
    let mut backtest = Backtest::new(params)?;
    for (i, bar) in series.bars().iter().enumerate() {
        check_price(i, bar)?;
    }

    for bar in series.bars() {
        backtest.on_bar(bar)?;
    }
    let output = backtest.finish();

    info!(
        symbol = series.symbol(),
        bars = series.len(),
        short_window = params.short_window,
        long_window = params.long_window,
        trades = output.trade_count(),
        final_capital = output.final_capital(),
        open_at_end = output.is_open_at_end(),
        "backtest complete"
    );
    Ok(output)
}
