//! Moving Average Crossover signal
//!
//! - Long while the short SMA is strictly above the long SMA
//! - Flat otherwise, including ties and the warm-up period

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::intent::{Signal, Transition};
use crate::domain::{PriceBar, PriceSeries};
use crate::engine::{check_window, EngineError};
use crate::indicators::RollingMean;

/// Derived fields for one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalPoint {
    pub date: NaiveDate,
    pub short_avg: Option<f64>,
    pub long_avg: Option<f64>,
    pub signal: Signal,
    pub transition: Transition,
}

/// Streaming crossover signal.
///
/// Feed closes in date order through [`CrossoverSignal::next`]; each call
/// returns the point for that bar. The first bar never carries a transition,
/// and no transition fires until both averages are defined.
#[derive(Debug, Clone)]
pub struct CrossoverSignal {
    short: RollingMean,
    long: RollingMean,
    previous: Option<Signal>,
}

impl CrossoverSignal {
    /// Fails with [`EngineError::InvalidWindow`] if either window is zero.
    pub fn new(short_window: usize, long_window: usize) -> Result<Self, EngineError> {
        check_window("short_window", short_window)?;
        check_window("long_window", long_window)?;
        Ok(Self {
            short: RollingMean::new(short_window),
            long: RollingMean::new(long_window),
            previous: None,
        })
    }

    pub fn short_window(&self) -> usize {
        self.short.period()
    }

    pub fn long_window(&self) -> usize {
        self.long.period()
    }

    /// Bars needed before the signal can be anything but flat.
    pub fn warmup(&self) -> usize {
        self.short.period().max(self.long.period())
    }

    pub fn next(&mut self, bar: &PriceBar) -> SignalPoint {
        let short_avg = self.short.push(bar.close);
        let long_avg = self.long.push(bar.close);

        let signal = match (short_avg, long_avg) {
            (Some(s), Some(l)) if s > l => Signal::Long,
            _ => Signal::Flat,
        };
        let transition = match self.previous {
            Some(prev) => Transition::between(prev, signal),
            None => Transition::Hold,
        };
        self.previous = Some(signal);

        SignalPoint {
            date: bar.date,
            short_avg,
            long_avg,
            signal,
            transition,
        }
    }

    pub fn reset(&mut self) {
        self.short.reset();
        self.long.reset();
        self.previous = None;
    }
}

/// Compute one [`SignalPoint`] per bar of `series`.
pub fn generate_signals(
    series: &PriceSeries,
    short_window: usize,
    long_window: usize,
) -> Result<Vec<SignalPoint>, EngineError> {
    let mut generator = CrossoverSignal::new(short_window, long_window)?;
    Ok(series.bars().iter().map(|bar| generator.next(bar)).collect())
}
