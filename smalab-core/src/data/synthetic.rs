//! Synthetic price series for demos and tests.
//!
//! Geometric random walk on business days: log returns are normal with a
//! small positive drift. The same seed always yields the same series, so
//! results on synthetic data are reproducible (but should never be mistaken
//! for real market history).

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use super::provider::{non_empty, DataError, DataSource, PriceHistoryProvider};
use crate::domain::{PriceBar, PriceSeries};

#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    pub seed: u64,
    pub start_price: f64,
    /// Mean daily log return.
    pub drift: f64,
    /// Standard deviation of daily log returns.
    pub volatility: f64,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self {
            seed: 42,
            start_price: 100.0,
            drift: 0.0002,
            volatility: 0.02,
        }
    }
}

impl SyntheticProvider {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// `count` business-day bars starting at the first business day on or
    /// after `first`.
    pub fn generate(&self, symbol: &str, first: NaiveDate, count: usize) -> PriceSeries {
        let dates = business_days(first).take(count);
        self.build(symbol, dates)
    }

    fn build(&self, symbol: &str, dates: impl Iterator<Item = NaiveDate>) -> PriceSeries {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut price = self.start_price;
        let mut prev_close: Option<f64> = None;

        let bars = dates
            .map(|date| {
                let ret = self.drift + self.volatility * standard_normal(&mut rng);
                price *= ret.exp();
                let close = price;
                let open = prev_close.unwrap_or(close);
                let high = open.max(close) * (1.0 + 0.001 * rng.gen::<f64>());
                let low = open.min(close) * (1.0 - 0.001 * rng.gen::<f64>());
                let volume = (1e6 * (0.5 + rng.gen::<f64>())) as u64;
                prev_close = Some(close);
                PriceBar::with_ohlcv(date, open, high, low, close, volume)
            })
            .collect();

        // Dates come from a strictly increasing iterator.
        PriceSeries::new(symbol, bars).unwrap_or_default()
    }
}

impl PriceHistoryProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn source(&self) -> DataSource {
        DataSource::Synthetic
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, DataError> {
        warn!(symbol, "generating synthetic prices; results are not real market history");
        let series = self.build(symbol, business_days(start).take_while(|d| *d <= end));
        non_empty(series, start, end)
    }
}

/// Box-Muller transform over two uniform draws.
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn business_days(from: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    from.iter_days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
}
