//! Simple Moving Average (SMA).
//!
//! Rolling mean of close prices over a lookback window.
//! Lookback: period - 1 (first valid value at index period-1).

use std::collections::VecDeque;

/// Incremental rolling mean over the last `period` values.
///
/// Keeps a compensated (Neumaier) running sum and a bounded queue, so each
/// push is O(1) and the accumulator can be fed one bar at a time. A window
/// whose values are all identical returns that value exactly, so two
/// windows over a flat stretch always tie.
#[derive(Debug, Clone)]
pub struct RollingMean {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
    compensation: f64,
    /// Length of the trailing run of identical values.
    run_len: usize,
}

impl RollingMean {
    /// # Panics
    ///
    /// Panics if `period` is zero. Callers taking a window from user input
    /// validate it first (see `CrossoverSignal::new`).
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
            compensation: 0.0,
            run_len: 0,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Push the next value and return the mean once the window is full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        if self.window.len() == self.period {
            if let Some(leaving) = self.window.pop_front() {
                self.add(-leaving);
            }
        }
        self.run_len = match self.window.back() {
            Some(&last) if last == value => self.run_len + 1,
            _ => 1,
        };
        self.window.push_back(value);
        self.add(value);
        self.value()
    }

    fn add(&mut self, x: f64) {
        let t = self.sum + x;
        if self.sum.abs() >= x.abs() {
            self.compensation += (self.sum - t) + x;
        } else {
            self.compensation += (x - t) + self.sum;
        }
        self.sum = t;
    }

    /// Current mean, or `None` during warm-up.
    pub fn value(&self) -> Option<f64> {
        if self.window.len() < self.period {
            return None;
        }
        if self.run_len >= self.period {
            return self.window.back().copied();
        }
        Some((self.sum + self.compensation) / self.period as f64)
    }

    pub fn is_warm(&self) -> bool {
        self.window.len() == self.period
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.sum = 0.0;
        self.compensation = 0.0;
        self.run_len = 0;
    }
}

/// Whole-series SMA: one entry per input, `None` until `period` values have
/// been seen.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut mean = RollingMean::new(period);
    values.iter().map(|&v| mean.push(v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn sma_5_basic() {
        let result = sma(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0], 5);

        assert_eq!(result.len(), 7);
        for (i, v) in result.iter().enumerate().take(4) {
            assert!(v.is_none(), "expected warm-up at index {i}");
        }
        // SMA[4] = mean(10,11,12,13,14) = 12.0
        assert_approx(result[4].unwrap(), 12.0, DEFAULT_EPSILON);
        // SMA[5] = mean(11,12,13,14,15) = 13.0
        assert_approx(result[5].unwrap(), 13.0, DEFAULT_EPSILON);
        assert_approx(result[6].unwrap(), 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_1_is_close() {
        let result = sma(&[100.0, 200.0, 300.0], 1);
        assert_eq!(result, vec![Some(100.0), Some(200.0), Some(300.0)]);
    }

    #[test]
    fn sma_too_few_values() {
        let result = sma(&[10.0, 11.0], 5);
        assert!(result.iter().all(Option::is_none));
    }

    #[test]
    fn rolling_matches_naive_window_mean() {
        let values: Vec<f64> = (0..200)
            .map(|i| 100.0 + (i as f64 * 0.37).sin() * 7.5 + (i % 7) as f64 * 0.13)
            .collect();
        let period = 13;
        let rolling = sma(&values, period);
        for i in (period - 1)..values.len() {
            let window = &values[i + 1 - period..=i];
            let naive = window.iter().sum::<f64>() / period as f64;
            assert_approx(rolling[i].unwrap(), naive, 1e-9);
        }
    }

    #[test]
    fn reset_restarts_warm_up() {
        let mut mean = RollingMean::new(2);
        mean.push(1.0);
        assert_eq!(mean.push(3.0), Some(2.0));
        assert!(mean.is_warm());
        mean.reset();
        assert!(!mean.is_warm());
        assert_eq!(mean.push(5.0), None);
    }

    #[test]
    fn constant_window_mean_is_exact() {
        for price in [3.3, 123.45, 0.1, 1.0 / 3.0, 987.654_321] {
            for period in [1, 3, 7, 20, 50, 200] {
                let result = sma(&vec![price; 2 * period + 5], period);
                for v in result.iter().skip(period - 1) {
                    assert_eq!(*v, Some(price), "price {price} period {period}");
                }
            }
        }
    }

    #[test]
    fn flat_stretch_after_movement_is_exact() {
        let mut values = vec![10.0, 11.7, 9.3, 14.1];
        values.extend(std::iter::repeat(3.3).take(6));
        let result = sma(&values, 3);
        assert_approx(result[5].unwrap(), (14.1 + 3.3 + 3.3) / 3.0, DEFAULT_EPSILON);
        assert_eq!(result[6], Some(3.3));
        assert_eq!(result[9], Some(3.3));
    }

    #[test]
    #[should_panic(expected = "SMA period must be >= 1")]
    fn zero_period_panics() {
        RollingMean::new(0);
    }
}
