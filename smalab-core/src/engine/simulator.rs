//! Long/flat trade simulator.
//!
//! Two states, FLAT and LONG. An enter transition while flat buys with all
//! capital; an exit transition while long sells everything. Transitions that
//! point at the state already held are ignored.

use tracing::debug;

use super::error::EngineError;
use super::state::{EngineState, PositionState};
use crate::domain::{PositionSnapshot, PriceBar, Trade, TradeSide};
use crate::signals::{SignalPoint, Transition};

#[derive(Debug, Clone)]
pub struct TradeSimulator {
    state: EngineState,
    trades: Vec<Trade>,
    snapshots: Vec<PositionSnapshot>,
    bar_index: usize,
}

impl TradeSimulator {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            state: EngineState::new(initial_capital),
            trades: Vec::new(),
            snapshots: Vec::new(),
            bar_index: 0,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn snapshots(&self) -> &[PositionSnapshot] {
        &self.snapshots
    }

    /// Process one bar. The bar's close must already be known to be
    /// positive and finite.
    ///
    /// Returns the execution made on this bar, if any. A fill whose share
    /// count or proceeds is zero or not finite fails the bar and leaves the
    /// state untouched.
    pub fn on_bar(
        &mut self,
        bar: &PriceBar,
        point: &SignalPoint,
    ) -> Result<Option<&Trade>, EngineError> {
        let side = match (point.transition, self.state.position) {
            (Transition::Enter, PositionState::Flat) => {
                let shares = self.state.capital / bar.close;
                if !(shares.is_finite() && shares > 0.0) {
                    return Err(EngineError::DegenerateShares {
                        index: self.bar_index,
                        date: bar.date,
                        capital: self.state.capital,
                        price: bar.close,
                    });
                }
                self.state.shares = shares;
                self.state.position = PositionState::Long;
                Some(TradeSide::Buy)
            }
            (Transition::Exit, PositionState::Long) => {
                let proceeds = self.state.shares * bar.close;
                if !(proceeds.is_finite() && proceeds > 0.0) {
                    return Err(EngineError::DegenerateProceeds {
                        index: self.bar_index,
                        date: bar.date,
                        shares: self.state.shares,
                        price: bar.close,
                    });
                }
                self.state.capital = proceeds;
                Some(TradeSide::Sell)
            }
            _ => None,
        };
        if let Some(side) = side {
            self.record(bar, side);
            if side == TradeSide::Sell {
                self.state.shares = 0.0;
                self.state.position = PositionState::Flat;
            }
        }

        self.snapshots.push(PositionSnapshot {
            date: bar.date,
            capital: self.state.capital,
            price: bar.close,
            shares: self.state.shares,
        });
        self.bar_index += 1;

        Ok(side.and_then(|_| self.trades.last()))
    }

    fn record(&mut self, bar: &PriceBar, side: TradeSide) {
        let trade = Trade {
            date: bar.date,
            bar_index: self.bar_index,
            side,
            price: bar.close,
            shares: self.state.shares,
        };
        debug!(
            date = %trade.date,
            side = %trade.side,
            price = trade.price,
            shares = trade.shares,
            capital = self.state.capital,
            "execution"
        );
        self.trades.push(trade);
    }

    pub fn finish(self) -> (Vec<Trade>, Vec<PositionSnapshot>, EngineState) {
        (self.trades, self.snapshots, self.state)
    }
}
