//! Single-position long-only simulator.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{QTraderError, Result};
use crate::rl::core::Action;

/// Position state; an entry price exists only while long
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PositionState {
    Flat,
    Long { entry_price: f64 },
}

impl Default for PositionState {
    fn default() -> Self {
        Self::Flat
    }
}

/// A closed round trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl: f64,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

/// Output of a replay
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    /// Cumulative realized PnL after each tick
    pub equity_curve: Vec<f64>,
    pub trades: Vec<Trade>,
    /// Position left open at the end of the series
    pub final_state: PositionState,
}

impl SimulationResult {
    pub fn total_pnl(&self) -> f64 {
        self.equity_curve.last().copied().unwrap_or(0.0)
    }
}

/// Replays actions against prices:
/// - `Flat` + BUY opens a long at the current price
/// - `Long` + SELL realizes `price - entry_price` and goes flat
/// - every other pair is a no-op
#[derive(Debug, Clone, Default)]
pub struct PositionSimulator {
    state: PositionState,
    entry_index: usize,
    realized: f64,
    trades: Vec<Trade>,
    equity_curve: Vec<f64>,
}

impl PositionSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PositionState {
        self.state
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized
    }

    pub fn equity_curve(&self) -> &[f64] {
        &self.equity_curve
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Apply one tick. Returns the trade closed on this tick, if any.
    ///
    /// A non-finite price never opens or closes a position.
    pub fn apply(&mut self, price: f64, action: Action) -> Option<Trade> {
        let index = self.equity_curve.len();
        let mut closed = None;

        if !price.is_finite() {
            if action != Action::Hold {
                warn!(index, price, %action, "Ignoring action on non-finite price");
            }
        } else {
            match (self.state, action) {
                (PositionState::Flat, Action::Buy) => {
                    self.state = PositionState::Long { entry_price: price };
                    self.entry_index = index;
                    debug!(index, price, "Opened long");
                }
                (PositionState::Long { entry_price }, Action::Sell) => {
                    let trade = Trade {
                        entry_index: self.entry_index,
                        exit_index: index,
                        entry_price,
                        exit_price: price,
                        pnl: price - entry_price,
                    };
                    self.realized += trade.pnl;
                    self.state = PositionState::Flat;
                    debug!(index, price, pnl = trade.pnl, "Closed long");
                    self.trades.push(trade.clone());
                    closed = Some(trade);
                }
                _ => {}
            }
        }

        self.equity_curve.push(self.realized);
        closed
    }

    pub fn into_result(self) -> SimulationResult {
        SimulationResult {
            equity_curve: self.equity_curve,
            trades: self.trades,
            final_state: self.state,
        }
    }

    /// Replay equal-length price and action sequences from a flat start
    pub fn run(prices: &[f64], actions: &[Action]) -> Result<SimulationResult> {
        if prices.len() != actions.len() {
            return Err(QTraderError::InputLengthMismatch {
                prices: prices.len(),
                actions: actions.len(),
            });
        }

        let mut sim = Self::new();
        for (price, action) in prices.iter().zip(actions.iter()) {
            sim.apply(*price, *action);
        }
        Ok(sim.into_result())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Action::{Buy, Hold, Sell};

    #[test]
    fn test_round_trips() {
        let prices = [100.0, 102.0, 101.0, 105.0, 103.0, 107.0];
        let actions = [Buy, Hold, Hold, Sell, Buy, Sell];
        let result = PositionSimulator::run(&prices, &actions).unwrap();

        assert_eq!(result.equity_curve, vec![0.0, 0.0, 0.0, 5.0, 5.0, 9.0]);
        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].entry_index, 0);
        assert_eq!(result.trades[0].exit_index, 3);
        assert_eq!(result.trades[1].pnl, 4.0);
        assert_eq!(result.total_pnl(), 9.0);
        assert_eq!(result.final_state, PositionState::Flat);
    }

    #[test]
    fn test_invalid_pairs_are_noops() {
        let mut sim = PositionSimulator::new();
        assert!(sim.apply(100.0, Sell).is_none());
        assert_eq!(sim.state(), PositionState::Flat);

        sim.apply(100.0, Buy);
        // second BUY does not move the entry
        sim.apply(90.0, Buy);
        assert_eq!(sim.state(), PositionState::Long { entry_price: 100.0 });

        let trade = sim.apply(95.0, Sell).unwrap();
        assert_eq!(trade.pnl, -5.0);
        assert!(!trade.is_win());
        assert_eq!(sim.equity_curve(), &[0.0, 0.0, 0.0, -5.0]);
    }

    #[test]
    fn test_open_position_is_not_realized() {
        let result = PositionSimulator::run(&[100.0, 150.0], &[Buy, Hold]).unwrap();
        assert_eq!(result.equity_curve, vec![0.0, 0.0]);
        assert_eq!(
            result.final_state,
            PositionState::Long { entry_price: 100.0 }
        );
    }

    #[test]
    fn test_non_finite_price_ignored() {
        let result =
            PositionSimulator::run(&[f64::NAN, 100.0, f64::INFINITY, 101.0], &[Buy, Buy, Sell, Sell])
                .unwrap();
        assert_eq!(result.equity_curve, vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_length_mismatch() {
        match PositionSimulator::run(&[1.0, 2.0], &[Buy]) {
            Err(QTraderError::InputLengthMismatch { prices, actions }) => {
                assert_eq!((prices, actions), (2, 1));
            }
            other => panic!("expected InputLengthMismatch, got {other:?}"),
        }
    }
}
