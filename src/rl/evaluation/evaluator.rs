//! Greedy policy evaluation over a tick series.

use std::path::Path;
use tracing::{debug, info};

use super::report::BacktestReport;
use super::simulator::PositionSimulator;
use crate::domain::{prices, Tick};
use crate::error::Result;
use crate::rl::core::{Action, State};
use crate::rl::networks::ActionValueEstimator;

/// Replay an externally supplied action sequence and derive metrics.
///
/// Fails with `InputLengthMismatch` unless both sequences have equal length.
pub fn evaluate_actions(prices: &[f64], actions: &[Action]) -> Result<BacktestReport> {
    let result = PositionSimulator::run(prices, actions)?;
    Ok(BacktestReport::from_simulation(&result, actions))
}

/// Runs a frozen estimator greedily; never trains it.
#[derive(Debug, Clone)]
pub struct Evaluator<E: ActionValueEstimator> {
    estimator: E,
}

impl<E: ActionValueEstimator> Evaluator<E> {
    pub fn new(estimator: E) -> Self {
        Self { estimator }
    }

    /// Load persisted parameters into `estimator`, which must already have
    /// the architecture they were saved with.
    pub fn from_checkpoint(mut estimator: E, path: &Path) -> Result<Self> {
        estimator.load(path)?;
        info!(
            "Loaded {} estimator from {:?}",
            estimator.architecture(),
            path
        );
        Ok(Self::new(estimator))
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    /// Greedy decision for one tick; HOLD on a non-finite tick
    pub fn predict(&self, tick: &Tick) -> Action {
        let state = State::from_tick(tick);
        if !state.is_finite() {
            return Action::Hold;
        }
        let action = self.estimator.greedy_action(&state);
        debug!(
            timestamp = tick.timestamp,
            price = tick.price,
            volume = tick.volume,
            %action,
            "Prediction"
        );
        action
    }

    pub fn policy_actions(&self, ticks: &[Tick]) -> Vec<Action> {
        ticks.iter().map(|t| self.predict(t)).collect()
    }

    /// Greedy action for every tick, replayed through the simulator
    pub fn evaluate(&self, ticks: &[Tick]) -> Result<BacktestReport> {
        let actions = self.policy_actions(ticks);
        let report = evaluate_actions(&prices(ticks), &actions)?;
        info!(
            "Backtest: PnL {:.4}, Sharpe {:.4}, win rate {:.4}, {} trades",
            report.pnl, report.sharpe_ratio, report.win_rate, report.trades
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QTraderError;
    use crate::rl::networks::{LinearEstimator, QNetwork};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::env::temp_dir;

    #[test]
    fn test_all_hold_sequence() {
        let prices = [100.0, 90.0, 120.0, 80.0];
        let report = evaluate_actions(&prices, &[Action::Hold; 4]).unwrap();
        assert_eq!(report.pnl, 0.0);
        assert_eq!(report.win_rate, 0.0);
        assert_eq!(report.sharpe_ratio, 0.0);
        assert_eq!(report.equity_curve, vec![0.0; 4]);
    }

    #[test]
    fn test_length_mismatch() {
        let err = evaluate_actions(&[1.0, 2.0, 3.0], &[Action::Buy]).unwrap_err();
        assert!(matches!(err, QTraderError::InputLengthMismatch { .. }));
    }

    #[test]
    fn test_greedy_policy_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(21);
        let evaluator = Evaluator::new(LinearEstimator::new(0.01, &mut rng).unwrap());
        let ticks: Vec<Tick> = (0..20)
            .map(|i| Tick::new(i as f64, "BTCUSDT", 100.0 + i as f64, 1.0))
            .collect();

        let first = evaluator.evaluate(&ticks).unwrap();
        let second = evaluator.evaluate(&ticks).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.actions.len(), 20);
        assert_eq!(
            evaluator.predict(&Tick::new(0.0, "BTCUSDT", f64::NAN, 1.0)),
            Action::Hold
        );
    }

    #[test]
    fn test_from_checkpoint_requires_same_architecture() {
        let path = temp_dir().join("qtrader_evaluator_ckpt.json");
        let mut rng = StdRng::seed_from_u64(22);
        let trained = QNetwork::with_default_layout(0.001, &mut rng).unwrap();
        trained.save(&path).unwrap();

        let fresh = QNetwork::with_default_layout(0.001, &mut rng).unwrap();
        let evaluator = Evaluator::from_checkpoint(fresh, &path).unwrap();
        let tick = Tick::new(0.0, "BTCUSDT", 1.5, 0.5);
        assert_eq!(
            evaluator.estimator().evaluate(&State::from_tick(&tick)),
            trained.evaluate(&State::from_tick(&tick))
        );

        let linear = LinearEstimator::new(0.01, &mut rng).unwrap();
        assert!(matches!(
            Evaluator::from_checkpoint(linear, &path),
            Err(QTraderError::IncompatibleCheckpoint { .. })
        ));
        let _ = std::fs::remove_file(&path);
    }
}
