//! Action-Value Estimators
//!
//! Function approximators mapping a [`State`] to one value per action. The
//! trainer and evaluator only talk to the [`ActionValueEstimator`] trait, so
//! implementations can be swapped without touching either.

mod backend;
mod dense;
mod linear;
mod persist;
mod qnetwork;
mod scaling;

pub use backend::{InferenceBackend, TrainingBackend};
pub use dense::DenseParams;
pub use linear::{LinearEstimator, LinearQ};
pub use persist::{load_parameters, read_architecture, save_parameters, Architecture};
pub use qnetwork::{QNet, QNetConfig, QNetwork};
pub use scaling::InputScaling;

use std::path::Path;

use crate::error::Result;
use crate::rl::core::{Action, ActionValues, State};
use crate::rl::memory::Transition;

/// Capability interface for Q-value estimators.
///
/// Clones share parameters by value but never optimizer state.
pub trait ActionValueEstimator: Clone + Send {
    /// Descriptor written next to persisted parameters
    fn architecture(&self) -> Architecture;

    /// `[v_BUY, v_SELL, v_HOLD]` for `state`. Pure.
    fn evaluate(&self, state: &State) -> ActionValues;

    /// Values for several states at once
    fn evaluate_batch(&self, states: &[State]) -> Vec<ActionValues> {
        states.iter().map(|s| self.evaluate(s)).collect()
    }

    /// One gradient update toward `reward + gamma * max(target(next_state))`.
    ///
    /// Only the taken action's output is regressed; the error on the other
    /// outputs is zero. Returns the mean squared TD error of the batch.
    fn train_step(&mut self, batch: &[Transition], target: &Self, gamma: f64) -> f64;

    /// Overwrite all parameters with a deep copy of `source`'s.
    fn sync_from(&mut self, source: &Self);

    /// Every parameter is finite
    fn is_finite(&self) -> bool;

    fn save(&self, path: &Path) -> Result<()>;

    /// Replace parameters from `path`. Fails with
    /// [`crate::error::QTraderError::IncompatibleCheckpoint`] when the stored
    /// architecture differs from this estimator's.
    fn load(&mut self, path: &Path) -> Result<()>;

    /// Fit input normalization from observed states. No-op by default.
    fn fit_input_scaling(&mut self, _states: &[State]) -> Result<()> {
        Ok(())
    }

    fn has_input_scaling(&self) -> bool {
        false
    }

    /// Greedy action; ties go to the lowest action index
    fn greedy_action(&self, state: &State) -> Action {
        Action::greedy(&self.evaluate(state))
    }
}
