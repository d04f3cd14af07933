//! Linear action-value estimator: one weight column and bias per action,
//! trained with plain SGD.

use burn::module::AutodiffModule;
use burn::nn::Linear;
use burn::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use super::backend::{
    bellman_backups, input_tensor, sgd, td_update, value_rows, OptimizerStep, ValueModule,
};
use super::dense::DenseParams;
use super::scaling::InputScaling;
use super::{load_parameters, save_parameters, ActionValueEstimator, Architecture};
use super::{InferenceBackend, TrainingBackend};
use crate::error::{QTraderError, Result};
use crate::rl::core::{ActionValues, State, NUM_ACTIONS, STATE_DIM};
use crate::rl::memory::Transition;

/// `[batch, STATE_DIM] -> [batch, NUM_ACTIONS]` affine map
#[derive(Module, Debug)]
pub struct LinearQ<B: Backend> {
    linear: Linear<B>,
}

impl<B: Backend> LinearQ<B> {
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.linear.forward(input)
    }

    pub fn params(&self) -> DenseParams {
        DenseParams::from_linear(&self.linear)
    }
}

impl<B: Backend> ValueModule<B> for LinearQ<B> {
    fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        LinearQ::forward(self, input)
    }
}

#[derive(Serialize, Deserialize)]
struct LinearParams {
    layer: DenseParams,
    #[serde(default)]
    scaling: Option<InputScaling>,
}

pub struct LinearEstimator {
    model: LinearQ<TrainingBackend>,
    optimizer: OptimizerStep<LinearQ<TrainingBackend>>,
    learning_rate: f64,
    scaling: Option<InputScaling>,
}

impl LinearEstimator {
    pub const KIND: &'static str = "linear";
    pub const VERSION: u32 = 1;

    pub fn new<R: Rng + ?Sized>(learning_rate: f64, rng: &mut R) -> Result<Self> {
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(QTraderError::Validation(format!(
                "learning_rate must be positive, got {learning_rate}"
            )));
        }
        let params = DenseParams::xavier(STATE_DIM, NUM_ACTIONS, rng);
        Ok(Self {
            model: LinearQ {
                linear: params.to_linear(&Default::default()),
            },
            optimizer: sgd(learning_rate),
            learning_rate,
            scaling: None,
        })
    }

    pub fn parameters(&self) -> DenseParams {
        self.model.params()
    }

    pub fn scaling(&self) -> Option<&InputScaling> {
        self.scaling.as_ref()
    }
}

impl Clone for LinearEstimator {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            optimizer: sgd(self.learning_rate),
            learning_rate: self.learning_rate,
            scaling: self.scaling,
        }
    }
}

impl fmt::Debug for LinearEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearEstimator")
            .field("learning_rate", &self.learning_rate)
            .field("scaling", &self.scaling)
            .finish()
    }
}

impl ActionValueEstimator for LinearEstimator {
    fn architecture(&self) -> Architecture {
        Architecture::new(Self::KIND, Self::VERSION, vec![STATE_DIM, NUM_ACTIONS])
    }

    fn evaluate(&self, state: &State) -> ActionValues {
        self.evaluate_batch(std::slice::from_ref(state))
            .pop()
            .unwrap_or([0.0; NUM_ACTIONS])
    }

    fn evaluate_batch(&self, states: &[State]) -> Vec<ActionValues> {
        if states.is_empty() {
            return Vec::new();
        }
        let model = self.model.valid();
        let input =
            input_tensor::<InferenceBackend>(states, self.scaling.as_ref(), &Default::default());
        value_rows(model.forward(input))
    }

    fn train_step(&mut self, batch: &[Transition], target: &Self, gamma: f64) -> f64 {
        if batch.is_empty() {
            return 0.0;
        }
        let next_states: Vec<State> = batch.iter().map(|t| t.next_state).collect();
        let backups = bellman_backups(batch, &target.evaluate_batch(&next_states), gamma);

        let states: Vec<State> = batch.iter().map(|t| t.state).collect();
        let input =
            input_tensor::<TrainingBackend>(&states, self.scaling.as_ref(), &Default::default());
        let (model, loss) = td_update(
            self.model.clone(),
            &mut self.optimizer,
            input,
            batch,
            backups,
        );
        self.model = model;
        loss
    }

    fn sync_from(&mut self, source: &Self) {
        self.model = source.model.clone();
        self.scaling = source.scaling;
    }

    fn is_finite(&self) -> bool {
        self.parameters().is_finite()
    }

    fn save(&self, path: &Path) -> Result<()> {
        if !self.is_finite() {
            return Err(QTraderError::Validation(
                "refusing to save non-finite linear parameters".to_string(),
            ));
        }
        let params = LinearParams {
            layer: self.parameters(),
            scaling: self.scaling,
        };
        save_parameters(path, &self.architecture(), &params)
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let expected = self.architecture();
        let params: LinearParams = load_parameters(path, &expected)?;
        let incompatible = |found: String| QTraderError::IncompatibleCheckpoint {
            expected: expected.to_string(),
            found,
        };

        params.layer.validate().map_err(incompatible)?;
        if [params.layer.d_input, params.layer.d_output] != [STATE_DIM, NUM_ACTIONS] {
            return Err(incompatible(format!(
                "layer {}x{}",
                params.layer.d_input, params.layer.d_output
            )));
        }
        if params.scaling.is_some_and(|s| !s.is_valid()) {
            return Err(incompatible("invalid input scaling".to_string()));
        }

        self.model = LinearQ {
            linear: params.layer.to_linear(&Default::default()),
        };
        self.scaling = params.scaling;
        self.optimizer = sgd(self.learning_rate);
        Ok(())
    }

    fn fit_input_scaling(&mut self, states: &[State]) -> Result<()> {
        self.scaling = Some(InputScaling::fit(states)?);
        Ok(())
    }

    fn has_input_scaling(&self) -> bool {
        self.scaling.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::core::Action;
    use crate::rl::networks::QNetwork;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::env::temp_dir;

    #[test]
    fn test_only_taken_action_is_regressed() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut live = LinearEstimator::new(0.1, &mut rng).unwrap();
        let target = live.clone();
        let state = State::new(0.3, -0.1);
        let before = live.evaluate(&state);

        let batch = vec![Transition::new(state, Action::Sell, 1.0, state)];
        live.train_step(&batch, &target, 0.0);
        let after = live.evaluate(&state);

        // separate weight columns per action: untouched outputs stay put
        assert_eq!(after[Action::Buy.to_index()], before[Action::Buy.to_index()]);
        assert_eq!(after[Action::Hold.to_index()], before[Action::Hold.to_index()]);
        let err_before = (before[1] - 1.0).abs();
        let err_after = (after[1] - 1.0).abs();
        assert!(err_after < err_before);
    }

    #[test]
    fn test_save_load_keeps_scaling() {
        let path = temp_dir().join("qtrader_linear_roundtrip.json");
        let mut rng = StdRng::seed_from_u64(12);
        let mut saved = LinearEstimator::new(0.01, &mut rng).unwrap();
        saved
            .fit_input_scaling(&[State::new(41990.0, 1.0), State::new(42010.0, 3.0)])
            .unwrap();
        saved.save(&path).unwrap();

        let mut restored = LinearEstimator::new(0.01, &mut rng).unwrap();
        restored.load(&path).unwrap();
        assert_eq!(restored.parameters(), saved.parameters());
        assert_eq!(restored.scaling(), saved.scaling());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_loading_mlp_blob_fails() {
        let path = temp_dir().join("qtrader_linear_vs_mlp.json");
        let mut rng = StdRng::seed_from_u64(10);
        QNetwork::with_default_layout(0.001, &mut rng)
            .unwrap()
            .save(&path)
            .unwrap();

        let mut linear = LinearEstimator::new(0.01, &mut rng).unwrap();
        let err = linear.load(&path).unwrap_err();
        assert!(matches!(err, QTraderError::IncompatibleCheckpoint { .. }));
        let _ = std::fs::remove_file(&path);
    }
}
