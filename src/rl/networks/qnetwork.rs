//! MLP Q-network
//!
//! `STATE_DIM -> hidden... -> NUM_ACTIONS`, ReLU hidden layers, linear
//! output, Adam updates.

use burn::module::AutodiffModule;
use burn::nn::{Linear, Relu};
use burn::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

use super::backend::{
    adam, bellman_backups, input_tensor, td_update, value_rows, OptimizerStep, ValueModule,
};
use super::dense::{layer_sizes, DenseParams};
use super::scaling::InputScaling;
use super::{load_parameters, save_parameters, ActionValueEstimator, Architecture};
use super::{InferenceBackend, TrainingBackend};
use crate::error::QTraderError;
use crate::rl::core::{ActionValues, State, NUM_ACTIONS, STATE_DIM};
use crate::rl::memory::Transition;

/// Hidden layer widths used when none are configured
pub const DEFAULT_HIDDEN: [usize; 2] = [64, 64];

/// Q-network configuration
#[derive(Config, Debug)]
pub struct QNetConfig {
    /// Hidden layer widths
    pub hidden: Vec<usize>,
    /// Input features
    #[config(default = "2")]
    pub input_dim: usize,
    /// Discrete actions
    #[config(default = "3")]
    pub num_actions: usize,
}

impl QNetConfig {
    /// Xavier-initialized network drawing weights from `rng`
    pub fn init<B: Backend, R: Rng + ?Sized>(&self, rng: &mut R, device: &B::Device) -> QNet<B> {
        let mut hidden = Vec::with_capacity(self.hidden.len());
        let mut d_input = self.input_dim;
        for &width in &self.hidden {
            hidden.push(DenseParams::xavier(d_input, width, rng));
            d_input = width;
        }
        let head = DenseParams::xavier(d_input, self.num_actions, rng);
        QNet::from_params(&hidden, &head, device)
    }
}

/// Action-value MLP
#[derive(Module, Debug)]
pub struct QNet<B: Backend> {
    hidden: Vec<Linear<B>>,
    head: Linear<B>,
    activation: Relu,
}

impl<B: Backend> QNet<B> {
    fn from_params(hidden: &[DenseParams], head: &DenseParams, device: &B::Device) -> Self {
        Self {
            hidden: hidden.iter().map(|p| p.to_linear(device)).collect(),
            head: head.to_linear(device),
            activation: Relu::new(),
        }
    }

    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = input;
        for layer in &self.hidden {
            x = self.activation.forward(layer.forward(x));
        }
        self.head.forward(x)
    }

    pub fn params(&self) -> Vec<DenseParams> {
        self.hidden
            .iter()
            .chain(std::iter::once(&self.head))
            .map(DenseParams::from_linear)
            .collect()
    }
}

impl<B: Backend> ValueModule<B> for QNet<B> {
    fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        QNet::forward(self, input)
    }
}

#[derive(Serialize, Deserialize)]
struct QNetworkParams {
    layers: Vec<DenseParams>,
    #[serde(default)]
    scaling: Option<InputScaling>,
}

pub struct QNetwork {
    model: QNet<TrainingBackend>,
    optimizer: OptimizerStep<QNet<TrainingBackend>>,
    hidden: Vec<usize>,
    learning_rate: f64,
    scaling: Option<InputScaling>,
}

impl QNetwork {
    pub const KIND: &'static str = "mlp";
    pub const VERSION: u32 = 1;

    /// Randomly initialized network with the given hidden widths
    pub fn new<R: Rng + ?Sized>(hidden: &[usize], learning_rate: f64, rng: &mut R) -> crate::error::Result<Self> {
        if hidden.contains(&0) {
            return Err(QTraderError::Validation(format!(
                "hidden layer widths must be > 0, got {hidden:?}"
            )));
        }
        let model = QNetConfig::new(hidden.to_vec())
            .with_input_dim(STATE_DIM)
            .with_num_actions(NUM_ACTIONS)
            .init(rng, &Default::default());

        Ok(Self {
            model,
            optimizer: adam(learning_rate),
            hidden: hidden.to_vec(),
            learning_rate,
            scaling: None,
        })
    }

    /// `2 -> 64 -> 64 -> 3`
    pub fn with_default_layout<R: Rng + ?Sized>(learning_rate: f64, rng: &mut R) -> crate::error::Result<Self> {
        Self::new(&DEFAULT_HIDDEN, learning_rate, rng)
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Current layer parameters, output head last
    pub fn parameters(&self) -> Vec<DenseParams> {
        self.model.params()
    }

    pub fn scaling(&self) -> Option<&InputScaling> {
        self.scaling.as_ref()
    }
}

impl Clone for QNetwork {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            optimizer: adam(self.learning_rate),
            hidden: self.hidden.clone(),
            learning_rate: self.learning_rate,
            scaling: self.scaling,
        }
    }
}

impl fmt::Debug for QNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QNetwork")
            .field("architecture", &self.architecture().to_string())
            .field("learning_rate", &self.learning_rate)
            .field("scaling", &self.scaling)
            .finish()
    }
}

impl ActionValueEstimator for QNetwork {
    fn architecture(&self) -> Architecture {
        let mut layers = Vec::with_capacity(self.hidden.len() + 2);
        layers.push(STATE_DIM);
        layers.extend_from_slice(&self.hidden);
        layers.push(NUM_ACTIONS);
        Architecture::new(Self::KIND, Self::VERSION, layers)
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
        debug!(batch = batch.len(), loss, "q-network update");
        loss
    }

    fn sync_from(&mut self, source: &Self) {
        self.model = source.model.clone();
        self.scaling = source.scaling;
    }

    fn is_finite(&self) -> bool {
        self.parameters().iter().all(DenseParams::is_finite)
    }

    fn save(&self, path: &Path) -> crate::error::Result<()> {
        if !self.is_finite() {
            return Err(QTraderError::Validation(
                "refusing to save non-finite q-network parameters".to_string(),
            ));
        }
        let params = QNetworkParams {
            layers: self.parameters(),
            scaling: self.scaling,
        };
        save_parameters(path, &self.architecture(), &params)
    }

    fn load(&mut self, path: &Path) -> crate::error::Result<()> {
        let expected = self.architecture();
        let params: QNetworkParams = load_parameters(path, &expected)?;
        let incompatible = |found: String| QTraderError::IncompatibleCheckpoint {
            expected: expected.to_string(),
            found,
        };

        let sizes = layer_sizes(&params.layers).map_err(incompatible)?;
        if sizes != expected.layers {
            return Err(incompatible(format!("layer sizes {sizes:?}")));
        }
        if params.scaling.is_some_and(|s| !s.is_valid()) {
            return Err(incompatible("invalid input scaling".to_string()));
        }
        let Some((head, hidden)) = params.layers.split_last() else {
            return Err(incompatible("no layers".to_string()));
        };

        self.model = QNet::from_params(hidden, head, &Default::default());
        self.scaling = params.scaling;
        self.optimizer = adam(self.learning_rate);
        Ok(())
    }

    fn fit_input_scaling(&mut self, states: &[State]) -> crate::error::Result<()> {
        self.scaling = Some(InputScaling::fit(states)?);
        Ok(())
    }

    fn has_input_scaling(&self) -> bool {
        self.scaling.is_some()
    }
}
