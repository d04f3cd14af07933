//! Tensor backend, optimizers and the batched TD objective shared by the
//! estimators.

use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer, SgdConfig};
use burn::prelude::*;
use burn::tensor::{ElementConversion, TensorData};

use super::scaling::{scaled_rows, InputScaling};
use crate::rl::core::{ActionValues, State, NUM_ACTIONS, STATE_DIM};
use crate::rl::memory::Transition;

/// CPU backend used for inference and as the inner training backend
pub type InferenceBackend = NdArray<f64>;

/// Backend carrying gradients for updates
pub type TrainingBackend = Autodiff<InferenceBackend>;

/// Optimizer step bound to one module type and learning rate
pub(crate) type OptimizerStep<M> = Box<dyn FnMut(M, GradientsParams) -> M + Send>;

/// Modules mapping `[batch, STATE_DIM]` inputs to `[batch, NUM_ACTIONS]` values
pub(crate) trait ValueModule<B: Backend>: Module<B> {
    fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2>;
}

pub(crate) fn adam<M>(learning_rate: f64) -> OptimizerStep<M>
where
    M: AutodiffModule<TrainingBackend> + 'static,
{
    let mut optimizer = AdamConfig::new().init::<TrainingBackend, M>();
    Box::new(move |module, grads| optimizer.step(learning_rate, module, grads))
}

pub(crate) fn sgd<M>(learning_rate: f64) -> OptimizerStep<M>
where
    M: AutodiffModule<TrainingBackend> + 'static,
{
    let mut optimizer = SgdConfig::new().init::<TrainingBackend, M>();
    Box::new(move |module, grads| optimizer.step(learning_rate, module, grads))
}

/// `[batch, STATE_DIM]` input tensor, scaled when `scaling` is set
pub(crate) fn input_tensor<B: Backend>(
    states: &[State],
    scaling: Option<&InputScaling>,
    device: &B::Device,
) -> Tensor<B, 2> {
    let rows = scaled_rows(states, scaling);
    Tensor::from_data(TensorData::new(rows, [states.len(), STATE_DIM]), device)
}

/// Split a `[batch, NUM_ACTIONS]` output into per-state values
pub(crate) fn value_rows<B: Backend>(output: Tensor<B, 2>) -> Vec<ActionValues> {
    let flat: Vec<f64> = output.into_data().iter::<f64>().collect();
    flat.chunks_exact(NUM_ACTIONS)
        .map(|chunk| {
            let mut values = [0.0; NUM_ACTIONS];
            values.copy_from_slice(chunk);
            values
        })
        .collect()
}

/// `reward + gamma * max_a target(next_state)` for every transition
pub(crate) fn bellman_backups(
    batch: &[Transition],
    next_values: &[ActionValues],
    gamma: f64,
) -> Vec<f64> {
    batch
        .iter()
        .zip(next_values)
        .map(|(t, values)| {
            let best = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            t.reward + gamma * best
        })
        .collect()
}

/// Mean squared error between each taken action's value and its backup.
/// The other action outputs take no part in the loss.
pub(crate) fn td_loss<B: Backend>(
    q_values: Tensor<B, 2>,
    batch: &[Transition],
    backups: Vec<f64>,
) -> Tensor<B, 1> {
    let device = q_values.device();
    let n = batch.len();
    let actions: Vec<i64> = batch.iter().map(|t| t.action.to_index() as i64).collect();
    let actions = Tensor::<B, 2, Int>::from_data(TensorData::new(actions, [n, 1]), &device);
    let backups = Tensor::<B, 2>::from_data(TensorData::new(backups, [n, 1]), &device);

    let taken = q_values.gather(1, actions);
    (taken - backups).powf_scalar(2.0).mean()
}

/// One gradient step on `module` toward `backups`. Returns the updated module
/// and the batch loss; a non-finite loss leaves the module untouched.
pub(crate) fn td_update<M>(
    module: M,
    step: &mut OptimizerStep<M>,
    input: Tensor<TrainingBackend, 2>,
    batch: &[Transition],
    backups: Vec<f64>,
) -> (M, f64)
where
    M: ValueModule<TrainingBackend> + AutodiffModule<TrainingBackend>,
{
    let loss = td_loss(module.forward(input), batch, backups);
    let value = loss.clone().into_scalar().elem::<f64>();
    if !value.is_finite() {
        return (module, value);
    }

    let grads = GradientsParams::from_grads(loss.backward(), &module);
    (step(module, grads), value)
}
