//! Dense layer parameters in a serializable form, and their conversion to and
//! from `burn` linear layers.

use burn::module::Param;
use burn::nn::Linear;
use burn::prelude::*;
use burn::tensor::TensorData;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Weights and bias of one fully connected layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseParams {
    pub d_input: usize,
    pub d_output: usize,
    /// Row-major `[d_input, d_output]`
    pub weight: Vec<f64>,
    pub bias: Vec<f64>,
}

impl DenseParams {
    /// Xavier-uniform weights and a zero bias drawn from `rng`
    pub fn xavier<R: Rng + ?Sized>(d_input: usize, d_output: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (d_input + d_output) as f64).sqrt();
        let weight = (0..d_input * d_output)
            .map(|_| rng.gen_range(-limit..limit))
            .collect();
        Self {
            d_input,
            d_output,
            weight,
            bias: vec![0.0; d_output],
        }
    }

    pub fn from_linear<B: Backend>(linear: &Linear<B>) -> Self {
        let weight = linear.weight.val();
        let [d_input, d_output] = weight.dims();
        let bias = match &linear.bias {
            Some(bias) => bias.val().into_data().iter::<f64>().collect(),
            None => vec![0.0; d_output],
        };
        Self {
            d_input,
            d_output,
            weight: weight.into_data().iter::<f64>().collect(),
            bias,
        }
    }

    pub fn to_linear<B: Backend>(&self, device: &B::Device) -> Linear<B> {
        let weight = Tensor::<B, 2>::from_data(
            TensorData::new(self.weight.clone(), [self.d_input, self.d_output]),
            device,
        );
        let bias = Tensor::<B, 1>::from_data(TensorData::new(self.bias.clone(), [self.d_output]), device);
        Linear {
            weight: Param::from_tensor(weight),
            bias: Some(Param::from_tensor(bias)),
        }
    }

    /// Shape consistency and finiteness
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.d_input == 0 || self.d_output == 0 {
            return Err(format!("empty layer {}x{}", self.d_input, self.d_output));
        }
        if self.weight.len() != self.d_input * self.d_output {
            return Err(format!(
                "weight len {} != {}x{}",
                self.weight.len(),
                self.d_input,
                self.d_output
            ));
        }
        if self.bias.len() != self.d_output {
            return Err(format!("bias len {} != {}", self.bias.len(), self.d_output));
        }
        if !self.is_finite() {
            return Err("non-finite parameters".to_string());
        }
        Ok(())
    }

    pub fn is_finite(&self) -> bool {
        self.weight.iter().chain(self.bias.iter()).all(|v| v.is_finite())
    }
}

/// Check a stacked layer list: each layer's input width is the previous
/// layer's output width. Returns `[input, out_1, .., out_n]`.
pub(crate) fn layer_sizes(layers: &[DenseParams]) -> std::result::Result<Vec<usize>, String> {
    let Some(first) = layers.first() else {
        return Err("no layers".to_string());
    };
    let mut sizes = vec![first.d_input];
    for layer in layers {
        layer.validate()?;
        if layer.d_input != *sizes.last().unwrap_or(&0) {
            return Err(format!(
                "layer expects {} inputs, previous layer has {} outputs",
                layer.d_input,
                sizes.last().unwrap_or(&0)
            ));
        }
        sizes.push(layer.d_output);
    }
    Ok(sizes)
}
