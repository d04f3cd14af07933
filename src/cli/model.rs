//! Open a saved model of whichever estimator family it was written by.

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;

use crate::domain::Tick;
use crate::rl::config::TrainerConfig;
use crate::rl::evaluation::{BacktestReport, Evaluator};
use crate::rl::networks::{read_architecture, Architecture, LinearEstimator, QNetwork};

/// A frozen policy loaded from disk
pub enum LoadedModel {
    Mlp(Evaluator<QNetwork>),
    Linear(Evaluator<LinearEstimator>),
}

impl LoadedModel {
    pub fn open(path: &Path) -> Result<Self> {
        let architecture = read_architecture(path)
            .with_context(|| format!("Failed to read model header from {}", path.display()))?;

        // Placeholder weights are replaced by the checkpoint below
        let mut rng = StdRng::seed_from_u64(0);
        let learning_rate = TrainerConfig::default().learning_rate;

        let model = match architecture.kind.as_str() {
            QNetwork::KIND => {
                let hidden = hidden_widths(&architecture)?;
                let estimator = QNetwork::new(&hidden, learning_rate, &mut rng)?;
                Self::Mlp(Evaluator::from_checkpoint(estimator, path)?)
            }
            LinearEstimator::KIND => {
                let estimator = LinearEstimator::new(learning_rate, &mut rng)?;
                Self::Linear(Evaluator::from_checkpoint(estimator, path)?)
            }
            other => bail!("Unknown estimator kind '{}' in {}", other, path.display()),
        };
        Ok(model)
    }

    pub fn architecture(&self) -> Architecture {
        use crate::rl::networks::ActionValueEstimator;
        match self {
            Self::Mlp(e) => e.estimator().architecture(),
            Self::Linear(e) => e.estimator().architecture(),
        }
    }

    pub fn evaluate(&self, ticks: &[Tick]) -> crate::error::Result<BacktestReport> {
        match self {
            Self::Mlp(e) => e.evaluate(ticks),
            Self::Linear(e) => e.evaluate(ticks),
        }
    }
}

/// Hidden widths from `[input, hidden.., output]`
fn hidden_widths(architecture: &Architecture) -> Result<Vec<usize>> {
    let layers = &architecture.layers;
    if layers.len() < 2 {
        bail!("Malformed layer list in {}", architecture);
    }
    Ok(layers[1..layers.len() - 1].to_vec())
}
