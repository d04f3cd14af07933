//! Z-score input scaling stored alongside estimator parameters.

use serde::{Deserialize, Serialize};

use crate::error::{QTraderError, Result};
use crate::rl::core::{State, STATE_DIM};

/// Per-feature mean and standard deviation fitted on a series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputScaling {
    pub mean: [f64; STATE_DIM],
    pub std: [f64; STATE_DIM],
}

impl InputScaling {
    /// Fit from `states`. Zero-variance features get a unit std so they pass
    /// through centered.
    pub fn fit(states: &[State]) -> Result<Self> {
        if states.is_empty() {
            return Err(QTraderError::Validation(
                "cannot fit input scaling without samples".to_string(),
            ));
        }
        if states.iter().any(|s| !s.is_finite()) {
            return Err(QTraderError::Validation(
                "scaling samples contain non-finite values".to_string(),
            ));
        }

        let n = states.len() as f64;
        let mut mean = [0.0; STATE_DIM];
        for s in states {
            for (m, v) in mean.iter_mut().zip(s.as_slice()) {
                *m += v / n;
            }
        }

        let mut std = [0.0; STATE_DIM];
        for s in states {
            for i in 0..STATE_DIM {
                std[i] += (s.0[i] - mean[i]).powi(2) / n;
            }
        }
        for v in &mut std {
            *v = v.sqrt();
            if !v.is_finite() || *v < 1e-12 {
                *v = 1.0;
            }
        }

        Ok(Self { mean, std })
    }

    pub fn apply(&self, state: &State) -> [f64; STATE_DIM] {
        let mut out = state.0;
        for i in 0..STATE_DIM {
            out[i] = (out[i] - self.mean[i]) / self.std[i];
        }
        out
    }

    pub fn is_valid(&self) -> bool {
        self.mean.iter().all(|m| m.is_finite())
            && self.std.iter().all(|s| s.is_finite() && *s > 0.0)
    }
}

/// Scaled feature rows for a batch of states
pub(crate) fn scaled_rows(states: &[State], scaling: Option<&InputScaling>) -> Vec<f64> {
    let mut rows = Vec::with_capacity(states.len() * STATE_DIM);
    for state in states {
        match scaling {
            Some(scaling) => rows.extend_from_slice(&scaling.apply(state)),
            None => rows.extend_from_slice(state.as_slice()),
        }
    }
    rows
}
