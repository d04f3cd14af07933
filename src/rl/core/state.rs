//! State Representation
//!
//! The observation fed to action-value estimators. A state is a pure
//! function of a single tick.

use serde::{Deserialize, Serialize};

use crate::domain::Tick;

/// Number of state features: price, volume
pub const STATE_DIM: usize = 2;

/// Feature vector `[price, volume]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct State(pub [f64; STATE_DIM]);

impl State {
    pub fn new(price: f64, volume: f64) -> Self {
        Self([price, volume])
    }

    pub fn from_tick(tick: &Tick) -> Self {
        Self::new(tick.price, tick.volume)
    }

    pub fn price(&self) -> f64 {
        self.0[0]
    }

    pub fn volume(&self) -> f64 {
        self.0[1]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl From<&Tick> for State {
    fn from(tick: &Tick) -> Self {
        Self::from_tick(tick)
    }
}
