//! RL Configuration
//!
//! Hyperparameters for the online Q-learning loop and checkpointing.

use serde::{Deserialize, Serialize};

use crate::error::{QTraderError, Result};
use crate::rl::core::RewardKind;

/// Function approximator used for action values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    /// MLP trained with Adam
    #[default]
    Mlp,
    /// One linear model per action trained with SGD
    Linear,
}

/// Trainer hyperparameters, fixed for the duration of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Discount factor (gamma)
    pub gamma: f64,
    /// Learning rate
    pub learning_rate: f64,
    /// Transitions per gradient update
    pub batch_size: usize,
    /// Initial exploration rate
    pub epsilon_start: f64,
    /// Exploration floor
    pub epsilon_min: f64,
    /// Multiplicative decay applied after every step
    pub epsilon_decay: f64,
    /// Experience buffer capacity
    pub buffer_capacity: usize,
    /// Steps between target estimator syncs
    pub target_sync_interval: u64,
    /// Reward signal used for transitions
    pub reward: RewardKind,
    /// Estimator implementation
    pub estimator: EstimatorKind,
    /// Hidden layer widths for the MLP estimator
    pub hidden_sizes: Vec<usize>,
    /// Fit z-score input scaling on the series before the first step
    pub standardize_inputs: bool,
    /// Ticks buffered by streaming training to fit input scaling before the
    /// first update
    pub warmup_ticks: usize,
    /// Emit a progress log every N steps (0 disables)
    pub log_interval: u64,
    /// Passes over the series per run
    pub episodes: usize,
    /// RNG seed; `None` seeds from OS entropy
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            learning_rate: 0.0005,
            batch_size: 16,
            epsilon_start: 1.0,
            epsilon_min: 0.05,
            epsilon_decay: 0.995,
            buffer_capacity: 50_000,
            target_sync_interval: 200,
            reward: RewardKind::PriceDelta,
            estimator: EstimatorKind::Mlp,
            hidden_sizes: vec![64, 64],
            standardize_inputs: true,
            warmup_ticks: 100,
            log_interval: 10,
            episodes: 1,
            seed: None,
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(QTraderError::Validation(msg));

        if !(0.0..=1.0).contains(&self.gamma) {
            return fail(format!("gamma must be in [0, 1], got {}", self.gamma));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return fail(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            ));
        }
        if self.batch_size == 0 {
            return fail("batch_size must be >= 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.epsilon_start)
            || !(0.0..=1.0).contains(&self.epsilon_min)
            || self.epsilon_min > self.epsilon_start
        {
            return fail(format!(
                "epsilon bounds invalid: start {} min {}",
                self.epsilon_start, self.epsilon_min
            ));
        }
        if !(self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0) {
            return fail(format!(
                "epsilon_decay must be in (0, 1], got {}",
                self.epsilon_decay
            ));
        }
        if self.buffer_capacity < self.batch_size {
            return fail(format!(
                "buffer_capacity {} smaller than batch_size {}",
                self.buffer_capacity, self.batch_size
            ));
        }
        if self.target_sync_interval == 0 {
            return fail("target_sync_interval must be >= 1".to_string());
        }
        if self.hidden_sizes.contains(&0) {
            return fail("hidden layer widths must be > 0".to_string());
        }
        if self.standardize_inputs && self.warmup_ticks < 2 {
            return fail(format!(
                "warmup_ticks must be >= 2 with standardize_inputs, got {}",
                self.warmup_ticks
            ));
        }
        if self.episodes == 0 {
            return fail("episodes must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Checkpoint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Directory for checkpoints
    pub dir: String,
    /// Maximum checkpoints to keep
    pub max_checkpoints: usize,
    /// Save a checkpoint every N episodes (0 disables)
    pub every_episodes: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dir: "./checkpoints".to_string(),
            max_checkpoints: 5,
            every_episodes: 1,
        }
    }
}
