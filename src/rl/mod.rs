//! Reinforcement Learning Module
//!
//! Online deep Q-learning over a price/volume tick series.
//!
//! # Components
//!
//! - **Core**: action encoding (BUY=0, SELL=1, HOLD=2), state and reward
//! - **Memory**: bounded FIFO experience buffer with uniform sampling
//! - **Networks**: action-value estimators (MLP and linear) with checkpoints
//! - **Training**: epsilon-greedy trainer with periodic target sync
//! - **Evaluation**: single-position backtest and performance metrics

pub mod config;
pub mod core;
pub mod evaluation;
pub mod memory;
pub mod networks;
pub mod training;

// Config exports
pub use self::config::{CheckpointConfig, EstimatorKind, TrainerConfig};

// Core exports
pub use self::core::{Action, RewardFunction, RewardKind, State, NUM_ACTIONS, STATE_DIM};

// Memory exports
pub use memory::{ExperienceBuffer, Transition};

// Network exports
pub use networks::{ActionValueEstimator, Architecture, LinearEstimator, QNetwork};

// Training exports
pub use training::{Checkpointer, Trainer, TrainerPhase, TrainingStats};

// Evaluation exports
pub use evaluation::{BacktestReport, Evaluator, PositionSimulator};
