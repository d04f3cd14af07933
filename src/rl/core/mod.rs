//! Core RL abstractions
//!
//! Fundamental types for state representation, actions, and rewards.

pub mod action;
pub mod reward;
pub mod state;

pub use action::{action_distribution, Action, ActionValues, NUM_ACTIONS};
pub use reward::{
    compute_reward, PriceDeltaReward, ReturnRatioReward, RewardFunction, RewardKind, REWARD_BOUND,
};
pub use state::{State, STATE_DIM};
