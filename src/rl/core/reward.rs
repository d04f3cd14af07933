//! Reward Functions
//!
//! One-tick mark-to-market reward for a directional bet. This is a training
//! signal only; realized PnL is computed separately by the position simulator.

use serde::{Deserialize, Serialize};

use super::action::Action;

/// Rewards are clamped to `[-REWARD_BOUND, REWARD_BOUND]`
pub const REWARD_BOUND: f64 = 1.0;

/// Raw price-delta reward for `action` over one tick, clamped.
///
/// BUY earns `next - current`, SELL earns `current - next`, HOLD earns 0.
/// Inputs are expected to be finite; use a [`RewardFunction`] to filter
/// transitions that must be discarded.
pub fn compute_reward(current_price: f64, next_price: f64, action: Action) -> f64 {
    directional(next_price - current_price, action).clamp(-REWARD_BOUND, REWARD_BOUND)
}

fn directional(delta: f64, action: Action) -> f64 {
    match action {
        Action::Buy => delta,
        Action::Sell => -delta,
        Action::Hold => 0.0,
    }
}

/// Trait for computing rewards
pub trait RewardFunction: Send + Sync {
    /// Reward for taking `action` at `current_price` when the next tick
    /// prints `next_price`. `None` means the transition must be discarded.
    fn compute(&self, current_price: f64, next_price: f64, action: Action) -> Option<f64>;

    fn name(&self) -> &'static str;
}

/// Absolute price change
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceDeltaReward;

impl RewardFunction for PriceDeltaReward {
    fn compute(&self, current_price: f64, next_price: f64, action: Action) -> Option<f64> {
        if !current_price.is_finite() || !next_price.is_finite() {
            return None;
        }
        Some(compute_reward(current_price, next_price, action))
    }

    fn name(&self) -> &'static str {
        "price_delta"
    }
}

/// Relative price change `(next - current) / current`
#[derive(Debug, Clone, Copy, Default)]
pub struct ReturnRatioReward;

impl RewardFunction for ReturnRatioReward {
    fn compute(&self, current_price: f64, next_price: f64, action: Action) -> Option<f64> {
        if !current_price.is_finite() || !next_price.is_finite() || current_price == 0.0 {
            return None;
        }
        let ratio = (next_price - current_price) / current_price;
        if !ratio.is_finite() {
            return None;
        }
        Some(directional(ratio, action).clamp(-REWARD_BOUND, REWARD_BOUND))
    }

    fn name(&self) -> &'static str {
        "return_ratio"
    }
}

/// Configurable reward selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    #[default]
    PriceDelta,
    ReturnRatio,
}

impl RewardKind {
    pub fn build(self) -> Box<dyn RewardFunction> {
        match self {
            Self::PriceDelta => Box::new(PriceDeltaReward),
            Self::ReturnRatio => Box::new(ReturnRatioReward),
        }
    }
}
