//! Action Space
//!
//! The three trading decisions and their canonical numeric encoding.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::QTraderError;

/// Number of discrete actions
pub const NUM_ACTIONS: usize = 3;

/// One value per action, indexed by [`Action::to_index`]
pub type ActionValues = [f64; NUM_ACTIONS];

/// Discrete trading action.
///
/// The encoding `BUY=0, SELL=1, HOLD=2` is used everywhere: estimator
/// outputs, stored transitions, reward computation and report output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Action {
    /// Open a long position (or, for reward, bet on a rise)
    Buy = 0,
    /// Close the long position (or, for reward, bet on a fall)
    Sell = 1,
    /// Do nothing
    Hold = 2,
}

impl Action {
    /// Convert from action index
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Buy),
            1 => Some(Self::Sell),
            2 => Some(Self::Hold),
            _ => None,
        }
    }

    /// Convert to action index
    pub fn to_index(self) -> usize {
        self as usize
    }

    /// Get all possible actions, in index order
    pub fn all() -> &'static [Action] {
        &[Self::Buy, Self::Sell, Self::Hold]
    }

    /// Wire name ("BUY", "SELL", "HOLD")
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
        }
    }

    /// Highest-valued action. Ties go to the lowest index; NaN never wins
    /// over a number.
    pub fn greedy(values: &ActionValues) -> Self {
        let mut best = 0;
        for i in 1..NUM_ACTIONS {
            if values[i] > values[best] || (values[best].is_nan() && !values[i].is_nan()) {
                best = i;
            }
        }
        Self::from_index(best).unwrap_or_default()
    }
}

impl Default for Action {
    fn default() -> Self {
        Self::Hold
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = QTraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "0" => Ok(Self::Buy),
            "SELL" | "1" => Ok(Self::Sell),
            "HOLD" | "2" => Ok(Self::Hold),
            other => Err(QTraderError::Validation(format!("unknown action: {other}"))),
        }
    }
}

/// Count of each action, indexed by [`Action::to_index`]
pub fn action_distribution<'a>(actions: impl IntoIterator<Item = &'a Action>) -> [usize; NUM_ACTIONS] {
    let mut counts = [0; NUM_ACTIONS];
    for action in actions {
        counts[action.to_index()] += 1;
    }
    counts
}
