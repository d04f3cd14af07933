use serde::{Deserialize, Serialize};

use crate::rl::core::Action;

/// Outbound trade signal handed to the execution bridge.
///
/// Serializes to `{"action": "BUY", "symbol": "BTCUSDT", "quantity": 0.25}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub action: Action,
    pub symbol: String,
    pub quantity: f64,
}

impl Signal {
    pub fn new(action: Action, symbol: impl Into<String>, quantity: f64) -> Self {
        Self {
            action,
            symbol: symbol.into(),
            quantity,
        }
    }

    /// Build a signal for a policy decision; HOLD produces no signal.
    pub fn from_action(action: Action, symbol: &str, quantity: f64) -> Option<Self> {
        match action {
            Action::Hold => None,
            Action::Buy | Action::Sell => Some(Self::new(action, symbol, quantity)),
        }
    }

    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_wire_format() {
        let signal = Signal::new(Action::Buy, "BTCUSDT", 0.25);
        let json: serde_json::Value = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["action"], "BUY");
        assert_eq!(json["symbol"], "BTCUSDT");
        assert_eq!(json["quantity"], 0.25);
    }

    #[test]
    fn hold_yields_no_signal() {
        assert!(Signal::from_action(Action::Hold, "BTCUSDT", 1.0).is_none());
        let sell = Signal::from_action(Action::Sell, "BTCUSDT", 1.0).unwrap();
        assert_eq!(sell.action, Action::Sell);
    }
}
