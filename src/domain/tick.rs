use serde::{Deserialize, Serialize};

/// One market observation, consumed in strict sequence order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Seconds (or any monotonically increasing unit) since epoch
    pub timestamp: f64,
    /// Trading symbol (e.g., "BTCUSDT")
    pub symbol: String,
    /// Last traded price
    pub price: f64,
    /// Traded volume for the tick
    pub volume: f64,
}

impl Tick {
    pub fn new(timestamp: f64, symbol: impl Into<String>, price: f64, volume: f64) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            price,
            volume,
        }
    }

    /// Price and volume are both finite numbers
    pub fn is_finite(&self) -> bool {
        self.price.is_finite() && self.volume.is_finite()
    }
}

/// Extract the price column of a series
pub fn prices(ticks: &[Tick]) -> Vec<f64> {
    ticks.iter().map(|t| t.price).collect()
}
