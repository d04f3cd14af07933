use thiserror::Error;

/// Main error type for the trading agent
#[derive(Error, Debug)]
pub enum QTraderError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Input series errors
    #[error("Data insufficient: {0}")]
    DataInsufficient(String),

    #[error("Insufficient data: requested {requested}, available {available}")]
    InsufficientData { requested: usize, available: usize },

    #[error("Input length mismatch: {prices} prices vs {actions} actions")]
    InputLengthMismatch { prices: usize, actions: usize },

    // Persistence errors
    #[error("Incompatible checkpoint: expected {expected}, found {found}")]
    IncompatibleCheckpoint { expected: String, found: String },

    // State machine errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // Training errors
    #[error("Training diverged at step {step}: loss {loss}")]
    Diverged { step: u64, loss: f64 },

    // Signal transport errors
    #[error("Message too large: {size} bytes exceeds block capacity {capacity}")]
    MessageTooLarge { size: usize, capacity: usize },

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for QTraderError
pub type Result<T> = std::result::Result<T, QTraderError>;

/// Specific error types for loading tick series
#[derive(Error, Debug, Clone)]
pub enum DataError {
    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    #[error("Too few ticks: found {found}, need at least {required}")]
    TooFewTicks { found: usize, required: usize },

    #[error("Downsample step must be >= 1")]
    InvalidStep,
}

impl From<DataError> for QTraderError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::TooFewTicks { .. } => QTraderError::DataInsufficient(err.to_string()),
            other => QTraderError::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_few_ticks_maps_to_data_insufficient() {
        let err: QTraderError = DataError::TooFewTicks {
            found: 1,
            required: 2,
        }
        .into();
        assert!(matches!(err, QTraderError::DataInsufficient(_)));
    }

    #[test]
    fn missing_column_maps_to_validation() {
        let err: QTraderError = DataError::MissingColumn {
            column: "price".into(),
        }
        .into();
        match err {
            QTraderError::Validation(msg) => assert!(msg.contains("price")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
