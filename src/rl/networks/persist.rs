//! Estimator persistence: a JSON envelope of `{architecture, parameters}`.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{QTraderError, Result};

/// Identifies the parameter layout an estimator blob belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Architecture {
    /// Estimator family, e.g. "mlp" or "linear"
    pub kind: String,
    /// Layout version within the family
    pub version: u32,
    /// Input width followed by each layer's output width
    pub layers: Vec<usize>,
}

impl Architecture {
    pub fn new(kind: &str, version: u32, layers: Vec<usize>) -> Self {
        Self {
            kind: kind.to_string(),
            version,
            layers,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.layers.iter().map(|d| d.to_string()).collect();
        write!(f, "{}-v{}[{}]", self.kind, self.version, dims.join("-"))
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, P> {
    architecture: &'a Architecture,
    parameters: &'a P,
    saved_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct Envelope {
    architecture: Architecture,
    parameters: serde_json::Value,
}

/// Write `parameters` tagged with `architecture`
pub fn save_parameters<P: Serialize>(
    path: &Path,
    architecture: &Architecture,
    parameters: &P,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let envelope = EnvelopeRef {
        architecture,
        parameters,
        saved_at: Utc::now(),
    };
    fs::write(path, serde_json::to_string(&envelope)?)?;
    info!("Saved {} estimator to {:?}", architecture, path);
    Ok(())
}

/// Read parameters written by [`save_parameters`], refusing any blob whose
/// architecture differs from `expected`.
pub fn load_parameters<P: DeserializeOwned>(path: &Path, expected: &Architecture) -> Result<P> {
    let content = fs::read_to_string(path)?;
    let envelope: Envelope = serde_json::from_str(&content)?;

    if envelope.architecture != *expected {
        return Err(QTraderError::IncompatibleCheckpoint {
            expected: expected.to_string(),
            found: envelope.architecture.to_string(),
        });
    }

    serde_json::from_value(envelope.parameters).map_err(|e| {
        QTraderError::IncompatibleCheckpoint {
            expected: expected.to_string(),
            found: format!("unreadable parameters ({e})"),
        }
    })
}

/// Architecture recorded in a saved blob, without decoding its parameters
pub fn read_architecture(path: &Path) -> Result<Architecture> {
    #[derive(Deserialize)]
    struct Header {
        architecture: Architecture,
    }

    let content = fs::read_to_string(path)?;
    let header: Header = serde_json::from_str(&content)?;
    Ok(header.architecture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;

    #[test]
    fn test_architecture_display() {
        let arch = Architecture::new("mlp", 1, vec![2, 64, 64, 3]);
        assert_eq!(arch.to_string(), "mlp-v1[2-64-64-3]");
    }

    #[test]
    fn test_mismatched_architecture_rejected() {
        let path = temp_dir().join("qtrader_persist_mismatch.json");
        let saved = Architecture::new("mlp", 1, vec![2, 32, 3]);
        save_parameters(&path, &saved, &vec![1.0_f64, 2.0]).unwrap();

        let expected = Architecture::new("mlp", 1, vec![2, 64, 64, 3]);
        let err = load_parameters::<Vec<f64>>(&path, &expected).unwrap_err();
        assert!(matches!(err, QTraderError::IncompatibleCheckpoint { .. }));

        let params: Vec<f64> = load_parameters(&path, &saved).unwrap();
        assert_eq!(params, vec![1.0, 2.0]);
        assert_eq!(read_architecture(&path).unwrap(), saved);
        let _ = fs::remove_file(&path);
    }
}
