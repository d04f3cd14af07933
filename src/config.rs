use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::integration::{DEFAULT_BLOCK_SIZE, DEFAULT_SIGNAL_HOST, DEFAULT_SIGNAL_PORT};
use crate::rl::config::{CheckpointConfig, TrainerConfig};

/// Filter used when neither RUST_LOG nor `logging.level` is set
pub const DEFAULT_LOG_FILTER: &str = "info,qtrader=debug";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub trainer: TrainerConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DataConfig {
    /// Symbol used when the CSV has no `symbol` column
    pub symbol: String,
    /// Keep every N-th tick (1 keeps all)
    pub downsample: usize,
    /// Min-max scale price and volume into [0, 1]
    pub normalize: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            downsample: 1,
            normalize: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Execution bridge host
    pub host: String,
    /// Execution bridge UDP port
    pub port: u16,
    /// Order quantity attached to each signal
    pub quantity: f64,
    /// Delay between replayed ticks in milliseconds
    pub interval_ms: u64,
    /// Shared memory block size in bytes
    pub shm_size: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SIGNAL_HOST.to_string(),
            port: DEFAULT_SIGNAL_PORT,
            quantity: 0.001,
            interval_ms: 100,
            shm_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Level or EnvFilter directive list (e.g. "warn,qtrader=info")
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", DEFAULT_LOG_FILTER)?
            .set_default("logging.json", false)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific overrides (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("QTRADER_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // QTRADER_TRAINER__GAMMA, QTRADER_SIGNAL__PORT, ...
            .add_source(
                Environment::with_prefix("QTRADER")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.trainer.validate() {
            errors.push(e.to_string());
        }

        if self.checkpoint.max_checkpoints == 0 {
            errors.push("checkpoint.max_checkpoints must be >= 1".to_string());
        }

        if self.data.downsample == 0 {
            errors.push("data.downsample must be >= 1".to_string());
        }

        if !(self.signal.quantity.is_finite() && self.signal.quantity > 0.0) {
            errors.push("signal.quantity must be positive".to_string());
        }

        if self.signal.shm_size <= crate::integration::HEADER_LEN {
            errors.push(format!(
                "signal.shm_size must exceed {} bytes",
                crate::integration::HEADER_LEN
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.signal.port, 9001);
        assert_eq!(config.data.downsample, 1);
        assert_eq!(config.logging.level, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_load_from_file_overrides() {
        let dir = temp_dir().join("qtrader_config_test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("default.toml"),
            "[trainer]\ngamma = 0.9\nbatch_size = 8\n\n[data]\nsymbol = \"ETHUSDT\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&dir).unwrap();
        assert_eq!(config.trainer.gamma, 0.9);
        assert_eq!(config.trainer.batch_size, 8);
        // untouched fields keep their defaults
        assert_eq!(config.trainer.buffer_capacity, 50_000);
        assert_eq!(config.data.symbol, "ETHUSDT");
        assert_eq!(config.signal.host, "127.0.0.1");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_validate_collects_errors() {
        let mut config = AppConfig::default();
        config.data.downsample = 0;
        config.signal.quantity = 0.0;
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_roundtrips_through_toml() {
        let config = AppConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.trainer, config.trainer);
        assert_eq!(parsed.signal, config.signal);
    }
}
