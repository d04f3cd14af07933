//! qtrader CLI
//!
//! Commands:
//! - `qtrader train`   - Train an estimator online over a tick series
//! - `qtrader eval`    - Backtest a saved model
//! - `qtrader compare` - Backtest several models on the same series
//! - `qtrader signal`  - Replay a series and emit live trade signals
//! - `qtrader labels`  - Write a direction-labeled dataset
//! - `qtrader config`  - Configuration management

pub mod backtest;
pub mod config;
pub mod labels;
pub mod model;
pub mod signal;
pub mod train;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::rl::config::EstimatorKind;
use crate::rl::core::RewardKind;

/// Online DQN trading agent
#[derive(Parser, Debug)]
#[command(name = "qtrader")]
#[command(author, version, about = "Online DQN trading agent: train, backtest and emit signals")]
pub struct Cli {
    /// Configuration directory (default.toml, {QTRADER_ENV}.toml)
    #[arg(long, global = true, env = "QTRADER_CONFIG_DIR", default_value = "config")]
    pub config_dir: PathBuf,

    /// JSON formatted console logs
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train an estimator online over a CSV tick series
    Train(train::TrainArgs),

    /// Backtest a saved model on a CSV tick series
    Eval(backtest::EvalArgs),

    /// Compare several saved models on the same series
    Compare(backtest::CompareArgs),

    /// Replay a series as a live feed and emit trade signals
    Signal(signal::SignalArgs),

    /// Write a direction-labeled copy of a tick series
    Labels(labels::LabelsArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

impl Commands {
    /// Commands that only print results log at WARN unless RUST_LOG says
    /// otherwise
    pub fn is_quiet(&self) -> bool {
        matches!(self, Self::Compare(_) | Self::Config(_))
    }
}

pub(crate) fn parse_estimator(s: &str) -> Result<EstimatorKind, String> {
    match s.to_ascii_lowercase().as_str() {
        "mlp" => Ok(EstimatorKind::Mlp),
        "linear" => Ok(EstimatorKind::Linear),
        other => Err(format!("unknown estimator '{other}' (expected mlp or linear)")),
    }
}

pub(crate) fn parse_reward(s: &str) -> Result<RewardKind, String> {
    match s.to_ascii_lowercase().as_str() {
        "price_delta" | "delta" => Ok(RewardKind::PriceDelta),
        "return_ratio" | "ratio" => Ok(RewardKind::ReturnRatio),
        other => Err(format!(
            "unknown reward '{other}' (expected price_delta or return_ratio)"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_train() {
        let cli = Cli::try_parse_from([
            "qtrader",
            "train",
            "--data",
            "ticks.csv",
            "--out",
            "model.json",
            "--seed",
            "7",
            "--estimator",
            "linear",
        ])
        .unwrap();
        match cli.command {
            Commands::Train(args) => {
                assert_eq!(args.seed, Some(7));
                assert_eq!(args.estimator, Some(EstimatorKind::Linear));
                assert_eq!(args.out, PathBuf::from("model.json"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.config_dir, PathBuf::from("config"));
    }

    #[test]
    fn test_compare_requires_models() {
        assert!(Cli::try_parse_from(["qtrader", "compare", "--data", "t.csv"]).is_err());
        let cli = Cli::try_parse_from([
            "qtrader", "compare", "--data", "t.csv", "--model", "a.json", "--model", "b.json",
        ])
        .unwrap();
        assert!(cli.command.is_quiet());
    }

    #[test]
    fn test_parse_kinds() {
        assert_eq!(parse_reward("ratio"), Ok(RewardKind::ReturnRatio));
        assert!(parse_estimator("lstm").is_err());
    }
}
