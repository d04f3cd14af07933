pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod integration;
pub mod rl;

pub use crate::config::AppConfig;
pub use domain::{Signal, Tick};
pub use error::{QTraderError, Result};
pub use integration::{SharedMemoryBlock, SignalEmitter, SignalSink, UdpSignalSender};
pub use rl::{
    Action, ActionValueEstimator, BacktestReport, Evaluator, ExperienceBuffer, LinearEstimator,
    QNetwork, Trainer, TrainerConfig,
};
