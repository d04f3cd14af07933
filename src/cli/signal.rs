//! `qtrader signal`

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{info, warn};

use super::model::LoadedModel;
use crate::config::AppConfig;
use crate::data::load_series;
use crate::domain::Tick;
use crate::integration::{
    EmitterStats, SharedMemoryBlock, SignalEmitter, TickReplay, UdpSignalSender,
};
use crate::rl::evaluation::Evaluator;
use crate::rl::networks::ActionValueEstimator;

#[derive(Args, Debug)]
pub struct SignalArgs {
    /// CSV tick series replayed as the live feed
    #[arg(short, long)]
    pub data: PathBuf,

    /// Saved model
    #[arg(short, long)]
    pub model: PathBuf,

    /// Symbol attached to outbound signals
    #[arg(short, long)]
    pub symbol: Option<String>,

    /// Order quantity attached to outbound signals
    #[arg(short, long)]
    pub quantity: Option<f64>,

    /// UDP target as host:port
    #[arg(long)]
    pub target: Option<String>,

    /// Delay between replayed ticks
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Also publish each signal to a shared memory block at this path
    #[arg(long)]
    pub shm: Option<PathBuf>,
}

impl SignalArgs {
    pub fn apply(&self, config: &mut AppConfig) -> Result<()> {
        if let Some(symbol) = &self.symbol {
            config.data.symbol = symbol.clone();
        }
        if let Some(quantity) = self.quantity {
            config.signal.quantity = quantity;
        }
        if let Some(interval) = self.interval_ms {
            config.signal.interval_ms = interval;
        }
        if let Some(target) = &self.target {
            let (host, port) = target
                .rsplit_once(':')
                .with_context(|| format!("Invalid target '{target}', expected host:port"))?;
            config.signal.host = host.to_string();
            config.signal.port = port
                .parse()
                .with_context(|| format!("Invalid port in '{target}'"))?;
        }
        Ok(())
    }

    pub async fn run(self, mut config: AppConfig) -> Result<EmitterStats> {
        self.apply(&mut config)?;
        if let Err(errors) = config.validate() {
            anyhow::bail!("Invalid configuration: {}", errors.join("; "));
        }

        let ticks = load_series(&self.data, &config.data)
            .with_context(|| format!("Failed to load {}", self.data.display()))?;
        let stats = match LoadedModel::open(&self.model)? {
            LoadedModel::Mlp(evaluator) => self.emit(evaluator, ticks, &config).await?,
            LoadedModel::Linear(evaluator) => self.emit(evaluator, ticks, &config).await?,
        };

        println!(
            "\n  Replayed {} ticks: {} signals, {} holds, {} send failures\n",
            stats.ticks, stats.signals, stats.holds, stats.send_failures
        );
        Ok(stats)
    }

    async fn emit<E: ActionValueEstimator>(
        &self,
        evaluator: Evaluator<E>,
        ticks: Vec<Tick>,
        config: &AppConfig,
    ) -> Result<EmitterStats> {
        let udp = UdpSignalSender::connect(&config.signal.host, config.signal.port).await?;
        info!("Sending signals to udp://{}", udp.target());

        let mut emitter = SignalEmitter::new(evaluator, &config.data.symbol, config.signal.quantity)
            .with_sink(Box::new(udp));
        if let Some(path) = &self.shm {
            let block = SharedMemoryBlock::open_or_create(path, config.signal.shm_size)?;
            info!("Publishing signals to shared memory {:?}", block.path());
            emitter = emitter.with_sink(Box::new(block));
        }

        let (rx, feed) = TickReplay::new(ticks, config.signal.interval_ms).spawn(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctrl_c = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, stopping...");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
            }
        });

        let stats = emitter.run(rx, shutdown_rx).await?;
        ctrl_c.abort();
        feed.abort();
        Ok(stats)
    }
}
