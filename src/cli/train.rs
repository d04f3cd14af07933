//! `qtrader train`

use anyhow::{Context, Result};
use clap::Args;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::info;

use super::{parse_estimator, parse_reward};
use crate::config::AppConfig;
use crate::data::load_series;
use crate::domain::Tick;
use crate::rl::config::EstimatorKind;
use crate::rl::core::RewardKind;
use crate::rl::networks::{ActionValueEstimator, LinearEstimator, QNetwork};
use crate::rl::training::{episode_name, Checkpointer, Trainer, TrainingStats};

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// CSV tick series (timestamp,price,volume[,symbol])
    #[arg(short, long)]
    pub data: PathBuf,

    /// Where to write the trained model
    #[arg(short, long, default_value = "models/dqn.model.json")]
    pub out: PathBuf,

    /// RNG seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Passes over the series
    #[arg(short, long)]
    pub episodes: Option<usize>,

    /// Estimator family (mlp, linear)
    #[arg(long, value_parser = parse_estimator)]
    pub estimator: Option<EstimatorKind>,

    /// Reward signal (price_delta, return_ratio)
    #[arg(long, value_parser = parse_reward)]
    pub reward: Option<RewardKind>,

    /// Learning rate
    #[arg(long)]
    pub lr: Option<f64>,

    /// Checkpoint directory; enables per-episode checkpoints
    #[arg(short, long)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Resume from a checkpoint name in the checkpoint directory ("latest"
    /// picks the most recent)
    #[arg(long, requires = "checkpoint_dir")]
    pub resume: Option<String>,
}

impl TrainArgs {
    /// Overlay flags on the loaded configuration
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(seed) = self.seed {
            config.trainer.seed = Some(seed);
        }
        if let Some(episodes) = self.episodes {
            config.trainer.episodes = episodes;
        }
        if let Some(estimator) = self.estimator {
            config.trainer.estimator = estimator;
        }
        if let Some(reward) = self.reward {
            config.trainer.reward = reward;
        }
        if let Some(lr) = self.lr {
            config.trainer.learning_rate = lr;
        }
        if let Some(dir) = &self.checkpoint_dir {
            config.checkpoint.dir = dir.to_string_lossy().into_owned();
        }
    }

    pub fn run(self, mut config: AppConfig) -> Result<TrainingStats> {
        self.apply(&mut config);
        config.trainer.validate()?;

        let ticks = load_series(&self.data, &config.data)
            .with_context(|| format!("Failed to load {}", self.data.display()))?;

        let mut rng = match config.trainer.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let lr = config.trainer.learning_rate;

        let stats = match config.trainer.estimator {
            EstimatorKind::Mlp => {
                let estimator = QNetwork::new(&config.trainer.hidden_sizes, lr, &mut rng)?;
                self.train_with(estimator, &ticks, &config)?
            }
            EstimatorKind::Linear => {
                let estimator = LinearEstimator::new(lr, &mut rng)?;
                self.train_with(estimator, &ticks, &config)?
            }
        };

        println!("\n  Training complete ({})", stats.run_id);
        println!("  steps:       {}", stats.steps);
        println!("  updates:     {}", stats.updates);
        println!("  syncs:       {}", stats.target_syncs);
        println!("  discarded:   {}", stats.discarded);
        println!(
            "  explored:    {} / exploited {}",
            stats.explored, stats.exploited
        );
        println!("  mean reward: {:.6}", stats.mean_reward());
        println!("  epsilon:     {:.4}", stats.epsilon);
        println!("  model:       {}\n", self.out.display());
        Ok(stats)
    }

    fn train_with<E: ActionValueEstimator>(
        &self,
        estimator: E,
        ticks: &[Tick],
        config: &AppConfig,
    ) -> Result<TrainingStats> {
        let mut trainer = Trainer::new(config.trainer.clone(), estimator)?;

        let checkpointer = self
            .checkpoint_dir
            .as_ref()
            .map(|_| Checkpointer::new(&config.checkpoint.dir, config.checkpoint.max_checkpoints));

        if let (Some(name), Some(checkpointer)) = (&self.resume, &checkpointer) {
            let name = if name == "latest" {
                checkpointer
                    .latest_checkpoint()
                    .context("No checkpoint found to resume from")?
            } else {
                name.clone()
            };
            trainer.resume_from(checkpointer, &name)?;
        }

        let every = config.checkpoint.every_episodes;
        for _ in 0..config.trainer.episodes {
            let summary = trainer.run_episode(ticks)?;
            if let Some(checkpointer) = &checkpointer {
                if every > 0 && summary.episode % every == 0 {
                    trainer.save_checkpoint(checkpointer, &episode_name("dqn", summary.episode))?;
                }
            }
        }

        let stats = trainer.finish()?;
        trainer
            .save_model(&self.out)
            .with_context(|| format!("Failed to save model to {}", self.out.display()))?;
        info!("Model written to {:?}", self.out);
        Ok(stats)
    }
}
