//! Training Loop
//!
//! Online DQN over a tick series: epsilon-greedy action selection, bounded
//! experience replay, a periodically synced target estimator and
//! multiplicative exploration decay.
//!
//! A trainer moves through `Initializing -> Stepping -> Done`. Each step
//! consumes one consecutive tick pair; steps are strictly sequential and the
//! trainer is consistent between any two of them, so a run can be
//! checkpointed and resumed at any tick boundary.
//!
//! Streaming training buffers the first `warmup_ticks` ticks to fit input
//! scaling before any update. An update that produces a non-finite loss or
//! non-finite parameters is rolled back and reported as
//! [`QTraderError::Diverged`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::Tick;
use crate::error::{QTraderError, Result};
use crate::rl::config::TrainerConfig;
use crate::rl::core::{Action, RewardFunction, State, NUM_ACTIONS};
use crate::rl::memory::{ExperienceBuffer, Transition};
use crate::rl::networks::ActionValueEstimator;
use crate::rl::training::checkpointing::{Checkpointer, TrainerProgress};

/// Trainer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainerPhase {
    /// Estimators built, target synced, no step taken yet
    Initializing,
    /// At least one tick pair consumed
    Stepping,
    /// Series exhausted; no further steps accepted
    Done,
}

/// Training statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingStats {
    /// Identifies the run across checkpoints
    pub run_id: Uuid,
    /// Completed passes over the series
    pub episodes: usize,
    /// Transitions stored
    pub steps: u64,
    /// Gradient updates performed
    pub updates: u64,
    /// Target estimator refreshes
    pub target_syncs: u64,
    /// Tick pairs dropped for non-finite prices or an undefined reward
    pub discarded: u64,
    /// Random actions taken
    pub explored: u64,
    /// Greedy actions taken
    pub exploited: u64,
    /// Sum of stored rewards
    pub cumulative_reward: f64,
    /// Sum of update losses
    pub loss_sum: f64,
    /// Loss of the most recent update
    pub last_loss: Option<f64>,
    /// Exploration rate after the most recent step
    pub epsilon: f64,
}

impl TrainingStats {
    pub fn mean_loss(&self) -> f64 {
        if self.updates == 0 {
            0.0
        } else {
            self.loss_sum / self.updates as f64
        }
    }

    pub fn mean_reward(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.cumulative_reward / self.steps as f64
        }
    }
}

/// What happened during one applied step
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// 1-based step counter
    pub step: u64,
    pub action: Action,
    pub reward: f64,
    /// Action was drawn at random
    pub explored: bool,
    /// Loss of the gradient update, `None` while the buffer is under-filled
    pub loss: Option<f64>,
    /// Target was refreshed after this step
    pub synced: bool,
    /// Exploration rate after decay
    pub epsilon: f64,
}

/// Summary of one pass over a series
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeSummary {
    pub episode: usize,
    pub steps: u64,
    pub discarded: u64,
    pub total_reward: f64,
    pub epsilon: f64,
    pub mean_loss: f64,
}

/// Online Q-learning trainer
pub struct Trainer<E: ActionValueEstimator> {
    config: TrainerConfig,
    /// Estimator receiving gradient updates
    live: E,
    /// Frozen copy used for Bellman targets
    target: E,
    buffer: ExperienceBuffer,
    reward_fn: Box<dyn RewardFunction>,
    rng: StdRng,
    epsilon: f64,
    /// Applied steps; drives the target sync cadence
    steps: u64,
    phase: TrainerPhase,
    /// Previous tick in streaming mode
    last_tick: Option<Tick>,
    /// Streaming ticks held back until input scaling is fitted
    warmup: Vec<Tick>,
    stats: TrainingStats,
}

impl<E: ActionValueEstimator> Trainer<E> {
    /// Create a trainer seeded from `config.seed`, or from OS entropy
    pub fn new(config: TrainerConfig, estimator: E) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, estimator, rng)
    }

    pub fn with_seed(config: TrainerConfig, estimator: E, seed: u64) -> Result<Self> {
        Self::with_rng(config, estimator, StdRng::seed_from_u64(seed))
    }

    /// Create a trainer drawing exploration and sampling randomness from `rng`
    pub fn with_rng(config: TrainerConfig, estimator: E, rng: StdRng) -> Result<Self> {
        config.validate()?;

        let mut target = estimator.clone();
        target.sync_from(&estimator);

        let stats = TrainingStats {
            run_id: Uuid::new_v4(),
            epsilon: config.epsilon_start,
            ..Default::default()
        };
        info!(
            run_id = %stats.run_id,
            architecture = %estimator.architecture(),
            "Trainer initialized"
        );

        Ok(Self {
            buffer: ExperienceBuffer::new(config.buffer_capacity),
            reward_fn: config.reward.build(),
            epsilon: config.epsilon_start,
            live: estimator,
            target,
            rng,
            steps: 0,
            phase: TrainerPhase::Initializing,
            last_tick: None,
            warmup: Vec::new(),
            stats,
            config,
        })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn phase(&self) -> TrainerPhase {
        self.phase
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn buffer(&self) -> &ExperienceBuffer {
        &self.buffer
    }

    pub fn live(&self) -> &E {
        &self.live
    }

    pub fn target(&self) -> &E {
        &self.target
    }

    pub fn stats(&self) -> &TrainingStats {
        &self.stats
    }

    /// Hand over the trained estimator
    pub fn into_estimator(self) -> E {
        self.live
    }

    /// Epsilon-greedy choice; returns whether the action was random
    pub fn select_action(&mut self, state: &State) -> (Action, bool) {
        if self.rng.gen::<f64>() < self.epsilon {
            let idx = self.rng.gen_range(0..NUM_ACTIONS);
            (Action::from_index(idx).unwrap_or_default(), true)
        } else {
            (self.live.greedy_action(state), false)
        }
    }

    fn decay_epsilon(&mut self) {
        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
    }

    fn ensure_not_done(&self) -> Result<()> {
        if self.phase == TrainerPhase::Done {
            return Err(QTraderError::InvalidState(
                "trainer is done; start a new run to continue training".to_string(),
            ));
        }
        Ok(())
    }

    /// Input scaling is enabled but not fitted yet
    fn needs_scaling(&self) -> bool {
        self.config.standardize_inputs && !self.live.has_input_scaling()
    }

    /// Fit estimator input scaling on `ticks` before the first step.
    ///
    /// Skipped when disabled, when stepping has begun, or when the estimator
    /// already carries scaling (e.g. after a resume).
    pub fn prepare(&mut self, ticks: &[Tick]) -> Result<()> {
        if self.phase != TrainerPhase::Initializing {
            return Ok(());
        }
        self.fit_scaling(ticks)
    }

    fn fit_scaling(&mut self, ticks: &[Tick]) -> Result<()> {
        if !self.needs_scaling() {
            return Ok(());
        }

        let states: Vec<State> = ticks
            .iter()
            .map(State::from_tick)
            .filter(State::is_finite)
            .collect();
        if states.is_empty() {
            return Ok(());
        }
        self.live.fit_input_scaling(&states)?;
        self.target.sync_from(&self.live);
        debug!(samples = states.len(), "Fitted input scaling");
        Ok(())
    }

    /// Consume one tick pair.
    ///
    /// Returns `Ok(None)` when the pair was discarded (non-finite state or an
    /// undefined reward); nothing is stored and exploration does not decay.
    ///
    /// With `standardize_inputs` set, scaling must be fitted first through
    /// [`Trainer::prepare`] or the streaming warm-up. A diverging update
    /// leaves the transition stored and the live estimator at its previous
    /// parameters.
    pub fn step(&mut self, current: &Tick, next: &Tick) -> Result<Option<StepReport>> {
        self.ensure_not_done()?;

        let state = State::from_tick(current);
        let next_state = State::from_tick(next);
        let finite = state.is_finite() && next_state.is_finite();
        if finite && self.needs_scaling() {
            return Err(QTraderError::InvalidState(
                "input scaling not fitted; call prepare or disable standardize_inputs"
                    .to_string(),
            ));
        }
        if self.phase == TrainerPhase::Initializing {
            self.phase = TrainerPhase::Stepping;
        }
        if !finite {
            self.discard(current, next);
            return Ok(None);
        }

        let (action, explored) = self.select_action(&state);
        let Some(reward) = self.reward_fn.compute(current.price, next.price, action) else {
            self.discard(current, next);
            return Ok(None);
        };

        self.buffer
            .push(Transition::new(state, action, reward, next_state));
        self.steps += 1;

        let loss = if self.buffer.has_enough_samples(self.config.batch_size) {
            let batch = self.buffer.sample(self.config.batch_size, &mut self.rng)?;
            let snapshot = self.live.clone();
            let loss = self
                .live
                .train_step(&batch, &self.target, self.config.gamma);
            if !loss.is_finite() || !self.live.is_finite() {
                self.live = snapshot;
                self.stats.steps = self.steps;
                warn!(step = self.steps, loss, "Update diverged, rolled back");
                return Err(QTraderError::Diverged {
                    step: self.steps,
                    loss,
                });
            }
            self.stats.updates += 1;
            self.stats.loss_sum += loss;
            self.stats.last_loss = Some(loss);
            Some(loss)
        } else {
            None
        };

        let synced = self.steps % self.config.target_sync_interval == 0;
        if synced {
            self.target.sync_from(&self.live);
            self.stats.target_syncs += 1;
            debug!(step = self.steps, "Synced target estimator");
        }

        self.decay_epsilon();

        self.stats.steps = self.steps;
        self.stats.cumulative_reward += reward;
        self.stats.epsilon = self.epsilon;
        if explored {
            self.stats.explored += 1;
        } else {
            self.stats.exploited += 1;
        }

        if self.config.log_interval > 0 && self.steps % self.config.log_interval == 0 {
            info!(
                step = self.steps,
                epsilon = self.epsilon,
                action = %action,
                reward,
                buffer_len = self.buffer.len(),
                loss = loss.unwrap_or(f64::NAN),
                "Training progress"
            );
        }

        Ok(Some(StepReport {
            step: self.steps,
            action,
            reward,
            explored,
            loss,
            synced,
            epsilon: self.epsilon,
        }))
    }

    fn discard(&mut self, current: &Tick, next: &Tick) {
        self.stats.discarded += 1;
        warn!(
            timestamp = current.timestamp,
            price = current.price,
            next_price = next.price,
            "Discarding transition with non-finite price or undefined reward"
        );
    }

    /// Streaming entry point: feed ticks one at a time as they arrive.
    ///
    /// The first tick only primes the trainer. While input scaling is still
    /// unfitted, ticks are held back until `warmup_ticks` have arrived; the
    /// window then fits the scaling and is replayed, returning the report of
    /// its last applied step. Ordering is the caller's responsibility.
    pub fn observe(&mut self, tick: Tick) -> Result<Option<StepReport>> {
        self.ensure_not_done()?;
        if self.needs_scaling() {
            self.warmup.push(tick);
            if self.warmup.len() < self.config.warmup_ticks {
                return Ok(None);
            }
            return self.flush_warmup();
        }

        let report = match self.last_tick.take() {
            Some(previous) => self.step(&previous, &tick),
            None => Ok(None),
        };
        self.last_tick = Some(tick);
        report
    }

    /// Fit scaling on the held-back window and replay it
    fn flush_warmup(&mut self) -> Result<Option<StepReport>> {
        let window = std::mem::take(&mut self.warmup);
        self.fit_scaling(&window)?;
        if self.needs_scaling() {
            // window had no finite tick to fit on
            for pair in window.windows(2) {
                self.discard(&pair[0], &pair[1]);
            }
            return Ok(None);
        }

        let mut last = None;
        for pair in window.windows(2) {
            if let Some(report) = self.step(&pair[0], &pair[1])? {
                last = Some(report);
            }
        }
        self.last_tick = window.last().cloned();
        Ok(last)
    }

    /// Number of streaming ticks waiting for the warm-up window to fill
    pub fn pending_warmup(&self) -> usize {
        self.warmup.len()
    }

    /// One full pass over `ticks`. Fails before any step when fewer than two
    /// ticks are supplied.
    pub fn run_episode(&mut self, ticks: &[Tick]) -> Result<EpisodeSummary> {
        self.ensure_not_done()?;
        if ticks.len() < 2 {
            return Err(QTraderError::DataInsufficient(format!(
                "training needs at least 2 ticks, got {}",
                ticks.len()
            )));
        }
        self.prepare(ticks)?;

        let steps_before = self.steps;
        let discarded_before = self.stats.discarded;
        let updates_before = self.stats.updates;
        let loss_before = self.stats.loss_sum;
        let mut total_reward = 0.0;

        for pair in ticks.windows(2) {
            if let Some(report) = self.step(&pair[0], &pair[1])? {
                total_reward += report.reward;
            }
        }

        self.stats.episodes += 1;
        let updates = self.stats.updates - updates_before;
        let summary = EpisodeSummary {
            episode: self.stats.episodes,
            steps: self.steps - steps_before,
            discarded: self.stats.discarded - discarded_before,
            total_reward,
            epsilon: self.epsilon,
            mean_loss: if updates == 0 {
                0.0
            } else {
                (self.stats.loss_sum - loss_before) / updates as f64
            },
        };

        info!(
            "Episode {} complete: {} steps, reward {:.4}, epsilon {:.4}, mean loss {:.6}",
            summary.episode, summary.steps, summary.total_reward, summary.epsilon, summary.mean_loss
        );
        Ok(summary)
    }

    /// Single pass over the series, then `Done`
    pub fn train(&mut self, ticks: &[Tick]) -> Result<TrainingStats> {
        self.train_episodes(ticks, 1)
    }

    /// `episodes` passes over the series, then `Done`. Exploration and the
    /// sync counter carry over between passes.
    pub fn train_episodes(&mut self, ticks: &[Tick], episodes: usize) -> Result<TrainingStats> {
        for _ in 0..episodes.max(1) {
            self.run_episode(ticks)?;
        }
        self.finish()
    }

    /// Enter `Done` and return final statistics. Streaming ticks still held
    /// for warm-up are fitted and replayed first when there are at least two.
    pub fn finish(&mut self) -> Result<TrainingStats> {
        if self.warmup.len() >= 2 {
            self.flush_warmup()?;
        }
        self.warmup.clear();
        self.phase = TrainerPhase::Done;
        self.last_tick = None;
        self.stats.epsilon = self.epsilon;
        info!(
            "Training done: {} steps, {} updates, {} syncs, {} discarded, mean reward {:.4}",
            self.stats.steps,
            self.stats.updates,
            self.stats.target_syncs,
            self.stats.discarded,
            self.stats.mean_reward()
        );
        Ok(self.stats.clone())
    }

    /// Persist live estimator parameters
    pub fn save_model(&self, path: &Path) -> Result<()> {
        self.live.save(path)
    }

    /// Persist estimator, buffer and counters under `name`
    pub fn save_checkpoint(&self, checkpointer: &Checkpointer, name: &str) -> Result<PathBuf> {
        let model_path = checkpointer.model_path(name);
        self.live.save(&model_path)?;
        self.buffer.save(checkpointer.buffer_path(name))?;
        checkpointer.write_progress(
            name,
            &TrainerProgress {
                epsilon: self.epsilon,
                steps: self.steps,
                stats: self.stats.clone(),
            },
        )?;

        info!("Saved checkpoint {} ({} transitions)", name, self.buffer.len());
        checkpointer.cleanup_old_checkpoints();
        Ok(model_path)
    }

    /// Continue from checkpoint `name`. The target is re-synced from the
    /// restored live estimator; missing buffer or progress files leave the
    /// corresponding state fresh.
    pub fn resume_from(&mut self, checkpointer: &Checkpointer, name: &str) -> Result<()> {
        self.ensure_not_done()?;
        checkpointer.require(name)?;

        self.live.load(&checkpointer.model_path(name))?;
        self.target.sync_from(&self.live);

        let buffer_path = checkpointer.buffer_path(name);
        if buffer_path.exists() {
            self.buffer = ExperienceBuffer::load(&buffer_path)?.resized(self.config.buffer_capacity);
        }

        if let Some(progress) = checkpointer.read_progress(name)? {
            self.epsilon = progress
                .epsilon
                .clamp(self.config.epsilon_min, self.config.epsilon_start);
            self.steps = progress.steps;
            self.stats = progress.stats;
            self.stats.epsilon = self.epsilon;
        }

        self.phase = TrainerPhase::Stepping;
        info!(
            "Resumed from checkpoint {}: {} steps, {} transitions, epsilon {:.4}",
            name,
            self.steps,
            self.buffer.len(),
            self.epsilon
        );
        Ok(())
    }
}
