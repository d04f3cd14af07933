//! Model Checkpointing
//!
//! A checkpoint is three JSON files sharing a name: estimator parameters,
//! buffer contents and trainer progress. Each can be restored on its own.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{QTraderError, Result};
use crate::rl::training::trainer::TrainingStats;

const MODEL_SUFFIX: &str = ".model.json";
const BUFFER_SUFFIX: &str = ".buffer.json";
const PROGRESS_SUFFIX: &str = ".progress.json";

/// Trainer counters needed to continue a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerProgress {
    pub epsilon: f64,
    pub steps: u64,
    pub stats: TrainingStats,
}

/// Checkpointer for saving and loading training state
#[derive(Debug, Clone)]
pub struct Checkpointer {
    /// Directory for checkpoints
    checkpoint_dir: PathBuf,
    /// Maximum checkpoints to keep
    max_checkpoints: usize,
}

impl Checkpointer {
    /// Create a new checkpointer
    pub fn new<P: AsRef<Path>>(checkpoint_dir: P, max_checkpoints: usize) -> Self {
        let checkpoint_dir = checkpoint_dir.as_ref().to_path_buf();

        // Create directory if it doesn't exist
        if !checkpoint_dir.exists() {
            if let Err(e) = fs::create_dir_all(&checkpoint_dir) {
                warn!("Failed to create checkpoint directory: {}", e);
            }
        }

        Self {
            checkpoint_dir,
            max_checkpoints: max_checkpoints.max(1),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    /// Estimator parameters for a given name
    pub fn model_path(&self, name: &str) -> PathBuf {
        self.checkpoint_dir.join(format!("{name}{MODEL_SUFFIX}"))
    }

    /// Experience buffer contents for a given name
    pub fn buffer_path(&self, name: &str) -> PathBuf {
        self.checkpoint_dir.join(format!("{name}{BUFFER_SUFFIX}"))
    }

    /// Trainer counters for a given name
    pub fn progress_path(&self, name: &str) -> PathBuf {
        self.checkpoint_dir.join(format!("{name}{PROGRESS_SUFFIX}"))
    }

    pub fn write_progress(&self, name: &str, progress: &TrainerProgress) -> Result<()> {
        fs::create_dir_all(&self.checkpoint_dir)?;
        fs::write(
            self.progress_path(name),
            serde_json::to_string_pretty(progress)?,
        )?;
        Ok(())
    }

    /// `None` when the checkpoint has no progress file
    pub fn read_progress(&self, name: &str) -> Result<Option<TrainerProgress>> {
        let path = self.progress_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// List available checkpoints
    pub fn list_checkpoints(&self) -> Vec<String> {
        let mut checkpoints = Vec::new();

        if let Ok(entries) = fs::read_dir(&self.checkpoint_dir) {
            for entry in entries.flatten() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Some(stem) = name.strip_suffix(MODEL_SUFFIX) {
                        checkpoints.push(stem.to_string());
                    }
                }
            }
        }

        checkpoints.sort();
        checkpoints
    }

    /// Get latest checkpoint name
    pub fn latest_checkpoint(&self) -> Option<String> {
        self.list_checkpoints().into_iter().last()
    }

    /// Fail unless a checkpoint with this name has estimator parameters
    pub fn require(&self, name: &str) -> Result<()> {
        if self.exists(name) {
            Ok(())
        } else {
            Err(QTraderError::Validation(format!(
                "Checkpoint not found: {:?}",
                self.model_path(name)
            )))
        }
    }

    /// Cleanup old checkpoints keeping only max_checkpoints
    pub fn cleanup_old_checkpoints(&self) {
        let checkpoints = self.list_checkpoints();

        if checkpoints.len() <= self.max_checkpoints {
            return;
        }

        let to_remove = checkpoints.len() - self.max_checkpoints;
        for name in checkpoints.into_iter().take(to_remove) {
            for path in [
                self.model_path(&name),
                self.buffer_path(&name),
                self.progress_path(&name),
            ] {
                if !path.exists() {
                    continue;
                }
                if let Err(e) = fs::remove_file(&path) {
                    warn!("Failed to remove old checkpoint {:?}: {}", path, e);
                }
            }
            info!("Removed old checkpoint: {}", name);
        }
    }

    /// Check if a checkpoint exists
    pub fn exists(&self, name: &str) -> bool {
        self.model_path(name).exists()
    }
}

impl Default for Checkpointer {
    fn default() -> Self {
        Self::new("./checkpoints", 5)
    }
}

/// Generate a checkpoint name with timestamp
pub fn timestamped_name(prefix: &str) -> String {
    let now = chrono::Utc::now();
    format!("{}_{}", prefix, now.format("%Y%m%d_%H%M%S"))
}

/// Generate a checkpoint name with episode number
pub fn episode_name(prefix: &str, episode: usize) -> String {
    format!("{}_ep{:06}", prefix, episode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;

    #[test]
    fn test_checkpoint_paths() {
        let checkpointer = Checkpointer::new(temp_dir().join("qtrader_test_ckpt"), 5);

        let path = checkpointer.model_path("dqn_v1");
        assert!(path.to_string_lossy().ends_with("dqn_v1.model.json"));
        assert!(checkpointer
            .buffer_path("dqn_v1")
            .to_string_lossy()
            .ends_with("dqn_v1.buffer.json"));
    }

    #[test]
    fn test_cleanup_keeps_newest() {
        let dir = temp_dir().join("qtrader_test_ckpt_cleanup");
        let _ = fs::remove_dir_all(&dir);
        let checkpointer = Checkpointer::new(&dir, 2);

        for ep in 1..=4 {
            let name = episode_name("dqn", ep);
            fs::write(checkpointer.model_path(&name), "{}").unwrap();
            fs::write(checkpointer.buffer_path(&name), "{}").unwrap();
        }
        checkpointer.cleanup_old_checkpoints();

        assert_eq!(
            checkpointer.list_checkpoints(),
            vec!["dqn_ep000003".to_string(), "dqn_ep000004".to_string()]
        );
        assert!(!checkpointer.buffer_path("dqn_ep000001").exists());
        assert_eq!(
            checkpointer.latest_checkpoint().as_deref(),
            Some("dqn_ep000004")
        );
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_checkpoint() {
        let checkpointer = Checkpointer::new(temp_dir().join("qtrader_test_ckpt_missing"), 5);
        assert!(checkpointer.require("nope").is_err());
        assert!(checkpointer.read_progress("nope").unwrap().is_none());
    }

    #[test]
    fn test_timestamped_name() {
        let name = timestamped_name("dqn");
        assert!(name.starts_with("dqn_"));
        assert!(name.len() > 10);
    }

    #[test]
    fn test_episode_name() {
        let name = episode_name("dqn", 100);
        assert_eq!(name, "dqn_ep000100");
    }
}
