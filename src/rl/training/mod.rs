//! Training Infrastructure
//!
//! The online training loop and checkpointing.

pub mod checkpointing;
pub mod trainer;

pub use checkpointing::{episode_name, timestamped_name, Checkpointer, TrainerProgress};
pub use trainer::{EpisodeSummary, StepReport, Trainer, TrainerPhase, TrainingStats};
