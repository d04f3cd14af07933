//! Experience Memory
//!
//! Storage for transitions sampled during Q-learning updates.

mod replay_buffer;

pub use replay_buffer::{BufferSnapshot, ExperienceBuffer, Transition, DEFAULT_CAPACITY};
