//! Replay Buffer
//!
//! Bounded experience replay for off-policy Q-learning.

use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use crate::error::{QTraderError, Result};
use crate::rl::core::{action_distribution, Action, State, NUM_ACTIONS};

/// Default maximum number of stored transitions
pub const DEFAULT_CAPACITY: usize = 50_000;

/// A single transition in the environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// State before action
    pub state: State,
    /// Action taken
    pub action: Action,
    /// Clamped reward received
    pub reward: f64,
    /// State at the following tick
    pub next_state: State,
}

impl Transition {
    /// Create a new transition
    pub fn new(state: State, action: Action, reward: f64, next_state: State) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
        }
    }
}

/// On-disk form of the buffer contents, oldest transition first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferSnapshot {
    pub capacity: usize,
    pub transitions: Vec<Transition>,
}

/// Fixed-capacity FIFO store of transitions.
///
/// `len() <= capacity()` holds after every operation; once full, each push
/// evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct ExperienceBuffer {
    /// Storage for transitions
    buffer: VecDeque<Transition>,
    /// Maximum capacity
    capacity: usize,
}

impl ExperienceBuffer {
    /// Create a new buffer with given capacity (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
        }
    }

    /// Add a transition, evicting the oldest one when full
    pub fn push(&mut self, transition: Transition) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Sample `batch_size` distinct transitions uniformly without replacement.
    ///
    /// Fails with [`QTraderError::InsufficientData`] when fewer than
    /// `batch_size` transitions are stored. The returned order is arbitrary.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<Vec<Transition>> {
        if self.buffer.len() < batch_size {
            return Err(QTraderError::InsufficientData {
                requested: batch_size,
                available: self.buffer.len(),
            });
        }

        Ok(index::sample(rng, self.buffer.len(), batch_size)
            .into_iter()
            .map(|i| self.buffer[i].clone())
            .collect())
    }

    /// Iterate stored transitions, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }

    /// Clear all transitions
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Get current number of transitions
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if buffer has enough samples for training
    pub fn has_enough_samples(&self, min_samples: usize) -> bool {
        self.buffer.len() >= min_samples
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.buffer.len() as f64 / self.capacity as f64
    }

    /// Mean reward of stored transitions, 0 when empty
    pub fn average_reward(&self) -> f64 {
        if self.buffer.is_empty() {
            return 0.0;
        }
        self.buffer.iter().map(|t| t.reward).sum::<f64>() / self.buffer.len() as f64
    }

    /// Count of stored transitions per action
    pub fn action_distribution(&self) -> [usize; NUM_ACTIONS] {
        action_distribution(self.buffer.iter().map(|t| &t.action))
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        BufferSnapshot {
            capacity: self.capacity,
            transitions: self.buffer.iter().cloned().collect(),
        }
    }

    /// Rebuild from a snapshot. Only the newest `capacity` transitions are
    /// kept if the snapshot holds more.
    pub fn from_snapshot(snapshot: BufferSnapshot) -> Self {
        let mut buffer = Self::new(snapshot.capacity);
        for transition in snapshot.transitions {
            buffer.push(transition);
        }
        buffer
    }

    /// Same contents under a new capacity, dropping the oldest entries if
    /// they no longer fit
    pub fn resized(self, capacity: usize) -> Self {
        Self::from_snapshot(BufferSnapshot {
            capacity,
            transitions: self.buffer.into_iter().collect(),
        })
    }

    /// Persist contents as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string(&self.snapshot())?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load contents previously written by [`ExperienceBuffer::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let snapshot: BufferSnapshot = serde_json::from_str(&content)?;
        Ok(Self::from_snapshot(snapshot))
    }
}

impl Default for ExperienceBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn make_transition(reward: f64) -> Transition {
        Transition::new(
            State::new(100.0 + reward, 1.0),
            Action::Buy,
            reward,
            State::new(101.0 + reward, 1.0),
        )
    }

    #[test]
    fn test_buffer_push_evicts_oldest() {
        let mut buffer = ExperienceBuffer::new(10);

        for i in 0..15 {
            buffer.push(make_transition(i as f64));
            assert!(buffer.len() <= buffer.capacity());
        }

        // Should only keep last 10
        assert_eq!(buffer.len(), 10);
        let rewards: Vec<f64> = buffer.iter().map(|t| t.reward).collect();
        assert_eq!(rewards, (5..15).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn test_buffer_sample_distinct() {
        let mut buffer = ExperienceBuffer::new(100);
        let mut rng = StdRng::seed_from_u64(7);

        for i in 0..50 {
            buffer.push(make_transition(i as f64));
        }

        let batch = buffer.sample(10, &mut rng).unwrap();
        assert_eq!(batch.len(), 10);

        let rewards: HashSet<u64> = batch.iter().map(|t| t.reward as u64).collect();
        assert_eq!(rewards.len(), 10);
        assert!(rewards.iter().all(|r| *r < 50));
    }

    #[test]
    fn test_buffer_sample_underfilled() {
        let mut buffer = ExperienceBuffer::new(100);
        let mut rng = StdRng::seed_from_u64(7);
        buffer.push(make_transition(1.0));

        match buffer.sample(2, &mut rng) {
            Err(QTraderError::InsufficientData {
                requested,
                available,
            }) => {
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn test_single_push_sample_one() {
        let mut buffer = ExperienceBuffer::default();
        let mut rng = StdRng::seed_from_u64(1);
        let transition = make_transition(0.5);
        buffer.push(transition.clone());

        let batch = buffer.sample(1, &mut rng).unwrap();
        assert_eq!(batch, vec![transition]);
    }

    #[test]
    fn test_snapshot_roundtrip_respects_capacity() {
        let snapshot = BufferSnapshot {
            capacity: 3,
            transitions: (0..5).map(|i| make_transition(i as f64)).collect(),
        };
        let buffer = ExperienceBuffer::from_snapshot(snapshot);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.iter().next().unwrap().reward, 2.0);
    }

    #[test]
    fn test_buffer_stats() {
        let mut buffer = ExperienceBuffer::new(4);
        assert_eq!(buffer.average_reward(), 0.0);
        buffer.push(make_transition(1.0));
        buffer.push(Transition::new(
            State::new(1.0, 1.0),
            Action::Hold,
            0.0,
            State::new(1.0, 1.0),
        ));
        assert_eq!(buffer.average_reward(), 0.5);
        assert_eq!(buffer.action_distribution(), [1, 0, 1]);
        assert_eq!(buffer.fill_ratio(), 0.5);
    }
}
