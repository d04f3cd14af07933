//! Live loop: replay ticks at a fixed cadence and turn greedy actions into
//! outbound signals.

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::sink::SignalSink;
use crate::domain::{Signal, Tick};
use crate::error::Result;
use crate::rl::core::Action;
use crate::rl::evaluation::Evaluator;
use crate::rl::networks::ActionValueEstimator;

/// Replays a recorded series as if it were a live feed
pub struct TickReplay {
    ticks: Vec<Tick>,
    interval: Duration,
}

impl TickReplay {
    pub fn new(ticks: Vec<Tick>, interval_ms: u64) -> Self {
        Self {
            ticks,
            interval: Duration::from_millis(interval_ms),
        }
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Spawn the feed task. The channel closes after the last tick or once
    /// the receiver is dropped.
    pub fn spawn(self, buffer: usize) -> (mpsc::Receiver<Tick>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            for tick in self.ticks {
                ticker.tick().await;
                if tx.send(tick).await.is_err() {
                    debug!("Tick receiver dropped, stopping replay");
                    return;
                }
            }
        });
        (rx, handle)
    }
}

/// Counters for one emitter run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitterStats {
    pub ticks: u64,
    pub signals: u64,
    pub holds: u64,
    pub send_failures: u64,
}

/// Queries the policy for every tick and fans non-HOLD actions out to sinks
pub struct SignalEmitter<E: ActionValueEstimator> {
    evaluator: Evaluator<E>,
    sinks: Vec<Box<dyn SignalSink>>,
    symbol: String,
    quantity: f64,
    stats: EmitterStats,
}

impl<E: ActionValueEstimator> SignalEmitter<E> {
    pub fn new(evaluator: Evaluator<E>, symbol: impl Into<String>, quantity: f64) -> Self {
        Self {
            evaluator,
            sinks: Vec::new(),
            symbol: symbol.into(),
            quantity,
            stats: EmitterStats::default(),
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn SignalSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn stats(&self) -> &EmitterStats {
        &self.stats
    }

    /// Handle one tick. A failing sink is logged and skipped so the others
    /// still receive the signal.
    pub async fn handle_tick(&mut self, tick: &Tick) -> Option<Signal> {
        self.stats.ticks += 1;
        let action = self.evaluator.predict(tick);

        let Some(signal) = Signal::from_action(action, &self.symbol, self.quantity) else {
            debug_assert_eq!(action, Action::Hold);
            self.stats.holds += 1;
            return None;
        };

        for sink in &self.sinks {
            if let Err(e) = sink.send(&signal).await {
                self.stats.send_failures += 1;
                warn!(sink = sink.name(), error = %e, "Failed to send signal");
            }
        }
        self.stats.signals += 1;
        debug!(price = tick.price, action = %signal.action, "Emitted signal");
        Some(signal)
    }

    /// Drain `ticks` until the feed ends or `shutdown` flips to true
    pub async fn run(
        &mut self,
        mut ticks: mpsc::Receiver<Tick>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<EmitterStats> {
        info!(
            symbol = %self.symbol,
            sinks = self.sinks.len(),
            "Signal emitter started"
        );

        loop {
            tokio::select! {
                maybe_tick = ticks.recv() => {
                    match maybe_tick {
                        Some(tick) => {
                            self.handle_tick(&tick).await;
                        }
                        None => {
                            info!("Tick feed finished");
                            break;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown requested, stopping emitter");
                        break;
                    }
                }
            }
        }

        info!(
            ticks = self.stats.ticks,
            signals = self.stats.signals,
            holds = self.stats.holds,
            failures = self.stats.send_failures,
            "Signal emitter stopped"
        );
        Ok(self.stats.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QTraderError;
    use crate::rl::core::{ActionValues, State};
    use crate::rl::memory::Transition;
    use crate::rl::networks::{Architecture, LinearEstimator};
    use async_trait::async_trait;
    use std::path::Path;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct RecordingSink {
        received: Arc<Mutex<Vec<Signal>>>,
    }

    #[async_trait]
    impl SignalSink for RecordingSink {
        async fn send(&self, signal: &Signal) -> Result<()> {
            self.received.lock().unwrap().push(signal.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    struct FailingSink;

    #[async_trait]
    impl SignalSink for FailingSink {
        async fn send(&self, _signal: &Signal) -> Result<()> {
            Err(QTraderError::Validation("sink offline".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Returns the same values for every state
    #[derive(Clone)]
    struct ConstantEstimator(ActionValues);

    impl ActionValueEstimator for ConstantEstimator {
        fn architecture(&self) -> Architecture {
            Architecture::new("constant", 1, vec![2, 3])
        }

        fn evaluate(&self, _state: &State) -> ActionValues {
            self.0
        }

        fn train_step(&mut self, _batch: &[Transition], _target: &Self, _gamma: f64) -> f64 {
            0.0
        }

        fn sync_from(&mut self, source: &Self) {
            self.0 = source.0;
        }

        fn is_finite(&self) -> bool {
            self.0.iter().all(|v| v.is_finite())
        }

        fn save(&self, _path: &Path) -> Result<()> {
            Ok(())
        }

        fn load(&mut self, _path: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn ticks(n: usize) -> Vec<Tick> {
        (0..n)
            .map(|i| Tick::new(i as f64, "BTCUSDT", 1.0 + 0.01 * i as f64, 1.0))
            .collect()
    }

    fn evaluator() -> Evaluator<LinearEstimator> {
        let mut rng = StdRng::seed_from_u64(11);
        Evaluator::new(LinearEstimator::new(0.01, &mut rng).unwrap())
    }

    #[tokio::test]
    async fn test_emitter_forwards_non_hold_actions() {
        let sink = RecordingSink::default();
        let received = sink.received.clone();
        let series = ticks(20);
        let expected: Vec<Action> = evaluator()
            .policy_actions(&series)
            .into_iter()
            .filter(|a| *a != Action::Hold)
            .collect();

        let mut emitter =
            SignalEmitter::new(evaluator(), "BTCUSDT", 0.5).with_sink(Box::new(sink));
        let (rx, handle) = TickReplay::new(series, 1).spawn(8);
        let (_tx, shutdown) = watch::channel(false);
        let stats = emitter.run(rx, shutdown).await.unwrap();
        handle.await.unwrap();

        assert_eq!(stats.ticks, 20);
        assert_eq!(stats.signals + stats.holds, 20);
        let got: Vec<Action> = received.lock().unwrap().iter().map(|s| s.action).collect();
        assert_eq!(got, expected);
        assert!(received.lock().unwrap().iter().all(|s| s.quantity == 0.5));
    }

    #[tokio::test]
    async fn test_emitter_survives_sink_failure() {
        let recording = RecordingSink::default();
        let received = recording.received.clone();
        // BUY is always greedy, so every tick produces a signal
        let buyer = Evaluator::new(ConstantEstimator([1.0, 0.0, 0.0]));
        let mut emitter = SignalEmitter::new(buyer, "BTCUSDT", 1.0)
            .with_sink(Box::new(FailingSink))
            .with_sink(Box::new(recording));

        for tick in ticks(5) {
            emitter.handle_tick(&tick).await;
        }
        let stats = emitter.stats().clone();
        assert_eq!(stats.signals, 5);
        assert_eq!(stats.holds, 0);
        assert_eq!(stats.send_failures, stats.signals);
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 5);
        assert!(received.iter().all(|s| s.action == Action::Buy));
    }

    #[test]
    fn test_shutdown_stops_emitter() {
        tokio_test::block_on(async {
            let mut emitter = SignalEmitter::new(evaluator(), "BTCUSDT", 1.0);
            // feed that never produces a tick
            let (_feed, rx) = mpsc::channel::<Tick>(1);
            let (tx, shutdown) = watch::channel(false);
            tx.send(true).unwrap();
            let stats = emitter.run(rx, shutdown).await.unwrap();
            assert_eq!(stats, EmitterStats::default());
        });
    }
}
