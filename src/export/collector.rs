//! Periodic observer collection.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::instruments::InstrumentRegistry;

/// Drives observer callbacks at a fixed cadence.
///
/// Runs one last collection after cancellation so the final values reach the
/// exporter before it is flushed.
pub struct PeriodicCollector {
    registry: Arc<InstrumentRegistry>,
    interval: Duration,
}

impl PeriodicCollector {
    pub fn new(registry: Arc<InstrumentRegistry>, interval: Duration) -> Self {
        Self {
            registry,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Spawn the collection loop. The handle resolves to the number of collections run.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<u64> {
        tokio::spawn(self.run(token))
    }

    pub async fn run(self, token: CancellationToken) -> u64 {
        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut collections = 0u64;

        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            observers = self.registry.observer_count(),
            "Collector started"
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let n = self.registry.collect_into_sink();
                    collections += 1;
                    tracing::trace!(measurements = n, "Observers collected");
                }
            }
        }

        let n = self.registry.collect_into_sink();
        collections += 1;
        tracing::debug!(measurements = n, collections, "Collector stopped after final collection");
        collections
    }
}
