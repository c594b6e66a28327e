//! Fire-and-forget handle between the registry and the export worker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::instruments::Measurement;
use crate::observability::metrics;

/// Counters describing what happened to measurements after emission.
#[derive(Debug, Default)]
pub struct PipelineStats {
    accepted: AtomicU64,
    exported: AtomicU64,
    dropped: AtomicU64,
    failed_batches: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub exported: u64,
    pub dropped: u64,
    pub failed_batches: u64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            exported: self.exported.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_exported(&self, n: usize) {
        self.exported.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_batch(&self, n: usize) {
        self.failed_batches.fetch_add(1, Ordering::Relaxed);
        self.record_dropped(n);
    }

    /// Count everything accepted but neither exported nor dropped as lost.
    /// Returns how many were added.
    pub(crate) fn drop_backlog(&self) -> u64 {
        let snapshot = self.snapshot();
        let backlog = snapshot
            .accepted
            .saturating_sub(snapshot.exported)
            .saturating_sub(snapshot.dropped);
        if backlog > 0 {
            self.record_dropped(backlog as usize);
        }
        backlog
    }

    pub(crate) fn record_dropped(&self, n: usize) {
        self.dropped.fetch_add(n as u64, Ordering::Relaxed);
        metrics::record_dropped(n);
    }
}

/// Queue capacity used by [`MeasurementSink::channel`].
pub const DEFAULT_QUEUE_CAPACITY: usize = 8_192;

/// Cloneable sender of measurements.
///
/// Sending never blocks and never fails from the caller's point of view:
/// when the queue is full or the worker is gone the measurement is counted
/// as dropped.
#[derive(Debug, Clone)]
pub struct MeasurementSink {
    tx: mpsc::Sender<Measurement>,
    stats: Arc<PipelineStats>,
}

impl MeasurementSink {
    /// A sink with a bare receiver, for callers that drive export themselves.
    pub fn channel() -> (Self, mpsc::Receiver<Measurement>) {
        Self::bounded(DEFAULT_QUEUE_CAPACITY)
    }

    /// Like [`channel`](Self::channel) with an explicit queue capacity.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Measurement>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::with_stats(tx, Arc::new(PipelineStats::default())), rx)
    }

    pub(crate) fn with_stats(tx: mpsc::Sender<Measurement>, stats: Arc<PipelineStats>) -> Self {
        Self { tx, stats }
    }

    pub fn send(&self, measurement: Measurement) {
        match self.tx.try_send(measurement) {
            Ok(()) => {
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(m)) => {
                tracing::trace!(instrument = %m.instrument.name(), "Export queue full, dropping measurement");
                self.stats.record_dropped(1);
            }
            Err(TrySendError::Closed(m)) => {
                tracing::debug!(instrument = %m.instrument.name(), "Export pipeline closed, dropping measurement");
                self.stats.record_dropped(1);
            }
        }
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::{Descriptor, Instrument, InstrumentKind, Labels, Value};

    fn measurement() -> Measurement {
        let instrument = Instrument::new(Descriptor::new("requests", InstrumentKind::Counter));
        Measurement::new(instrument, Value::Int(1), Labels::new())
    }

    #[test]
    fn test_send_counts_accepted() {
        let (sink, mut rx) = MeasurementSink::channel();
        sink.send(measurement());
        sink.send(measurement());
        assert_eq!(sink.stats().snapshot().accepted, 2);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_closed_channel_drops_without_error() {
        let (sink, rx) = MeasurementSink::channel();
        drop(rx);
        sink.send(measurement());
        let stats = sink.stats().snapshot();
        assert_eq!(stats.accepted, 0);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn test_full_queue_drops_overflow() {
        let (sink, mut rx) = MeasurementSink::bounded(3);
        for _ in 0..10 {
            sink.send(measurement());
        }
        let stats = sink.stats().snapshot();
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.dropped, 7);

        assert!(rx.try_recv().is_ok());
        sink.send(measurement());
        assert_eq!(sink.stats().snapshot().accepted, 4);
    }

    #[test]
    fn test_drop_backlog_counts_unexported() {
        let (sink, _rx) = MeasurementSink::bounded(16);
        for _ in 0..10 {
            sink.send(measurement());
        }
        sink.stats().record_exported(4);
        sink.stats().record_dropped(1);

        assert_eq!(sink.stats().drop_backlog(), 5);
        assert_eq!(sink.stats().drop_backlog(), 0);
        let stats = sink.stats().snapshot();
        assert_eq!(stats.exported + stats.dropped, stats.accepted);
    }
}
