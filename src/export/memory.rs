//! In-memory exporter for tests and dry runs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::export::{ExportError, Exporter};
use crate::instruments::Measurement;

#[derive(Default)]
struct Captured {
    batches: Mutex<Vec<Vec<Measurement>>>,
    failing: AtomicBool,
    flushes: AtomicU64,
}

/// Keeps every exported batch in memory. Clones share the same storage.
#[derive(Clone, Default)]
pub struct InMemoryExporter {
    inner: Arc<Captured>,
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every export fails with [`ExportError::Rejected`].
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::Relaxed);
    }

    /// All captured measurements in export order.
    pub fn measurements(&self) -> Vec<Measurement> {
        self.inner
            .batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.inner
            .batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(Vec::len)
            .collect()
    }

    pub fn flush_count(&self) -> u64 {
        self.inner.flushes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Exporter for InMemoryExporter {
    fn name(&self) -> &str {
        "memory"
    }

    async fn export(&self, batch: &[Measurement]) -> Result<(), ExportError> {
        if self.inner.failing.load(Ordering::Relaxed) {
            return Err(ExportError::Rejected("in-memory exporter set to fail".into()));
        }
        self.inner
            .batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch.to_vec());
        Ok(())
    }

    async fn flush(&self) -> Result<(), ExportError> {
        self.inner.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
