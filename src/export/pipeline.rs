//! Background export worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::ExporterConfig;
use crate::export::sink::{MeasurementSink, PipelineStats, StatsSnapshot, DEFAULT_QUEUE_CAPACITY};
use crate::export::{ExportError, Exporter};
use crate::instruments::Measurement;
use crate::observability::metrics;

/// Tuning for the export worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Export as soon as this many measurements are buffered.
    pub max_batch_size: usize,
    /// Export whatever is buffered at least this often.
    pub export_interval: Duration,
    /// Upper bound on the drain + flush performed at shutdown.
    pub flush_timeout: Duration,
    /// Measurements the sink may queue before it starts dropping.
    pub queue_capacity: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_batch_size: 512,
            export_interval: Duration::from_millis(1000),
            flush_timeout: Duration::from_secs(5),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl From<&ExporterConfig> for PipelineSettings {
    fn from(config: &ExporterConfig) -> Self {
        Self {
            max_batch_size: config.max_batch_size.max(1),
            export_interval: Duration::from_millis(config.export_interval_ms),
            flush_timeout: Duration::from_secs(config.flush_timeout_secs),
            queue_capacity: config.queue_capacity.max(1),
        }
    }
}

/// Running export pipeline.
pub struct ExportPipeline {
    sink: MeasurementSink,
    stats: Arc<PipelineStats>,
    token: CancellationToken,
    worker: JoinHandle<()>,
    flush_timeout: Duration,
}

impl ExportPipeline {
    /// Spawn the export worker on the current runtime.
    pub fn start(exporter: Arc<dyn Exporter>, settings: PipelineSettings) -> Self {
        let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));
        let stats = Arc::new(PipelineStats::default());
        let sink = MeasurementSink::with_stats(tx, stats.clone());
        let token = CancellationToken::new();

        tracing::info!(
            exporter = %exporter.name(),
            max_batch_size = settings.max_batch_size,
            queue_capacity = settings.queue_capacity,
            export_interval_ms = settings.export_interval.as_millis() as u64,
            "Export pipeline starting"
        );

        let worker = ExportWorker {
            rx,
            exporter,
            stats: stats.clone(),
            buffer: Vec::with_capacity(settings.max_batch_size),
            settings,
        };
        let worker = tokio::spawn(worker.run(token.clone()));

        Self {
            sink,
            stats,
            token,
            worker,
            flush_timeout: settings.flush_timeout,
        }
    }

    pub fn sink(&self) -> MeasurementSink {
        self.sink.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop the worker after draining and flushing, bounded by the flush timeout.
    pub async fn shutdown(self) -> Result<StatsSnapshot, ExportError> {
        self.token.cancel();
        let mut worker = self.worker;

        match time::timeout(self.flush_timeout, &mut worker).await {
            Ok(Ok(())) => Ok(self.stats.snapshot()),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Export worker failed");
                Ok(self.stats.snapshot())
            }
            Err(_) => {
                worker.abort();
                let _ = worker.await;
                let lost = self.stats.drop_backlog();
                tracing::warn!(
                    timeout_ms = self.flush_timeout.as_millis() as u64,
                    lost,
                    "Export flush timed out, remaining measurements are lost"
                );
                Err(ExportError::Timeout(self.flush_timeout))
            }
        }
    }
}

struct ExportWorker {
    rx: mpsc::Receiver<Measurement>,
    exporter: Arc<dyn Exporter>,
    stats: Arc<PipelineStats>,
    buffer: Vec<Measurement>,
    settings: PipelineSettings,
}

impl ExportWorker {
    async fn run(mut self, token: CancellationToken) {
        let period = self.settings.export_interval.max(Duration::from_millis(1));
        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                received = self.rx.recv() => match received {
                    Some(m) => {
                        self.buffer.push(m);
                        if self.buffer.len() >= self.settings.max_batch_size {
                            self.export_buffer().await;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => self.export_buffer().await,
            }
        }

        while let Ok(m) = self.rx.try_recv() {
            self.buffer.push(m);
            if self.buffer.len() >= self.settings.max_batch_size {
                self.export_buffer().await;
            }
        }
        self.export_buffer().await;

        if let Err(e) = self.exporter.flush().await {
            tracing::warn!(exporter = %self.exporter.name(), error = %e, "Exporter flush failed");
            metrics::record_export_failure(self.exporter.name());
        }
        tracing::info!(exporter = %self.exporter.name(), "Export pipeline stopped");
    }

    async fn export_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.buffer);
        let n = batch.len();

        match self.exporter.export(&batch).await {
            Ok(()) => {
                self.stats.record_exported(n);
                metrics::record_export_batch(self.exporter.name(), n);
            }
            Err(e) => {
                tracing::warn!(
                    exporter = %self.exporter.name(),
                    batch_size = n,
                    error = %e,
                    "Export failed, dropping batch"
                );
                self.stats.record_failed_batch(n);
                metrics::record_export_failure(self.exporter.name());
            }
        }
    }
}
