//! Export subsystem.
//!
//! # Data Flow
//! ```text
//! registry.emit() / PeriodicCollector tick
//!     → MeasurementSink (bounded channel, never blocks, overflow dropped)
//!     → ExportPipeline worker (buffer until max_batch_size or export_interval)
//!     → Exporter::export(batch)
//!         → HttpExporter (JSON to the DSN ingest URL)
//!         → MetricsFacadeExporter (metrics facade → Prometheus scrape)
//!
//! Shutdown:
//!     cancel → drain channel → export remainder → Exporter::flush()
//!     (bounded by flush_timeout)
//! ```
//!
//! # Design Decisions
//! - Export failures are logged and counted, never surfaced to emitters
//! - No retries: a failed batch is dropped
//! - The collector owns observer cadence; the registry does not schedule

use async_trait::async_trait;
use thiserror::Error;
use std::time::Duration;

use crate::instruments::Measurement;

pub mod collector;
pub mod facade;
pub mod fanout;
pub mod http;
pub mod memory;
pub mod pipeline;
pub mod sink;

pub use collector::PeriodicCollector;
pub use facade::MetricsFacadeExporter;
pub use fanout::FanoutExporter;
pub use http::{HttpExporter, Resource};
pub use memory::InMemoryExporter;
pub use pipeline::{ExportPipeline, PipelineSettings};
pub use sink::{MeasurementSink, PipelineStats, StatsSnapshot};

/// Export failures. Transient from the harness's point of view.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ingest endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("exporter rejected batch: {0}")]
    Rejected(String),

    #[error("export did not finish within {0:?}")]
    Timeout(Duration),
}

/// Destination for measurement batches.
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Short name used in logs and self-metrics.
    fn name(&self) -> &str;

    /// Deliver one batch.
    async fn export(&self, batch: &[Measurement]) -> Result<(), ExportError>;

    /// Push out anything buffered inside the exporter.
    async fn flush(&self) -> Result<(), ExportError> {
        Ok(())
    }
}
