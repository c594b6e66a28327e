//! Startup orchestration and ordered teardown.
//!
//! # Responsibilities
//! - Start the export pipeline before anything can emit
//! - Register the workload and fail fast on any registration error
//! - Start emitters and the collector last
//! - Tear down in reverse: emitters, collector, pipeline
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The collector has its own token so it can run one last collection
//!   after every emitter has stopped

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::HarnessConfig;
use crate::emitters::EmitterGroup;
use crate::error::Result;
use crate::export::{
    ExportPipeline, Exporter, MeasurementSink, PeriodicCollector, PipelineSettings, StatsSnapshot,
};
use crate::instruments::InstrumentRegistry;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::state::SampledState;
use crate::workload::Workload;

/// How long emitters get to notice cancellation before they are aborted.
const EMITTER_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Summary of an orderly shutdown.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShutdownReport {
    /// Iterations completed by emitters that stopped in time.
    pub emitter_iterations: u64,
    /// Emitters aborted after the stop timeout.
    pub emitters_aborted: usize,
    /// Observer collections run, including the final one.
    pub collections: u64,
    /// Export counters after the final flush.
    pub export: StatsSnapshot,
    /// Set when the final drain and flush did not finish in time.
    pub flush_error: Option<String>,
}

/// A running harness.
pub struct Harness {
    shutdown: Shutdown,
    registry: Arc<InstrumentRegistry>,
    state: Arc<SampledState>,
    pipeline: ExportPipeline,
    emitters: EmitterGroup,
    collector_token: CancellationToken,
    collector: JoinHandle<u64>,
}

impl Harness {
    /// Start every subsystem against `exporter`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(config: &HarnessConfig, exporter: Arc<dyn Exporter>) -> Result<Self> {
        let exporter_name = exporter.name().to_string();
        let pipeline = ExportPipeline::start(exporter, PipelineSettings::from(&config.exporter));
        let registry = Arc::new(InstrumentRegistry::new(pipeline.sink()));
        let state = SampledState::new();
        let shutdown = Shutdown::new();

        let mut emitters = EmitterGroup::new(shutdown.token(), state.clone());
        if config.workload.enabled {
            let workload = Workload::register(&config.workload, registry.clone(), state.clone())?;
            workload.spawn(&mut emitters);
        } else {
            tracing::info!("Workload disabled, no emitters started");
        }

        let collector_token = CancellationToken::new();
        let collector = PeriodicCollector::new(
            registry.clone(),
            Duration::from_millis(config.exporter.collect_interval_ms),
        )
        .spawn(collector_token.clone());

        tracing::info!(
            service = %config.service.name,
            version = %config.service.version,
            exporter = %exporter_name,
            instruments = registry.len(),
            emitters = emitters.len(),
            "Harness started"
        );

        Ok(Self {
            shutdown,
            registry,
            state,
            pipeline,
            emitters,
            collector_token,
            collector,
        })
    }

    pub fn registry(&self) -> &Arc<InstrumentRegistry> {
        &self.registry
    }

    pub fn state(&self) -> &Arc<SampledState> {
        &self.state
    }

    pub fn sink(&self) -> MeasurementSink {
        self.pipeline.sink()
    }

    pub fn export_stats(&self) -> StatsSnapshot {
        self.pipeline.stats()
    }

    /// Clone of the shutdown coordinator; triggering it stops the emitters.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Run until a termination signal arrives or the shutdown handle fires,
    /// then tear down.
    pub async fn run_until_signal(self) -> Result<ShutdownReport> {
        self.run_until_stop(signals::wait_for_signal()).await
    }

    /// Like [`run_until_signal`](Self::run_until_signal) with `stop` as the
    /// signal source. Teardown runs even when `stop` fails.
    async fn run_until_stop<F>(self, stop: F) -> Result<ShutdownReport>
    where
        F: Future<Output = io::Result<&'static str>>,
    {
        let trigger = self.shutdown.clone();
        let signal_error = tokio::select! {
            received = stop => received.err(),
            _ = trigger.triggered() => {
                tracing::info!("Shutdown triggered");
                None
            }
        };

        let report = self.shutdown().await;
        match signal_error {
            Some(e) => {
                tracing::error!(error = %e, "Signal handling failed, harness stopped");
                Err(e.into())
            }
            None => Ok(report),
        }
    }

    /// Run until `until` resolves, then tear down.
    pub async fn run_until<F: Future>(self, until: F) -> ShutdownReport {
        until.await;
        self.shutdown().await
    }

    /// Stop emitters, run the final collection, then drain and flush the exporter.
    pub async fn shutdown(self) -> ShutdownReport {
        let Harness {
            shutdown,
            registry: _,
            state: _,
            pipeline,
            emitters,
            collector_token,
            collector,
        } = self;

        shutdown.trigger();
        let group = emitters.shutdown(EMITTER_STOP_TIMEOUT).await;
        tracing::debug!(
            iterations = group.iterations,
            aborted = group.aborted,
            "Emitters stopped"
        );

        collector_token.cancel();
        let collections = match collector.await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, "Collector task failed");
                0
            }
        };

        let stats = pipeline.sink().stats().clone();
        let (export, flush_error) = match pipeline.shutdown().await {
            Ok(snapshot) => (snapshot, None),
            Err(e) => (stats.snapshot(), Some(e.to_string())),
        };

        let report = ShutdownReport {
            emitter_iterations: group.iterations,
            emitters_aborted: group.aborted,
            collections,
            export,
            flush_error,
        };
        tracing::info!(
            emitter_iterations = report.emitter_iterations,
            collections = report.collections,
            exported = report.export.exported,
            dropped = report.export.dropped,
            "Shutdown complete"
        );
        report
    }
}
