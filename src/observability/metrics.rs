//! Self-metrics and Prometheus exposition.
//!
//! # Metrics
//! - `harness_export_batches_total` (counter): batches handed to an exporter, by exporter
//! - `harness_exported_measurements_total` (counter): measurements in those batches
//! - `harness_export_failures_total` (counter): failed exports, by exporter
//! - `harness_dropped_measurements_total` (counter): measurements discarded
//! - `harness_rejected_measurements_total` (counter): emissions refused by the registry
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs a recorder
//! - Metric names are prefixed so they never collide with workload instruments

use std::net::SocketAddr;

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

const EXPORT_BATCHES: &str = "harness_export_batches_total";
const EXPORTED_MEASUREMENTS: &str = "harness_exported_measurements_total";
const EXPORT_FAILURES: &str = "harness_export_failures_total";
const DROPPED: &str = "harness_dropped_measurements_total";
const REJECTED: &str = "harness_rejected_measurements_total";

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!(EXPORT_BATCHES, "Batches handed to an exporter");
    describe_counter!(EXPORTED_MEASUREMENTS, "Measurements exported successfully");
    describe_counter!(EXPORT_FAILURES, "Batches an exporter failed to deliver");
    describe_counter!(DROPPED, "Measurements discarded before export");
    describe_counter!(REJECTED, "Emissions refused by the instrument registry");

    tracing::info!(address = %addr, "Prometheus endpoint listening");
    Ok(())
}

pub fn record_export_batch(exporter: &str, measurements: usize) {
    counter!(EXPORT_BATCHES, "exporter" => exporter.to_string()).increment(1);
    counter!(EXPORTED_MEASUREMENTS, "exporter" => exporter.to_string())
        .increment(measurements as u64);
}

pub fn record_export_failure(exporter: &str) {
    counter!(EXPORT_FAILURES, "exporter" => exporter.to_string()).increment(1);
}

pub fn record_dropped(count: usize) {
    counter!(DROPPED).increment(count as u64);
}

pub fn record_rejected_measurement(instrument: &str) {
    counter!(REJECTED, "instrument" => instrument.to_string()).increment(1);
}
