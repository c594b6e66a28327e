//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the harness.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the harness.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HarnessConfig {
    /// Service identity attached to every export.
    pub service: ServiceConfig,

    /// Exporter connection and pipeline tuning.
    pub exporter: ExporterConfig,

    /// Demo workload emitters and observers.
    pub workload: WorkloadConfig,

    /// Logging and the local Prometheus endpoint.
    pub observability: ObservabilityConfig,

    /// Key-value probe settings.
    pub kv: KvConfig,
}

/// Service identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "myservice".to_string(),
            version: "1.0.0".to_string(),
        }
    }
}

/// Exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Connection string, `scheme://<token>@host/<project_id>`.
    /// Overridden by the `HARNESS_DSN` environment variable.
    pub dsn: Option<String>,

    /// Export buffered measurements at least this often (milliseconds).
    pub export_interval_ms: u64,

    /// Observer collection interval (milliseconds).
    pub collect_interval_ms: u64,

    /// Export as soon as this many measurements are buffered.
    pub max_batch_size: usize,

    /// Measurements queued for the export worker; overflow is dropped.
    pub queue_capacity: usize,

    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Upper bound on the final drain and flush at shutdown, in seconds.
    pub flush_timeout_secs: u64,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            export_interval_ms: 1_000,
            collect_interval_ms: 10_000,
            max_batch_size: 512,
            queue_capacity: 8_192,
            request_timeout_secs: 5,
            flush_timeout_secs: 5,
        }
    }
}

/// Demo workload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Start the demo emitters and observers.
    pub enabled: bool,

    /// Prefix for every instrument name.
    pub prefix: String,

    /// Requests counter interval (milliseconds).
    pub counter_interval_ms: u64,

    /// In-flight up/down counter interval (milliseconds).
    pub up_down_interval_ms: u64,

    /// Latency histogram interval (milliseconds).
    pub histogram_interval_ms: u64,

    /// Labelled cache counter and cache simulator interval (milliseconds).
    pub cache_interval_ms: u64,

    /// Random extra delay added to every interval (milliseconds, 0 = fixed).
    pub jitter_ms: u64,

    /// Probability that a labelled cache lookup is a hit.
    pub cache_hit_probability: f64,

    /// Standard deviation of simulated request latency (milliseconds).
    pub latency_stddev_ms: f64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: "app".to_string(),
            counter_interval_ms: 1,
            up_down_interval_ms: 1_000,
            histogram_interval_ms: 1,
            cache_interval_ms: 1,
            jitter_ms: 0,
            cache_hit_probability: 0.3,
            latency_stddev_ms: 5_000.0,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Mirror measurements to a local Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Key-value probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KvConfig {
    /// Redis connection URL.
    pub url: String,

    /// Per-command timeout in milliseconds.
    pub command_timeout_ms: u64,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            command_timeout_ms: 2_000,
        }
    }
}
