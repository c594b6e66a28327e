//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (self-metrics: exported batches, drops, rejections)
//!
//! Consumers:
//!     → stdout (pretty for development, JSON for machines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Self-metrics go through the `metrics` facade, so they cost nothing
//!   until a recorder is installed
//! - Harness measurements and self-metrics share the same recorder when the
//!   Prometheus endpoint is enabled
//! - Log level comes from `RUST_LOG` first, then config

pub mod logging;
pub mod metrics;

pub use self::logging::init_logging;
pub use self::metrics::init_metrics;
