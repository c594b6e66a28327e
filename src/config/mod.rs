//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (HARNESS_DSN)
//!     → validation.rs (semantic checks)
//!     → HarnessConfig (validated, immutable)
//!
//! Binaries that export:
//!     require_dsn() → dsn.rs (parse) → exporter
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A missing DSN is fatal only where an exporter is built

pub mod dsn;
pub mod loader;
pub mod schema;
pub mod validation;

pub use dsn::{Dsn, DsnError};
pub use loader::{load_config, load_or_default, require_dsn, ConfigError, CONFIG_ENV, DSN_ENV};
pub use schema::{
    ExporterConfig, HarnessConfig, KvConfig, LogFormat, ObservabilityConfig, ServiceConfig,
    WorkloadConfig,
};
