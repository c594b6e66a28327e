//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Export pipeline → Registry → Workload registration
//!            → Emitters → Collector
//!
//! Shutdown (startup.rs, shutdown.rs):
//!     Signal received → Cancel emitters → Final collection
//!                     → Drain + export + flush (bounded) → Exit
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM/SIGQUIT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: export path first, producers last
//! - Ordered shutdown: producers stop before the exporter drains
//! - Every shutdown step has a timeout

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{Harness, ShutdownReport};
