//! Emitter subsystem.
//!
//! # Data Flow
//! ```text
//! EmitterGroup::spawn(name, cadence, work)
//!     → RepeatingTask (tokio task + cancellation token)
//!     → loop { work() → sleep(cadence) } until cancelled or limit reached
//! ```
//!
//! # Design Decisions
//! - One independent task per emitter, no ordering between emitters
//! - Work closures swallow emission errors; an emitter never dies from telemetry
//! - Cancellation is checked between iterations only

pub mod cadence;
pub mod group;
pub mod task;

pub use cadence::Cadence;
pub use group::{EmitterGroup, GroupReport};
pub use task::{LiveTaskGuard, RepeatingTask, TaskBuilder};
