//! Instrument subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Descriptor → registry.register() → Instrument handle
//!
//! Synchronous path (emitter tasks):
//!     emit(instrument, value, labels) → validate → MeasurementSink
//!
//! Asynchronous path (collector tick):
//!     registry.collect() → observer callbacks → validate → MeasurementSink
//! ```
//!
//! # Design Decisions
//! - Instruments are immutable once registered
//! - Emission validates synchronously and never waits on export
//! - Observer callbacks only read shared state

pub mod kind;
pub mod measurement;
pub mod registry;

pub use kind::{Descriptor, Instrument, InstrumentKind};
pub use measurement::{Labels, Measurement, Value};
pub use registry::{InstrumentRegistry, ObserverId, Observations};
