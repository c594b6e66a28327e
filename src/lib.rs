//! Periodic metrics instrumentation harness.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────── HARNESS ─────────────────────────────────┐
//!   │                                                                          │
//!   │  emitters (one task each) ──emit──▶ instruments::registry ──▶ sink ──┐   │
//!   │        │                                 ▲                          │   │
//!   │        ▼                                 │ collect()                │   │
//!   │  state (atomics) ◀──read── observers ────┘                          │   │
//!   │                                 ▲                                   ▼   │
//!   │                      export::collector (tick)        export::pipeline   │
//!   │                                                      batch / flush      │
//!   │                                                             │           │
//!   │  kv::InstrumentedKv ──emit──▶ registry                      ▼           │
//!   │                                          http / prometheus / memory     │
//!   │                                                                          │
//!   │  config · observability · lifecycle (startup, signals, shutdown)        │
//!   └──────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod emitters;
pub mod error;
pub mod export;
pub mod instruments;
pub mod kv;
pub mod lifecycle;
pub mod observability;
pub mod state;
pub mod workload;

pub use config::schema::HarnessConfig;
pub use error::{HarnessError, Result};
pub use lifecycle::{Harness, Shutdown, ShutdownReport};
