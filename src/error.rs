//! Error types for the instrumentation harness.
//!
//! Registration errors are startup-time and fatal. Measurement errors are
//! returned synchronously to the caller of `emit`. Export errors live in
//! [`crate::export::ExportError`] and never reach emitters.

use thiserror::Error;

use crate::config::loader::ConfigError;

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors surfaced by the registry and the lifecycle shell.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// An instrument with this name already exists in the registry.
    #[error("instrument already registered: {name}")]
    DuplicateName { name: String },

    /// One of the instruments passed to `register_observer` already has a callback.
    #[error("instrument already has an observer callback: {name}")]
    CallbackAlreadyRegistered { name: String },

    /// The value cannot be recorded into this instrument.
    #[error("invalid measurement for {instrument}: {reason}")]
    InvalidMeasurement { instrument: String, reason: String },

    /// Synchronous operation on an asynchronous instrument, or the reverse.
    #[error("instrument {instrument} is {actual}, expected {expected}")]
    WrongInstrumentKind {
        instrument: String,
        actual: &'static str,
        expected: &'static str,
    },

    /// The handle was not produced by this registry.
    #[error("instrument not registered here: {name}")]
    UnknownInstrument { name: String },

    /// Name fails the naming rules.
    #[error("invalid instrument name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// `register_observer` was called with no instruments.
    #[error("observer must be registered against at least one instrument")]
    EmptyObserverSet,

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error (signal handler installation, socket binding).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Whether the error is caller misuse detected at startup.
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            HarnessError::DuplicateName { .. }
                | HarnessError::CallbackAlreadyRegistered { .. }
                | HarnessError::InvalidName { .. }
                | HarnessError::EmptyObserverSet
        )
    }
}
