//! Instrument kinds and descriptors.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Aggregation semantics of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    /// Monotonic sum, recorded by application code.
    Counter,
    /// Bidirectional sum, recorded by application code.
    UpDownCounter,
    /// Distribution of individual values.
    Histogram,
    /// Last recorded value.
    Gauge,
    /// Monotonic cumulative total, reported by an observer callback.
    ObservableCounter,
    /// Bidirectional cumulative total, reported by an observer callback.
    ObservableUpDownCounter,
    /// Current value, reported by an observer callback.
    ObservableGauge,
}

impl InstrumentKind {
    /// True for kinds recorded through `emit`.
    pub fn is_synchronous(self) -> bool {
        matches!(
            self,
            InstrumentKind::Counter
                | InstrumentKind::UpDownCounter
                | InstrumentKind::Histogram
                | InstrumentKind::Gauge
        )
    }

    /// True for kinds whose values may never decrease.
    pub fn is_monotonic(self) -> bool {
        matches!(self, InstrumentKind::Counter | InstrumentKind::ObservableCounter)
    }

    pub(crate) fn mode(self) -> &'static str {
        if self.is_synchronous() {
            "synchronous"
        } else {
            "asynchronous"
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstrumentKind::Counter => "counter",
            InstrumentKind::UpDownCounter => "up_down_counter",
            InstrumentKind::Histogram => "histogram",
            InstrumentKind::Gauge => "gauge",
            InstrumentKind::ObservableCounter => "observable_counter",
            InstrumentKind::ObservableUpDownCounter => "observable_up_down_counter",
            InstrumentKind::ObservableGauge => "observable_gauge",
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to register an instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub name: String,
    pub kind: InstrumentKind,
    pub unit: Option<String>,
    pub description: Option<String>,
}

impl Descriptor {
    pub fn new(name: impl Into<String>, kind: InstrumentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            unit: None,
            description: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Handle to a registered instrument.
///
/// Cheap to clone. Equality and hashing use the name, which is unique within
/// a registry.
#[derive(Debug, Clone)]
pub struct Instrument {
    inner: Arc<Descriptor>,
}

impl Instrument {
    pub(crate) fn new(descriptor: Descriptor) -> Self {
        Self {
            inner: Arc::new(descriptor),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> InstrumentKind {
        self.inner.kind
    }

    pub fn unit(&self) -> Option<&str> {
        self.inner.unit.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.inner.description.as_deref()
    }

    /// True when both handles came from the same registration.
    pub(crate) fn same_registration(&self, other: &Instrument) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Instrument {
    fn eq(&self, other: &Self) -> bool {
        self.inner.name == other.inner.name
    }
}

impl Eq for Instrument {}

impl Hash for Instrument {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.name.hash(state);
    }
}
