//! Instrument registry.
//!
//! # Responsibilities
//! - Own every instrument for the process lifetime
//! - Validate and forward synchronous measurements
//! - Keep the observer table and run callbacks on collection
//!
//! # Design Decisions
//! - Names are unique per registry; duplicates are rejected, never merged
//! - An observer claims all of its instruments or none of them
//! - Callbacks run outside the table lock and panics are contained

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{HarnessError, Result};
use crate::export::MeasurementSink;
use crate::instruments::kind::{Descriptor, Instrument, InstrumentKind};
use crate::instruments::measurement::{Labels, Measurement, Value};
use crate::observability::metrics;

const MAX_NAME_LEN: usize = 255;

/// Values reported by one observer invocation.
pub type Observations = HashMap<Instrument, Value>;

type Callback = Arc<dyn Fn() -> Observations + Send + Sync>;

/// Identifier of a registered observer callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct Observer {
    id: ObserverId,
    instruments: Vec<Instrument>,
    callback: Callback,
}

#[derive(Default)]
struct ObserverTable {
    claimed: HashSet<String>,
    observers: Vec<Arc<Observer>>,
}

/// Registry of named instruments bound to a measurement sink.
pub struct InstrumentRegistry {
    instruments: DashMap<String, Instrument>,
    observers: RwLock<ObserverTable>,
    next_observer_id: AtomicU64,
    sink: MeasurementSink,
}

impl InstrumentRegistry {
    pub fn new(sink: MeasurementSink) -> Self {
        Self {
            instruments: DashMap::new(),
            observers: RwLock::new(ObserverTable::default()),
            next_observer_id: AtomicU64::new(1),
            sink,
        }
    }

    /// Register a new instrument.
    pub fn register(&self, descriptor: Descriptor) -> Result<Instrument> {
        validate_name(&descriptor.name)?;

        match self.instruments.entry(descriptor.name.clone()) {
            Entry::Occupied(_) => Err(HarnessError::DuplicateName {
                name: descriptor.name,
            }),
            Entry::Vacant(slot) => {
                tracing::debug!(
                    name = %descriptor.name,
                    kind = %descriptor.kind,
                    unit = ?descriptor.unit,
                    "Instrument registered"
                );
                let instrument = Instrument::new(descriptor);
                slot.insert(instrument.clone());
                Ok(instrument)
            }
        }
    }

    /// Record a value without labels.
    pub fn emit(&self, instrument: &Instrument, value: impl Into<Value>) -> Result<()> {
        self.emit_with_labels(instrument, value, Labels::new())
    }

    /// Record a value into a synchronous instrument.
    ///
    /// Returns once the measurement is queued; delivery to the exporter is
    /// not confirmed.
    pub fn emit_with_labels(
        &self,
        instrument: &Instrument,
        value: impl Into<Value>,
        labels: Labels,
    ) -> Result<()> {
        let value = value.into();
        self.ensure_known(instrument)?;

        if !instrument.kind().is_synchronous() {
            return Err(HarnessError::WrongInstrumentKind {
                instrument: instrument.name().to_string(),
                actual: instrument.kind().mode(),
                expected: "synchronous",
            });
        }

        if let Err(reason) = check_value(instrument.kind(), value) {
            metrics::record_rejected_measurement(instrument.name());
            return Err(HarnessError::InvalidMeasurement {
                instrument: instrument.name().to_string(),
                reason: reason.to_string(),
            });
        }

        self.sink.send(Measurement::new(instrument.clone(), value, labels));
        Ok(())
    }

    /// Bind one callback to one or more asynchronous instruments.
    pub fn register_observer<F>(&self, instruments: &[Instrument], callback: F) -> Result<ObserverId>
    where
        F: Fn() -> Observations + Send + Sync + 'static,
    {
        if instruments.is_empty() {
            return Err(HarnessError::EmptyObserverSet);
        }

        let mut unique: Vec<Instrument> = Vec::with_capacity(instruments.len());
        for instrument in instruments {
            self.ensure_known(instrument)?;
            if instrument.kind().is_synchronous() {
                return Err(HarnessError::WrongInstrumentKind {
                    instrument: instrument.name().to_string(),
                    actual: instrument.kind().mode(),
                    expected: "asynchronous",
                });
            }
            if !unique.contains(instrument) {
                unique.push(instrument.clone());
            }
        }

        let mut table = self.observers.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(taken) = unique.iter().find(|i| table.claimed.contains(i.name())) {
            return Err(HarnessError::CallbackAlreadyRegistered {
                name: taken.name().to_string(),
            });
        }

        let id = ObserverId(self.next_observer_id.fetch_add(1, Ordering::Relaxed));
        for instrument in &unique {
            table.claimed.insert(instrument.name().to_string());
        }
        tracing::debug!(
            observer = id.0,
            instruments = ?unique.iter().map(Instrument::name).collect::<Vec<_>>(),
            "Observer registered"
        );
        table.observers.push(Arc::new(Observer {
            id,
            instruments: unique,
            callback: Arc::new(callback),
        }));

        Ok(id)
    }

    /// Invoke every observer once and return the accepted values.
    pub fn collect(&self) -> Vec<Measurement> {
        let observers: Vec<Arc<Observer>> = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .observers
            .clone();

        let mut out = Vec::new();
        for observer in observers {
            let observations = match catch_unwind(AssertUnwindSafe(|| (observer.callback)())) {
                Ok(observations) => observations,
                Err(_) => {
                    tracing::error!(observer = observer.id.0, "Observer callback panicked, skipping");
                    continue;
                }
            };

            for (instrument, value) in observations {
                if !observer.instruments.iter().any(|i| i.same_registration(&instrument)) {
                    tracing::warn!(
                        observer = observer.id.0,
                        instrument = %instrument.name(),
                        "Observer reported an instrument it is not registered for, dropping"
                    );
                    continue;
                }
                if let Err(reason) = check_value(instrument.kind(), value) {
                    tracing::warn!(instrument = %instrument.name(), %value, reason, "Dropping observed value");
                    metrics::record_rejected_measurement(instrument.name());
                    continue;
                }
                out.push(Measurement::new(instrument, value, Labels::new()));
            }
        }
        out
    }

    /// Collect and forward everything into the sink. Returns the number forwarded.
    pub fn collect_into_sink(&self) -> usize {
        let measurements = self.collect();
        let n = measurements.len();
        for m in measurements {
            self.sink.send(m);
        }
        n
    }

    pub fn get(&self, name: &str) -> Option<Instrument> {
        self.instruments.get(name).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .observers
            .len()
    }

    pub fn sink(&self) -> &MeasurementSink {
        &self.sink
    }

    fn ensure_known(&self, instrument: &Instrument) -> Result<()> {
        match self.instruments.get(instrument.name()) {
            Some(known) if known.same_registration(instrument) => Ok(()),
            _ => Err(HarnessError::UnknownInstrument {
                name: instrument.name().to_string(),
            }),
        }
    }
}

fn check_value(kind: InstrumentKind, value: Value) -> std::result::Result<(), &'static str> {
    if !value.is_finite() {
        return Err("value must be finite");
    }
    if kind.is_monotonic() && value.is_negative() {
        return Err("monotonic counter cannot record a negative value");
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason| {
        Err(HarnessError::InvalidName {
            name: name.to_string(),
            reason,
        })
    };

    let Some(first) = name.chars().next() else {
        return invalid("name is empty");
    };
    if name.len() > MAX_NAME_LEN {
        return invalid("name is longer than 255 bytes");
    }
    if !first.is_ascii_alphabetic() {
        return invalid("name must start with an ASCII letter");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'))
    {
        return invalid("name may only contain ASCII alphanumerics and . _ - /");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tokio::sync::mpsc;

    fn registry() -> (InstrumentRegistry, mpsc::Receiver<Measurement>) {
        let (sink, rx) = MeasurementSink::channel();
        (InstrumentRegistry::new(sink), rx)
    }

    const ALL_KINDS: [InstrumentKind; 7] = [
        InstrumentKind::Counter,
        InstrumentKind::UpDownCounter,
        InstrumentKind::Histogram,
        InstrumentKind::Gauge,
        InstrumentKind::ObservableCounter,
        InstrumentKind::ObservableUpDownCounter,
        InstrumentKind::ObservableGauge,
    ];

    #[test]
    fn test_duplicate_name_rejected_for_every_kind() {
        for kind in ALL_KINDS {
            let (registry, _rx) = registry();
            registry.register(Descriptor::new("requests", kind)).unwrap();
            let err = registry.register(Descriptor::new("requests", kind)).unwrap_err();
            assert!(matches!(err, HarnessError::DuplicateName { ref name } if name == "requests"));

            // A different kind under the same name is still a duplicate.
            let err = registry
                .register(Descriptor::new("requests", InstrumentKind::Histogram))
                .unwrap_err();
            assert!(matches!(err, HarnessError::DuplicateName { .. }));
        }
    }

    #[test]
    fn test_invalid_names() {
        let (registry, _rx) = registry();
        for name in ["", "1abc", "has space", "emoji🙂"] {
            let err = registry
                .register(Descriptor::new(name, InstrumentKind::Counter))
                .unwrap_err();
            assert!(matches!(err, HarnessError::InvalidName { .. }), "{name:?}");
        }
        let long = "a".repeat(256);
        assert!(registry.register(Descriptor::new(long, InstrumentKind::Counter)).is_err());
        assert!(registry
            .register(Descriptor::new("app.cache/hit-ratio_v2", InstrumentKind::Gauge))
            .is_ok());
    }

    #[test]
    fn test_emit_forwards_measurement() {
        let (registry, mut rx) = registry();
        let cache = registry
            .register(Descriptor::new("cache", InstrumentKind::Counter).with_description("Cache hits and misses"))
            .unwrap();

        registry
            .emit_with_labels(&cache, 1, Labels::new().with("type", "hits"))
            .unwrap();

        let m = rx.try_recv().unwrap();
        assert_eq!(m.instrument, cache);
        assert_eq!(m.value, Value::Int(1));
        assert_eq!(m.labels.get("type"), Some("hits"));
    }

    #[test]
    fn test_emit_rejects_asynchronous_instrument() {
        let (registry, mut rx) = registry();
        let hits = registry
            .register(Descriptor::new("cache.hits", InstrumentKind::ObservableCounter))
            .unwrap();
        let err = registry.emit(&hits, 1).unwrap_err();
        assert!(matches!(err, HarnessError::WrongInstrumentKind { expected: "synchronous", .. }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_rejects_foreign_handle() {
        let (a, _rx_a) = registry();
        let (b, _rx_b) = registry();
        let from_a = a.register(Descriptor::new("requests", InstrumentKind::Counter)).unwrap();
        b.register(Descriptor::new("requests", InstrumentKind::Counter)).unwrap();

        let err = b.emit(&from_a, 1).unwrap_err();
        assert!(matches!(err, HarnessError::UnknownInstrument { .. }));
    }

    #[test]
    fn test_up_down_counter_accepts_signed_values() {
        let (registry, mut rx) = registry();
        let in_flight = registry
            .register(Descriptor::new("in_flight", InstrumentKind::UpDownCounter))
            .unwrap();
        registry.emit(&in_flight, -5).unwrap();
        registry.emit(&in_flight, 5).unwrap();
        assert_eq!(rx.try_recv().unwrap().value, Value::Int(-5));
        assert_eq!(rx.try_recv().unwrap().value, Value::Int(5));
    }

    #[test]
    fn test_non_finite_rejected() {
        let (registry, _rx) = registry();
        let latency = registry
            .register(Descriptor::new("latency", InstrumentKind::Histogram))
            .unwrap();
        assert!(registry.emit(&latency, f64::INFINITY).is_err());
        assert!(registry.emit(&latency, -3.5).is_ok());
    }

    #[test]
    fn test_observer_claims_are_all_or_nothing() {
        let (registry, _rx) = registry();
        let hits = registry
            .register(Descriptor::new("hits", InstrumentKind::ObservableCounter))
            .unwrap();
        let misses = registry
            .register(Descriptor::new("misses", InstrumentKind::ObservableCounter))
            .unwrap();

        registry.register_observer(&[hits.clone()], Observations::new).unwrap();

        let err = registry
            .register_observer(&[misses.clone(), hits.clone()], Observations::new)
            .unwrap_err();
        assert!(matches!(err, HarnessError::CallbackAlreadyRegistered { ref name } if name == "hits"));

        // misses was not claimed by the failed registration.
        registry.register_observer(&[misses], Observations::new).unwrap();
        assert_eq!(registry.observer_count(), 2);
    }

    #[test]
    fn test_observer_validation() {
        let (registry, _rx) = registry();
        let requests = registry
            .register(Descriptor::new("requests", InstrumentKind::Counter))
            .unwrap();

        assert!(matches!(
            registry.register_observer(&[], Observations::new),
            Err(HarnessError::EmptyObserverSet)
        ));
        assert!(matches!(
            registry.register_observer(&[requests], Observations::new),
            Err(HarnessError::WrongInstrumentKind { expected: "asynchronous", .. })
        ));
    }

    #[test]
    fn test_collect_filters_and_survives_panics() {
        let (registry, _rx) = registry();
        let hits = registry
            .register(Descriptor::new("hits", InstrumentKind::ObservableCounter))
            .unwrap();
        let ratio = registry
            .register(Descriptor::new("ratio", InstrumentKind::ObservableGauge))
            .unwrap();
        let stray = registry
            .register(Descriptor::new("stray", InstrumentKind::ObservableGauge))
            .unwrap();

        registry.register_observer(&[stray], || panic!("observer bug")).unwrap();

        let (h, r) = (hits.clone(), ratio.clone());
        registry
            .register_observer(&[hits.clone()], move || {
                let mut out = Observations::new();
                out.insert(h.clone(), Value::Int(-1));
                out.insert(r.clone(), Value::Float(0.5));
                out
            })
            .unwrap();

        let h = hits.clone();
        registry
            .register_observer(&[ratio.clone()], move || {
                let mut out = Observations::new();
                out.insert(h.clone(), Value::Int(7));
                out
            })
            .unwrap();

        // Negative counter value and cross-registration values are all dropped.
        assert!(registry.collect().is_empty());
    }

    #[test]
    fn test_collect_into_sink() {
        let (registry, mut rx) = registry();
        let uptime = registry
            .register(Descriptor::new("uptime", InstrumentKind::ObservableCounter).with_unit("ms"))
            .unwrap();
        let u = uptime.clone();
        registry
            .register_observer(&[uptime], move || Observations::from([(u.clone(), Value::Int(42))]))
            .unwrap();

        assert_eq!(registry.collect_into_sink(), 1);
        let m = rx.try_recv().unwrap();
        assert_eq!(m.value, Value::Int(42));
        assert_eq!(m.instrument.unit(), Some("ms"));
    }

    proptest! {
        #[test]
        fn prop_counter_accepts_non_negative(v in 0i64..=i64::MAX) {
            let (registry, _rx) = registry();
            let c = registry.register(Descriptor::new("c", InstrumentKind::Counter)).unwrap();
            prop_assert!(registry.emit(&c, v).is_ok());
        }

        #[test]
        fn prop_counter_rejects_negative(v in i64::MIN..0i64) {
            let (registry, _rx) = registry();
            let c = registry.register(Descriptor::new("c", InstrumentKind::Counter)).unwrap();
            let rejected = matches!(registry.emit(&c, v), Err(HarnessError::InvalidMeasurement { .. }));
            prop_assert!(rejected);
        }

        #[test]
        fn prop_counter_float_domain(v in -1.0e12f64..1.0e12f64) {
            let (registry, _rx) = registry();
            let c = registry.register(Descriptor::new("c", InstrumentKind::Counter)).unwrap();
            prop_assert_eq!(registry.emit(&c, v).is_ok(), v >= 0.0);
        }
    }
}
