//! Mirror measurements into the `metrics` facade.
//!
//! Whatever recorder is installed (the Prometheus exporter in the binary)
//! receives the values. Instruments are described on first sight.
//!
//! Facade counters are integral. Fractional counter increments are carried
//! per series until they add up to a whole unit; observed counter totals are
//! floored, so their error stays below one.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use metrics::Label;

use crate::export::{ExportError, Exporter};
use crate::instruments::{Instrument, InstrumentKind, Labels, Measurement};

#[derive(Default)]
pub struct MetricsFacadeExporter {
    described: DashSet<String>,
    carry: DashMap<(String, Labels), f64>,
}

impl MetricsFacadeExporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn describe(&self, instrument: &Instrument) {
        if !self.described.insert(instrument.name().to_string()) {
            return;
        }
        let name = instrument.name().to_string();
        let description = instrument.description().unwrap_or_default().to_string();
        match instrument.kind() {
            InstrumentKind::Counter | InstrumentKind::ObservableCounter => {
                metrics::describe_counter!(name, description)
            }
            InstrumentKind::Histogram => metrics::describe_histogram!(name, description),
            _ => metrics::describe_gauge!(name, description),
        }
    }

    /// Whole units to add to a counter series, keeping the fraction for later.
    fn whole_increment(&self, name: &str, labels: &Labels, value: f64) -> u64 {
        let mut carry = self
            .carry
            .entry((name.to_string(), labels.clone()))
            .or_insert(0.0);
        let total = *carry + value;
        let whole = total.floor();
        *carry = total - whole;
        whole as u64
    }

    fn record(&self, m: &Measurement) {
        self.describe(&m.instrument);

        let name = m.instrument.name().to_string();
        let labels: Vec<Label> = m
            .labels
            .iter()
            .map(|(k, v)| Label::new(k.to_string(), v.to_string()))
            .collect();
        let value = m.value.as_f64();

        match m.instrument.kind() {
            InstrumentKind::Counter => {
                let whole = self.whole_increment(&name, &m.labels, value);
                if whole > 0 {
                    metrics::counter!(name, labels).increment(whole);
                }
            }
            InstrumentKind::ObservableCounter => {
                metrics::counter!(name, labels).absolute(value.floor() as u64)
            }
            InstrumentKind::UpDownCounter => {
                let gauge = metrics::gauge!(name, labels);
                if value >= 0.0 {
                    gauge.increment(value);
                } else {
                    gauge.decrement(-value);
                }
            }
            InstrumentKind::Histogram => metrics::histogram!(name, labels).record(value),
            InstrumentKind::Gauge
            | InstrumentKind::ObservableGauge
            | InstrumentKind::ObservableUpDownCounter => metrics::gauge!(name, labels).set(value),
        }
    }
}

#[async_trait]
impl Exporter for MetricsFacadeExporter {
    fn name(&self) -> &str {
        "prometheus"
    }

    async fn export(&self, batch: &[Measurement]) -> Result<(), ExportError> {
        for m in batch {
            self.record(m);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::{Descriptor, Labels, Value};

    #[tokio::test]
    async fn test_export_without_recorder_is_noop() {
        let exporter = MetricsFacadeExporter::new();
        let hist = Instrument::new(Descriptor::new("latency", InstrumentKind::Histogram));
        let batch = vec![
            Measurement::new(hist.clone(), Value::Float(12.5), Labels::new()),
            Measurement::new(hist, Value::Float(3.0), Labels::new().with("route", "/")),
        ];
        assert!(exporter.export(&batch).await.is_ok());
        assert_eq!(exporter.described.len(), 1);
    }

    #[test]
    fn test_fractional_counter_increments_accumulate() {
        let exporter = MetricsFacadeExporter::new();
        let labels = Labels::new().with("type", "hits");

        let whole: Vec<u64> = (0..4)
            .map(|_| exporter.whole_increment("work", &labels, 0.5))
            .collect();
        assert_eq!(whole, vec![0, 1, 0, 1]);

        assert_eq!(exporter.whole_increment("work", &Labels::new(), 2.25), 2);
        assert_eq!(exporter.whole_increment("work", &Labels::new(), 0.75), 1);
        assert_eq!(exporter.whole_increment("work", &labels, 3.0), 3);
    }
}
