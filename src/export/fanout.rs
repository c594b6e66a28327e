//! Send every batch to several exporters.

use std::sync::Arc;

use async_trait::async_trait;

use crate::export::{ExportError, Exporter};
use crate::instruments::Measurement;

/// Exports to every child; reports the first failure after trying them all.
pub struct FanoutExporter {
    exporters: Vec<Arc<dyn Exporter>>,
}

impl FanoutExporter {
    pub fn new(exporters: Vec<Arc<dyn Exporter>>) -> Self {
        Self { exporters }
    }

    pub fn len(&self) -> usize {
        self.exporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exporters.is_empty()
    }
}

#[async_trait]
impl Exporter for FanoutExporter {
    fn name(&self) -> &str {
        "fanout"
    }

    async fn export(&self, batch: &[Measurement]) -> Result<(), ExportError> {
        let mut first_error = None;
        for exporter in &self.exporters {
            if let Err(e) = exporter.export(batch).await {
                tracing::debug!(exporter = %exporter.name(), error = %e, "Fanout child export failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn flush(&self) -> Result<(), ExportError> {
        let mut first_error = None;
        for exporter in &self.exporters {
            if let Err(e) = exporter.flush().await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::InMemoryExporter;
    use crate::instruments::{Descriptor, Instrument, InstrumentKind, Labels, Value};

    #[tokio::test]
    async fn test_failure_does_not_starve_other_children() {
        let broken = InMemoryExporter::new();
        broken.set_failing(true);
        let healthy = InMemoryExporter::new();
        let children: Vec<Arc<dyn Exporter>> =
            vec![Arc::new(broken.clone()), Arc::new(healthy.clone())];
        let fanout = FanoutExporter::new(children);

        let instrument = Instrument::new(Descriptor::new("requests", InstrumentKind::Counter));
        let batch = vec![Measurement::new(instrument, Value::Int(1), Labels::new())];

        assert!(matches!(fanout.export(&batch).await, Err(ExportError::Rejected(_))));
        assert_eq!(healthy.measurements().len(), 1);
        assert!(fanout.flush().await.is_ok());
        assert_eq!(healthy.flush_count(), 1);
        assert_eq!(broken.flush_count(), 1);
    }
}
