//! JSON-over-HTTP exporter.
//!
//! Each batch is POSTed as one JSON document to the ingest URL derived from
//! the DSN, authenticated with the DSN token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Dsn;
use crate::export::{ExportError, Exporter};
use crate::instruments::{InstrumentKind, Labels, Measurement, Value};

/// Attributes identifying the emitting process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub service_name: String,
    pub service_version: String,
    pub instance_id: Uuid,
}

impl Resource {
    pub fn new(service_name: impl Into<String>, service_version: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_version: service_version.into(),
            instance_id: Uuid::new_v4(),
        }
    }
}

#[derive(Serialize)]
struct Payload<'a> {
    resource: &'a Resource,
    measurements: Vec<WireMeasurement<'a>>,
}

#[derive(Serialize)]
struct WireMeasurement<'a> {
    name: &'a str,
    kind: InstrumentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    value: Value,
    #[serde(skip_serializing_if = "no_labels")]
    labels: &'a Labels,
    time_unix_ms: u64,
}

fn no_labels(labels: &&Labels) -> bool {
    labels.is_empty()
}

impl<'a> From<&'a Measurement> for WireMeasurement<'a> {
    fn from(m: &'a Measurement) -> Self {
        Self {
            name: m.instrument.name(),
            kind: m.instrument.kind(),
            unit: m.instrument.unit(),
            description: m.instrument.description(),
            value: m.value,
            labels: &m.labels,
            time_unix_ms: m.timestamp_ms,
        }
    }
}

/// Posts batches to a remote ingest endpoint.
pub struct HttpExporter {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    resource: Resource,
}

impl HttpExporter {
    pub fn new(dsn: &Dsn, resource: Resource, request_timeout: Duration) -> Result<Self, ExportError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            endpoint: dsn.ingest_url(),
            token: dsn.token().to_string(),
            resource,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn encode(&self, batch: &[Measurement]) -> Result<Vec<u8>, ExportError> {
        let payload = Payload {
            resource: &self.resource,
            measurements: batch.iter().map(WireMeasurement::from).collect(),
        };
        Ok(serde_json::to_vec(&payload)?)
    }
}

#[async_trait]
impl Exporter for HttpExporter {
    fn name(&self) -> &str {
        "http"
    }

    async fn export(&self, batch: &[Measurement]) -> Result<(), ExportError> {
        let body = self.encode(batch)?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::trace!(endpoint = %self.endpoint, batch_size = batch.len(), "Batch delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::{Descriptor, Instrument};

    #[test]
    fn test_payload_shape() {
        let dsn: Dsn = "https://secret@ingest.example.com/42".parse().unwrap();
        let exporter = HttpExporter::new(&dsn, Resource::new("myservice", "1.0.0"), Duration::from_secs(1)).unwrap();
        assert_eq!(exporter.endpoint(), "https://ingest.example.com/v1/projects/42/metrics");

        let cache = Instrument::new(
            Descriptor::new("app.cache", InstrumentKind::Counter).with_description("Cache hits and misses"),
        );
        let plain = Instrument::new(Descriptor::new("app.requests", InstrumentKind::Counter).with_unit("1"));
        let batch = vec![
            Measurement::new(cache, Value::Int(1), Labels::new().with("type", "hits")),
            Measurement::new(plain, Value::Int(1), Labels::new()),
        ];

        let body: serde_json::Value = serde_json::from_slice(&exporter.encode(&batch).unwrap()).unwrap();
        assert_eq!(body["resource"]["service_name"], "myservice");
        let ms = body["measurements"].as_array().unwrap();
        assert_eq!(ms[0]["name"], "app.cache");
        assert_eq!(ms[0]["kind"], "counter");
        assert_eq!(ms[0]["labels"]["type"], "hits");
        assert!(ms[0].get("unit").is_none());
        assert_eq!(ms[1]["unit"], "1");
        assert!(ms[1].get("labels").is_none());
        assert_eq!(ms[1]["value"], 1);
    }
}
