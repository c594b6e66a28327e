//! Key-value store wrapper that reports every command as measurements.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::Instrument as _;

use crate::error::Result as HarnessResult;
use crate::instruments::{Descriptor, Instrument, InstrumentKind, InstrumentRegistry, Labels};
use crate::kv::{KvError, KvReply, KvStore, Pipeline};

pub const COMMANDS_INSTRUMENT: &str = "kv.commands";
pub const DURATION_INSTRUMENT: &str = "kv.command.duration";

/// Wraps a store, recording `kv.commands{op, status}` and
/// `kv.command.duration{op}` (µs) for each command or pipeline.
pub struct InstrumentedKv<S> {
    inner: S,
    registry: Arc<InstrumentRegistry>,
    commands: Instrument,
    duration: Instrument,
}

impl<S: KvStore> InstrumentedKv<S> {
    /// Register the KV instruments in `registry` and wrap `inner`.
    pub fn new(inner: S, registry: Arc<InstrumentRegistry>) -> HarnessResult<Self> {
        let commands = registry.register(
            Descriptor::new(COMMANDS_INSTRUMENT, InstrumentKind::Counter)
                .with_description("Key-value commands by operation and outcome"),
        )?;
        let duration = registry.register(
            Descriptor::new(DURATION_INSTRUMENT, InstrumentKind::Histogram)
                .with_unit("us")
                .with_description("Key-value command latency"),
        )?;
        Ok(Self {
            inner,
            registry,
            commands,
            duration,
        })
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn record<T>(&self, op: &'static str, elapsed: Duration, result: &Result<T, KvError>) {
        let status = if result.is_ok() { "ok" } else { "error" };
        let outcome = self
            .registry
            .emit_with_labels(
                &self.commands,
                1,
                Labels::new().with("op", op).with("status", status),
            )
            .and_then(|()| {
                self.registry.emit_with_labels(
                    &self.duration,
                    elapsed.as_secs_f64() * 1_000_000.0,
                    Labels::new().with("op", op),
                )
            });
        if let Err(e) = outcome {
            tracing::warn!(op, error = %e, "KV measurement rejected");
        }
        if let Err(e) = result {
            tracing::warn!(op, error = %e, "KV command failed");
        }
    }
}

#[async_trait]
impl<S: KvStore> KvStore for InstrumentedKv<S> {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        let span = tracing::debug_span!("kv", op = "set", key);
        async {
            let started = Instant::now();
            let result = self.inner.set(key, value, ttl).await;
            self.record("set", started.elapsed(), &result);
            result
        }
        .instrument(span)
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let span = tracing::debug_span!("kv", op = "get", key);
        async {
            let started = Instant::now();
            let result = self.inner.get(key).await;
            self.record("get", started.elapsed(), &result);
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, pipeline: &Pipeline) -> Result<Vec<KvReply>, KvError> {
        let span = tracing::debug_span!("kv", op = "pipeline", commands = pipeline.len());
        async {
            let started = Instant::now();
            let result = self.inner.execute(pipeline).await;
            self.record("pipeline", started.elapsed(), &result);
            result
        }
        .instrument(span)
        .await
    }
}
