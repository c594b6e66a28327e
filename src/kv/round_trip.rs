//! Scripted round trip against a store: set, get, then a two-command pipeline.

use tracing::Instrument as _;

use crate::kv::{KvError, KvReply, KvStore, Pipeline};

/// What the store returned during [`run_round_trip`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundTripReport {
    pub value: Option<String>,
    pub pipeline: Vec<KvReply>,
}

/// Set `key`, read it back, then pipeline an overwrite and a read.
///
/// Every command runs inside one `kv-probe` span. The first failing command
/// is logged and returned.
pub async fn run_round_trip<S: KvStore>(kv: &S, key: &str) -> Result<RoundTripReport, KvError> {
    let span = tracing::info_span!("kv-probe", key);
    async {
        let report = round_trip_steps(kv, key).await;
        if let Err(e) = &report {
            tracing::error!(error = %e, "Key-value command failed");
        }
        report
    }
    .instrument(span)
    .await
}

async fn round_trip_steps<S: KvStore>(kv: &S, key: &str) -> Result<RoundTripReport, KvError> {
    kv.set(key, "bar", None).await?;
    let value = kv.get(key).await?;
    tracing::info!(key, value = ?value, "get");

    let mut pipe = Pipeline::new();
    pipe.set(key, "bar2").get(key);
    let pipeline = kv.execute(&pipe).await?;
    tracing::info!(key, replies = ?pipeline, "pipeline");

    Ok(RoundTripReport { value, pipeline })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use tracing::span::{Attributes, Id};
    use tracing::Subscriber;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::registry::LookupSpan;
    use tracing_subscriber::Layer;

    use crate::export::MeasurementSink;
    use crate::instruments::InstrumentRegistry;
    use crate::kv::{InstrumentedKv, MemoryKv};

    /// Records `(span, parent)` names as spans open.
    #[derive(Clone, Default)]
    struct SpanParents(Arc<Mutex<Vec<(String, Option<String>)>>>);

    impl<S> Layer<S> for SpanParents
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
            let parent = ctx
                .span(id)
                .and_then(|span| span.parent().map(|p| p.name().to_string()));
            self.0
                .lock()
                .unwrap()
                .push((attrs.metadata().name().to_string(), parent));
        }
    }

    fn instrumented(kv: MemoryKv) -> InstrumentedKv<MemoryKv> {
        let (sink, _rx) = MeasurementSink::channel();
        InstrumentedKv::new(kv, Arc::new(InstrumentRegistry::new(sink))).unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_results() {
        let kv = MemoryKv::new();
        let report = run_round_trip(&kv, "foo").await.unwrap();

        assert_eq!(report.value.as_deref(), Some("bar"));
        assert_eq!(
            report.pipeline,
            vec![KvReply::Ok, KvReply::Value(Some("bar2".into()))]
        );
        assert_eq!(kv.operations(), vec!["set foo", "get foo", "set foo", "get foo"]);
    }

    #[tokio::test]
    async fn test_round_trip_stops_at_first_failure() {
        let kv = MemoryKv::new();
        kv.fail_writes(true);

        let err = run_round_trip(&kv, "foo").await.unwrap_err();
        assert!(matches!(err, KvError::Injected { op: "set", .. }));
        assert_eq!(kv.operations(), vec!["set foo"]);
    }

    #[tokio::test]
    async fn test_command_spans_nest_under_root_span() {
        let layer = SpanParents::default();
        let subscriber = tracing_subscriber::registry().with(layer.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let kv = instrumented(MemoryKv::new());
        run_round_trip(&kv, "foo").await.unwrap();

        let spans = layer.0.lock().unwrap().clone();
        assert_eq!(spans[0], ("kv-probe".to_string(), None));
        let commands: Vec<_> = spans.iter().filter(|(name, _)| name == "kv").collect();
        assert_eq!(commands.len(), 3);
        assert!(commands
            .iter()
            .all(|(_, parent)| parent.as_deref() == Some("kv-probe")));
    }
}
