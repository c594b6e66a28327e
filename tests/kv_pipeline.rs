//! Key-value client scenarios.

use std::sync::Arc;
use std::time::Duration;

use instrument_harness::config::KvConfig;
use instrument_harness::instruments::InstrumentRegistry;
use instrument_harness::kv::{InstrumentedKv, KvError, KvReply, KvStore, MemoryKv, Pipeline, RedisKv};

mod common;

#[tokio::test]
async fn test_set_get_then_pipeline() {
    let kv = MemoryKv::new();
    kv.set("foo", "bar", None).await.unwrap();
    assert_eq!(kv.get("foo").await.unwrap().as_deref(), Some("bar"));

    let mut pipe = Pipeline::new();
    pipe.set("foo", "bar2").get("foo");
    let replies = kv.execute(&pipe).await.unwrap();
    assert_eq!(replies, vec![KvReply::Ok, KvReply::Value(Some("bar2".into()))]);
}

#[tokio::test]
async fn test_failed_set_stops_pipeline() {
    let kv = MemoryKv::new();
    kv.fail_writes(true);

    let mut pipe = Pipeline::new();
    pipe.set("foo", "bar2").get("foo");
    let err = kv.execute(&pipe).await.unwrap_err();

    match err {
        KvError::Injected { op, key } => {
            assert_eq!(op, "set");
            assert_eq!(key, "foo");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(kv.operations(), vec!["set foo"]);
}

#[tokio::test]
async fn test_instrumented_commands_are_exported() {
    let (pipeline, exporter) = common::memory_pipeline();
    let registry = Arc::new(InstrumentRegistry::new(pipeline.sink()));
    let kv = InstrumentedKv::new(MemoryKv::new(), registry.clone()).unwrap();

    kv.set("foo", "bar", Some(Duration::from_secs(60))).await.unwrap();
    kv.get("foo").await.unwrap();
    let mut pipe = Pipeline::new();
    pipe.set("foo", "bar2").get("foo");
    kv.execute(&pipe).await.unwrap();

    drop(kv);
    drop(registry);
    pipeline.shutdown().await.unwrap();

    let ops: Vec<String> = exporter
        .measurements()
        .iter()
        .filter(|m| m.instrument.name() == "kv.commands")
        .filter_map(|m| m.labels.get("op").map(str::to_string))
        .collect();
    assert_eq!(ops, vec!["set", "get", "pipeline"]);
}

#[tokio::test]
#[ignore = "requires a redis server at REDIS_URL or redis://127.0.0.1:6379"]
async fn test_redis_round_trip() {
    let config = KvConfig {
        url: std::env::var("REDIS_URL").unwrap_or_else(|_| KvConfig::default().url),
        ..KvConfig::default()
    };
    let kv = RedisKv::connect(&config).await.unwrap();

    kv.set("harness:probe", "bar", Some(Duration::from_secs(30))).await.unwrap();
    assert_eq!(kv.get("harness:probe").await.unwrap().as_deref(), Some("bar"));

    let mut pipe = Pipeline::new();
    pipe.set_ex("harness:probe", "bar2", Duration::from_secs(30)).get("harness:probe");
    let replies = kv.execute(&pipe).await.unwrap();
    assert_eq!(replies, vec![KvReply::Ok, KvReply::Value(Some("bar2".into()))]);
}
