//! Key-value client subsystem.
//!
//! # Data Flow
//! ```text
//! caller
//!     → InstrumentedKv (span + kv.commands / kv.command.duration)
//!     → KvStore impl
//!         RedisKv  → multiplexed connection → Redis
//!         MemoryKv → DashMap (tests, dry runs)
//! ```
//!
//! # Design Decisions
//! - One trait for single commands and pipelines
//! - A pipeline reports only its first failing operation
//! - The default `execute` is sequential: nothing after a failure runs
//! - Stores that talk to a server may override `execute` to batch the
//!   round trip

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod instrumented;
pub mod memory;
pub mod round_trip;
pub mod redis_client;

pub use instrumented::InstrumentedKv;
pub use memory::MemoryKv;
pub use round_trip::{run_round_trip, RoundTripReport};
pub use redis_client::RedisKv;

/// Errors returned by key-value stores.
#[derive(Error, Debug)]
pub enum KvError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("injected failure on {op} {key}")]
    Injected { op: &'static str, key: String },

    #[error("command did not complete within {0:?}")]
    Timeout(Duration),
}

/// One queued command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvOp {
    Set {
        key: String,
        value: String,
        ttl: Option<Duration>,
    },
    Get {
        key: String,
    },
}

impl KvOp {
    pub fn name(&self) -> &'static str {
        match self {
            KvOp::Set { .. } => "set",
            KvOp::Get { .. } => "get",
        }
    }

    pub fn key(&self) -> &str {
        match self {
            KvOp::Set { key, .. } | KvOp::Get { key } => key,
        }
    }
}

/// Result of one pipelined command, in queue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvReply {
    /// A write succeeded.
    Ok,
    /// A read completed; `None` when the key does not exist.
    Value(Option<String>),
}

/// Ordered batch of commands submitted together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    ops: Vec<KvOp>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.ops.push(KvOp::Set {
            key: key.into(),
            value: value.into(),
            ttl: None,
        });
        self
    }

    pub fn set_ex(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        ttl: Duration,
    ) -> &mut Self {
        self.ops.push(KvOp::Set {
            key: key.into(),
            value: value.into(),
            ttl: Some(ttl),
        });
        self
    }

    pub fn get(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(KvOp::Get { key: key.into() });
        self
    }

    pub fn ops(&self) -> &[KvOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// A key-value store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Store `value` under `key`, expiring after `ttl` when given.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError>;

    /// Read `key`; `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Run a pipeline, returning one reply per command.
    ///
    /// Runs the commands in order and stops at the first error, which is
    /// returned alone.
    async fn execute(&self, pipeline: &Pipeline) -> Result<Vec<KvReply>, KvError> {
        let mut replies = Vec::with_capacity(pipeline.len());
        for op in pipeline.ops() {
            let reply = match op {
                KvOp::Set { key, value, ttl } => {
                    self.set(key, value, *ttl).await?;
                    KvReply::Ok
                }
                KvOp::Get { key } => KvReply::Value(self.get(key).await?),
            };
            replies.push(reply);
        }
        Ok(replies)
    }
}
