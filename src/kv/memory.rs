//! In-process key-value store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::kv::{KvError, KvStore};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// `DashMap`-backed store with TTL expiry, an operation log and write
/// fault injection.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: DashMap<String, Entry>,
    log: Mutex<Vec<String>>,
    fail_writes: AtomicBool,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `set` fail with [`KvError::Injected`].
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Commands received so far, as `"<op> <key>"`.
    pub fn operations(&self) -> Vec<String> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Live (unexpired) keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, op: &str, key: &str) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("{op} {key}"));
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        self.record("set", key);
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(KvError::Injected {
                op: "set",
                key: key.to_string(),
            });
        }
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        self.record("get", key);
        let now = Instant::now();
        if self.entries.remove_if(key, |_, e| e.is_expired(now)).is_some() {
            return Ok(None);
        }
        Ok(self.entries.get(key).map(|e| e.value.clone()))
    }
}
