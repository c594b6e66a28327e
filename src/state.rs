//! Shared sampled state.
//!
//! Counters mutated by emitter tasks and read by observer callbacks. All
//! mutation is a single atomic add; reads go through [`SampledState::snapshot`].

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Process counters shared between emitters and observers.
#[derive(Debug, Default)]
pub struct SampledState {
    cache_hits: AtomicI64,
    cache_misses: AtomicI64,
    in_flight: AtomicI64,
    live_tasks: AtomicI64,
}

/// Point-in-time copy of [`SampledState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub cache_hits: i64,
    pub cache_misses: i64,
    pub in_flight: i64,
    pub live_tasks: i64,
}

impl Snapshot {
    /// Fraction of cache lookups that hit, or 0 before the first lookup.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total <= 0 {
            return 0.0;
        }
        self.cache_hits as f64 / total as f64
    }
}

impl SampledState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Apply a signed delta to the in-flight count.
    pub fn add_in_flight(&self, delta: i64) {
        self.in_flight.fetch_add(delta, Ordering::Relaxed);
    }

    pub(crate) fn task_started(&self) {
        self.live_tasks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_finished(&self) {
        self.live_tasks.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> i64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> i64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn live_tasks(&self) -> i64 {
        self.live_tasks.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            cache_hits: self.cache_hits(),
            cache_misses: self.cache_misses(),
            in_flight: self.in_flight(),
            live_tasks: self.live_tasks(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_ratio() {
        let state = SampledState::new();
        assert_eq!(state.snapshot().hit_ratio(), 0.0);
        state.record_hit();
        state.record_hit();
        state.record_hit();
        state.record_miss();
        assert_eq!(state.snapshot().hit_ratio(), 0.75);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let state = SampledState::new();
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let state = state.clone();
                std::thread::spawn(move || {
                    for _ in 0..10_000 {
                        state.add_in_flight(if i % 2 == 0 { 3 } else { -1 });
                        state.record_hit();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        let snap = state.snapshot();
        assert_eq!(snap.in_flight, 4 * 10_000 * 3 - 4 * 10_000);
        assert_eq!(snap.cache_hits, 80_000);
    }
}
