//! Delay between emitter iterations.

use std::time::Duration;

use rand::Rng;

/// How long an emitter sleeps between iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Always the same interval.
    Fixed(Duration),
    /// `base` plus a uniform random extra delay in `[0, jitter)`.
    Jittered { base: Duration, jitter: Duration },
}

impl Cadence {
    pub fn from_millis(interval_ms: u64, jitter_ms: u64) -> Self {
        let base = Duration::from_millis(interval_ms);
        if jitter_ms == 0 {
            Cadence::Fixed(base)
        } else {
            Cadence::Jittered {
                base,
                jitter: Duration::from_millis(jitter_ms),
            }
        }
    }

    /// Delay before the next iteration.
    pub fn next_delay(&self) -> Duration {
        match *self {
            Cadence::Fixed(interval) => interval,
            Cadence::Jittered { base, jitter } => {
                let range = jitter.as_nanos().min(u64::MAX as u128) as u64;
                if range == 0 {
                    return base;
                }
                base + Duration::from_nanos(rand::thread_rng().gen_range(0..range))
            }
        }
    }
}
