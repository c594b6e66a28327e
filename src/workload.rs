//! Demo workload: a representative instrument set driven by random traffic.
//!
//! # Instruments
//! - `<prefix>.requests` (counter): +1 every `counter_interval_ms`
//! - `<prefix>.in_flight` (up/down counter): ±1 every `up_down_interval_ms`
//! - `<prefix>.request.duration` (histogram, µs): |N(0, latency_stddev_ms)|
//! - `<prefix>.cache` (counter, `type=hits|misses`)
//! - `<prefix>.cache.hits`, `<prefix>.cache.misses` (observable counters)
//! - `<prefix>.cache.hit_ratio` (observable gauge)
//! - `<prefix>.in_flight.sampled` (observable up/down counter)
//! - `<prefix>.tasks.live` (observable up/down counter)
//! - `<prefix>.uptime` (observable counter, ms)
//!
//! Observable values come from [`SampledState`]; a simulator task mutates it
//! and the callbacks only read it.

use std::sync::Arc;
use std::time::Instant;

use rand::Rng;

use crate::config::WorkloadConfig;
use crate::emitters::{Cadence, EmitterGroup};
use crate::error::Result;
use crate::instruments::{
    Descriptor, Instrument, InstrumentKind, InstrumentRegistry, Labels, Observations, Value,
};
use crate::state::SampledState;

/// Hit probability of the background cache simulator.
const SIMULATED_HIT_PROBABILITY: f64 = 0.7;

/// Handles for every workload instrument.
#[derive(Debug, Clone)]
pub struct WorkloadInstruments {
    pub requests: Instrument,
    pub in_flight: Instrument,
    pub request_duration: Instrument,
    pub cache: Instrument,
    pub cache_hits: Instrument,
    pub cache_misses: Instrument,
    pub cache_hit_ratio: Instrument,
    pub in_flight_sampled: Instrument,
    pub live_tasks: Instrument,
    pub uptime: Instrument,
}

/// Registered workload, ready to spawn its emitters.
pub struct Workload {
    config: WorkloadConfig,
    registry: Arc<InstrumentRegistry>,
    state: Arc<SampledState>,
    instruments: WorkloadInstruments,
}

impl Workload {
    /// Register all instruments and observers. Any failure is fatal to startup.
    pub fn register(
        config: &WorkloadConfig,
        registry: Arc<InstrumentRegistry>,
        state: Arc<SampledState>,
    ) -> Result<Self> {
        let prefix = config.prefix.as_str();
        let reg = |suffix: &str, kind: InstrumentKind, unit: Option<&str>, description: &str| {
            let mut descriptor =
                Descriptor::new(format!("{prefix}.{suffix}"), kind).with_description(description);
            if let Some(unit) = unit {
                descriptor = descriptor.with_unit(unit);
            }
            registry.register(descriptor)
        };

        let instruments = WorkloadInstruments {
            requests: reg("requests", InstrumentKind::Counter, None, "Handled requests")?,
            in_flight: reg(
                "in_flight",
                InstrumentKind::UpDownCounter,
                None,
                "Requests currently in flight",
            )?,
            request_duration: reg(
                "request.duration",
                InstrumentKind::Histogram,
                Some("us"),
                "Request latency",
            )?,
            cache: reg("cache", InstrumentKind::Counter, None, "Cache lookups by outcome")?,
            cache_hits: reg("cache.hits", InstrumentKind::ObservableCounter, None, "Cache hits")?,
            cache_misses: reg(
                "cache.misses",
                InstrumentKind::ObservableCounter,
                None,
                "Cache misses",
            )?,
            cache_hit_ratio: reg(
                "cache.hit_ratio",
                InstrumentKind::ObservableGauge,
                None,
                "Share of cache lookups that hit",
            )?,
            in_flight_sampled: reg(
                "in_flight.sampled",
                InstrumentKind::ObservableUpDownCounter,
                None,
                "In-flight requests as seen by the sampled state",
            )?,
            live_tasks: reg(
                "tasks.live",
                InstrumentKind::ObservableUpDownCounter,
                None,
                "Running emitter tasks",
            )?,
            uptime: reg("uptime", InstrumentKind::ObservableCounter, Some("ms"), "Time since start")?,
        };

        register_observers(&registry, &state, &instruments)?;

        tracing::info!(prefix = %prefix, instruments = registry.len(), "Workload registered");
        Ok(Self {
            config: config.clone(),
            registry,
            state,
            instruments,
        })
    }

    pub fn instruments(&self) -> &WorkloadInstruments {
        &self.instruments
    }

    /// Spawn one emitter per synchronous instrument plus the cache simulator.
    pub fn spawn(&self, group: &mut EmitterGroup) {
        let cfg = &self.config;
        let jitter = cfg.jitter_ms;

        let registry = self.registry.clone();
        let requests = self.instruments.requests.clone();
        group.spawn(
            requests.name().to_string(),
            Cadence::from_millis(cfg.counter_interval_ms, jitter),
            move || {
                log_rejected(&requests, registry.emit(&requests, 1));
            },
        );

        let registry = self.registry.clone();
        let state = self.state.clone();
        let in_flight = self.instruments.in_flight.clone();
        group.spawn(
            in_flight.name().to_string(),
            Cadence::from_millis(cfg.up_down_interval_ms, jitter),
            move || {
                let delta: i64 = if rand::thread_rng().gen_bool(0.5) { 1 } else { -1 };
                if log_rejected(&in_flight, registry.emit(&in_flight, delta)) {
                    state.add_in_flight(delta);
                }
            },
        );

        let registry = self.registry.clone();
        let duration = self.instruments.request_duration.clone();
        let stddev_ms = cfg.latency_stddev_ms;
        group.spawn(
            duration.name().to_string(),
            Cadence::from_millis(cfg.histogram_interval_ms, jitter),
            move || {
                let sample = sample_latency_us(&mut rand::thread_rng(), stddev_ms);
                log_rejected(&duration, registry.emit(&duration, sample));
            },
        );

        let registry = self.registry.clone();
        let cache = self.instruments.cache.clone();
        let hit_probability = cfg.cache_hit_probability.clamp(0.0, 1.0);
        group.spawn(
            cache.name().to_string(),
            Cadence::from_millis(cfg.cache_interval_ms, jitter),
            move || {
                let outcome = if rand::thread_rng().gen_bool(hit_probability) {
                    "hits"
                } else {
                    "misses"
                };
                let labels = Labels::new().with("type", outcome);
                log_rejected(&cache, registry.emit_with_labels(&cache, 1, labels));
            },
        );

        let state = self.state.clone();
        group.spawn(
            "cache.simulator",
            Cadence::from_millis(cfg.cache_interval_ms, jitter),
            move || {
                if rand::thread_rng().gen_bool(SIMULATED_HIT_PROBABILITY) {
                    state.record_hit();
                } else {
                    state.record_miss();
                }
            },
        );

        tracing::info!(emitters = group.len(), "Workload emitters started");
    }
}

fn register_observers(
    registry: &InstrumentRegistry,
    state: &Arc<SampledState>,
    instruments: &WorkloadInstruments,
) -> Result<()> {
    let cache_set = [
        instruments.cache_hits.clone(),
        instruments.cache_misses.clone(),
        instruments.cache_hit_ratio.clone(),
    ];
    let observed = cache_set.clone();
    let cache_state = state.clone();
    registry.register_observer(&cache_set, move || {
        let snapshot = cache_state.snapshot();
        let [hits, misses, ratio] = &observed;
        Observations::from([
            (hits.clone(), Value::Int(snapshot.cache_hits)),
            (misses.clone(), Value::Int(snapshot.cache_misses)),
            (ratio.clone(), Value::Float(snapshot.hit_ratio())),
        ])
    })?;

    let live = instruments.live_tasks.clone();
    let in_flight = instruments.in_flight_sampled.clone();
    let task_state = state.clone();
    registry.register_observer(&[live.clone(), in_flight.clone()], move || {
        Observations::from([
            (live.clone(), Value::Int(task_state.live_tasks())),
            (in_flight.clone(), Value::Int(task_state.in_flight())),
        ])
    })?;

    let uptime = instruments.uptime.clone();
    let started = Instant::now();
    registry.register_observer(&[uptime.clone()], move || {
        let ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        Observations::from([(uptime.clone(), Value::Int(ms))])
    })?;

    Ok(())
}

/// Log a rejected emission. Returns whether the value was accepted.
fn log_rejected(instrument: &Instrument, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(instrument = %instrument.name(), error = %e, "Emission rejected");
            false
        }
    }
}

/// Absolute value of a normal sample with mean 0, in microseconds.
pub fn sample_latency_us<R: Rng>(rng: &mut R, stddev_ms: f64) -> f64 {
    // Box-Muller; u1 must stay away from 0 for ln.
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    (z * stddev_ms * 1_000.0).abs()
}
