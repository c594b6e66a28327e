//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, probabilities in [0, 1])
//! - Check addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HarnessConfig → Result<(), Vec<ValidationError>>
//! - The DSN is checked separately, only by binaries that export

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::HarnessConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &HarnessConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let exporter = &config.exporter;
    if exporter.export_interval_ms == 0 {
        errors.push(ValidationError::new("exporter.export_interval_ms", "must be greater than 0"));
    }
    if exporter.collect_interval_ms == 0 {
        errors.push(ValidationError::new("exporter.collect_interval_ms", "must be greater than 0"));
    }
    if exporter.max_batch_size == 0 {
        errors.push(ValidationError::new("exporter.max_batch_size", "must be greater than 0"));
    }
    if exporter.queue_capacity == 0 {
        errors.push(ValidationError::new("exporter.queue_capacity", "must be greater than 0"));
    }
    if exporter.flush_timeout_secs == 0 {
        errors.push(ValidationError::new("exporter.flush_timeout_secs", "must be greater than 0"));
    }
    if exporter.request_timeout_secs == 0 {
        errors.push(ValidationError::new("exporter.request_timeout_secs", "must be greater than 0"));
    }

    let workload = &config.workload;
    if workload.enabled {
        let intervals = [
            ("workload.counter_interval_ms", workload.counter_interval_ms),
            ("workload.up_down_interval_ms", workload.up_down_interval_ms),
            ("workload.histogram_interval_ms", workload.histogram_interval_ms),
            ("workload.cache_interval_ms", workload.cache_interval_ms),
        ];
        for (field, value) in intervals {
            if value == 0 {
                errors.push(ValidationError::new(field, "must be greater than 0"));
            }
        }
        if !workload.prefix.starts_with(|c: char| c.is_ascii_alphabetic()) {
            errors.push(ValidationError::new("workload.prefix", "must start with an ASCII letter"));
        }
        if !(0.0..=1.0).contains(&workload.cache_hit_probability) {
            errors.push(ValidationError::new("workload.cache_hit_probability", "must be within [0, 1]"));
        }
        if !workload.latency_stddev_ms.is_finite() || workload.latency_stddev_ms < 0.0 {
            errors.push(ValidationError::new("workload.latency_stddev_ms", "must be a non-negative number"));
        }
    }

    let obs = &config.observability;
    if !LOG_LEVELS.contains(&obs.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level {:?}", obs.log_level),
        ));
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", obs.metrics_address),
        ));
    }

    match Url::parse(&config.kv.url) {
        Ok(url) if matches!(url.scheme(), "redis" | "rediss" | "redis+unix" | "unix") => {}
        _ => errors.push(ValidationError::new(
            "kv.url",
            format!("{:?} is not a redis:// URL", config.kv.url),
        )),
    }
    if config.kv.command_timeout_ms == 0 {
        errors.push(ValidationError::new("kv.command_timeout_ms", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&HarnessConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = HarnessConfig::default();
        config.exporter.max_batch_size = 0;
        config.workload.cache_hit_probability = 1.5;
        config.observability.log_level = "loud".into();
        config.kv.url = "http://localhost".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "exporter.max_batch_size",
                "workload.cache_hit_probability",
                "observability.log_level",
                "kv.url"
            ]
        );
    }

    #[test]
    fn test_disabled_workload_skips_its_checks() {
        let mut config = HarnessConfig::default();
        config.workload.enabled = false;
        config.workload.counter_interval_ms = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = HarnessConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());
        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
