//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::dsn::{Dsn, DsnError};
use crate::config::schema::HarnessConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `exporter.dsn`.
pub const DSN_ENV: &str = "HARNESS_DSN";

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "HARNESS_CONFIG";

/// Error type for configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("exporter DSN is not configured (set HARNESS_DSN or exporter.dsn)")]
    MissingDsn,

    #[error("invalid exporter DSN: {0}")]
    InvalidDsn(#[from] DsnError),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file, applying environment overrides.
pub fn load_config(path: &Path) -> Result<HarnessConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content, |key| std::env::var(key).ok())
}

/// Load from `path` if given, otherwise start from defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<HarnessConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => parse_config("", |key| std::env::var(key).ok()),
    }
}

/// Parse TOML text, apply overrides from `env`, and validate.
pub fn parse_config<F>(content: &str, env: F) -> Result<HarnessConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: HarnessConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config, env);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply environment overrides using `env` as the variable lookup.
pub fn apply_env_overrides<F>(config: &mut HarnessConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dsn) = env(DSN_ENV).filter(|v| !v.trim().is_empty()) {
        config.exporter.dsn = Some(dsn);
    }
}

/// The exporter DSN; its absence is fatal for anything that exports.
pub fn require_dsn(config: &HarnessConfig) -> Result<Dsn, ConfigError> {
    let raw = config
        .exporter
        .dsn
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingDsn)?;
    Ok(raw.parse()?)
}
