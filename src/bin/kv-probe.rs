//! Exercise a Redis server with set, get and a pipelined batch, exporting the
//! command metrics like the harness does.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use instrument_harness::config::{load_or_default, require_dsn, CONFIG_ENV};
use instrument_harness::export::{ExportPipeline, HttpExporter, PipelineSettings, Resource};
use instrument_harness::instruments::InstrumentRegistry;
use instrument_harness::kv::{run_round_trip, InstrumentedKv, RedisKv};
use instrument_harness::observability::init_logging;

#[derive(Parser)]
#[command(name = "kv-probe")]
#[command(about = "Run set/get/pipeline against Redis and export command metrics", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Redis URL, overrides kv.url
    #[arg(long)]
    redis_url: Option<String>,

    /// Key to write and read back
    #[arg(short, long, default_value = "foo")]
    key: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = load_or_default(cli.config.as_deref())?;
    if let Some(url) = cli.redis_url {
        config.kv.url = url;
    }
    init_logging(&config.observability)?;

    let dsn = require_dsn(&config).inspect_err(|e| {
        tracing::error!(error = %e, "Cannot start without an exporter DSN");
    })?;
    let exporter = HttpExporter::new(
        &dsn,
        Resource::new(&config.service.name, &config.service.version),
        Duration::from_secs(config.exporter.request_timeout_secs),
    )?;

    let pipeline = ExportPipeline::start(Arc::new(exporter), PipelineSettings::from(&config.exporter));
    let registry = Arc::new(InstrumentRegistry::new(pipeline.sink()));

    let outcome = match RedisKv::connect(&config.kv).await {
        Ok(store) => {
            let kv = InstrumentedKv::new(store, registry)?;
            run_round_trip(&kv, &cli.key).await
        }
        Err(e) => {
            tracing::error!(error = %e, url = %config.kv.url, "Cannot connect to the key-value store");
            Err(e)
        }
    };

    let stats = pipeline.shutdown().await?;
    tracing::info!(exported = stats.exported, dropped = stats.dropped, "Probe finished");

    outcome?;
    Ok(())
}
