//! Instrumentation harness binary.
//!
//! Loads configuration, requires an exporter DSN, starts the demo workload
//! and runs until SIGINT, SIGTERM or SIGQUIT.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use instrument_harness::config::{load_or_default, require_dsn, CONFIG_ENV};
use instrument_harness::export::{
    Exporter, FanoutExporter, HttpExporter, MetricsFacadeExporter, Resource,
};
use instrument_harness::observability::{init_logging, init_metrics};
use instrument_harness::Harness;

#[derive(Parser)]
#[command(name = "instrument-harness")]
#[command(about = "Emit a demo metrics workload to a remote ingest endpoint", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = CONFIG_ENV)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;
    init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "instrument-harness starting");

    let dsn = require_dsn(&config).inspect_err(|e| {
        tracing::error!(error = %e, "Cannot start without an exporter DSN");
    })?;

    let http = HttpExporter::new(
        &dsn,
        Resource::new(&config.service.name, &config.service.version),
        Duration::from_secs(config.exporter.request_timeout_secs),
    )?;
    tracing::info!(dsn = %dsn, endpoint = %http.endpoint(), "Exporter configured");

    let exporter: Arc<dyn Exporter> = if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
        let http: Arc<dyn Exporter> = Arc::new(http);
        let facade: Arc<dyn Exporter> = Arc::new(MetricsFacadeExporter::new());
        Arc::new(FanoutExporter::new(vec![http, facade]))
    } else {
        Arc::new(http)
    };

    let harness = Harness::start(&config, exporter)?;
    let report = harness.run_until_signal().await?;

    if let Some(error) = &report.flush_error {
        tracing::warn!(error = %error, "Final flush incomplete");
    }
    tracing::info!(report = %serde_json::to_string(&report)?, "Exiting");
    Ok(())
}
