//! Metrics actioner binary.
//!
//! Receives Alertmanager webhooks and runs the configured remediation rules.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use actioner::config::{Config, Overrides};
use actioner::shutdown::ShutdownSignals;
use actioner::{
    ActionRegistry, DispatchObserver, HttpServer, Metrics, MetricsObserver, RuleDispatcher,
    TracingObserver,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "metrics-actioner", version, about = "Run remediation actions for Alertmanager alerts")]
struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG")]
    config: Option<PathBuf>,

    /// IPv4 address to listen on (empty disables)
    #[arg(long, env = "HTTP_IPV4_HOST")]
    ipv4_host: Option<String>,

    /// IPv6 address to listen on (empty disables)
    #[arg(long, env = "HTTP_IPV6_HOST")]
    ipv6_host: Option<String>,

    /// Port for both listeners
    #[arg(long, env = "HTTP_PORT")]
    port: Option<u16>,

    /// IPv4 address for the metrics listener (empty disables)
    #[arg(long, env = "METRICS_IPV4_HOST")]
    metrics_ipv4_host: Option<String>,

    /// IPv6 address for the metrics listener (empty disables)
    #[arg(long, env = "METRICS_IPV6_HOST")]
    metrics_ipv6_host: Option<String>,

    /// Port for the metrics listeners
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            ipv4_host: self.ipv4_host.clone(),
            ipv6_host: self.ipv6_host.clone(),
            port: self.port,
            metrics_ipv4_host: self.metrics_ipv4_host.clone(),
            metrics_ipv6_host: self.metrics_ipv6_host.clone(),
            metrics_port: self.metrics_port,
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (text, json) = match format {
        LogFormat::Text => (Some(fmt::layer()), None),
        LogFormat::Json => (None, Some(fmt::layer().json())),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    info!(version = env!("CARGO_PKG_VERSION"), "Metrics Actioner");

    let config =
        Config::load(cli.config.as_deref(), cli.overrides()).context("Failed to load config")?;

    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);
    let observer: Arc<dyn DispatchObserver> = Arc::new(MetricsObserver::new(
        Arc::clone(&metrics),
        Arc::new(TracingObserver),
    ));
    let registry = ActionRegistry::builtin(Arc::clone(&observer));
    info!(
        rules = config.rules.len(),
        actions = ?registry.names(),
        "Loaded configuration"
    );

    let mut signals = ShutdownSignals::install().context("Failed to install signal handlers")?;

    let mut metrics_server = config
        .metrics
        .enabled()
        .then(|| HttpServer::metrics(config.metrics.clone(), metrics));
    if let Some(server) = metrics_server.as_mut() {
        info!("Starting metrics server");
        server.start().await.context("Failed to start metrics server")?;
    }

    let dispatcher = RuleDispatcher::new(config.rules, registry, observer);
    let mut server = HttpServer::new(config.http, dispatcher);

    info!("Starting HTTP server");
    server.start().await.context("Failed to start HTTP server")?;

    let signal = signals.recv().await;
    info!(%signal, "Received signal, shutting down gracefully");

    let stopped = server.stop().await.context("Shutdown error");
    if let Some(server) = metrics_server.as_mut() {
        server.stop().await.context("Metrics shutdown error")?;
    }
    stopped?;
    info!("Shutdown complete");
    Ok(())
}
