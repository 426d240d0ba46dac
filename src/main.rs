//! Relay proxy binary.
//!
//! ```text
//!     Client ──▶ listener ──▶ FilterChain ──▶ Forwarder ──▶ Upstream
//!            ◀──────────── streamed response ◀──────────────
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use http::StatusCode;
use tokio::net::TcpListener;

use relay_proxy::config::{load_config, validate_config, RelayConfig};
use relay_proxy::error::ConfigError;
use relay_proxy::handler::StatusHandler;
use relay_proxy::lifecycle::{wait_for_signal, Shutdown};
use relay_proxy::observability::{self, TracingLogger};
use relay_proxy::{FilterChain, Forwarder, ForwarderConfig, HttpServer, HyperTransport};

#[derive(Parser)]
#[command(name = "relay-proxy")]
#[command(about = "Filtering HTTP forward proxy", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

fn load(cli: &Cli) -> Result<RelayConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load(&cli)?;

    observability::init_tracing(&config.observability);
    tracing::info!("relay-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        if let Err(e) = observability::metrics::init_metrics(addr) {
            tracing::error!(error = %e, "Failed to start metrics endpoint");
        }
    }

    let transport = HyperTransport::new(&config.transport)?;
    let forwarder = Forwarder::new(
        Arc::new(StatusHandler(StatusCode::BAD_REQUEST)),
        ForwarderConfig::default()
            .transport(Arc::new(transport))
            .logger(Arc::new(TracingLogger))
            .preserve_host(config.forward.preserve_host),
    )?;
    let chain = FilterChain::new(Vec::new()).then(Arc::new(forwarder));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        preserve_host = config.forward.preserve_host,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    let signals = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signals.trigger();
    });

    HttpServer::new(config, Arc::new(chain))
        .run(listener, server_shutdown)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
