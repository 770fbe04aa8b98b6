//! API gateway binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──▶ request id ─▶ trace ─▶ timeout ─▶ CORS ─▶ security headers
//!         ─▶ anonymous IP limit ─▶ maintenance ─▶ path blocking ─▶ envelope
//!         ─▶ router ──┬─▶ system   (settings, notifications, health)
//!                     ├─▶ ai       (API key gate ─▶ luminai upstream)
//!                     ├─▶ maker    (API key gate ─▶ brat upstream)
//!                     └─▶ fallback (404 status page / JSON)
//!
//!     settings.json ──▶ settings store (fresh read or watched snapshot)
//!                       read by the gates on every evaluation
//! ```

use std::path::PathBuf;

use clap::Parser;

use api_gateway::config::loader::load_config_or_default;
use api_gateway::config::open_settings_store;
use api_gateway::handlers::builtin_registry;
use api_gateway::lifecycle::{shutdown_on_signal, Shutdown};
use api_gateway::observability::{logging, metrics};
use api_gateway::{net, HttpServer};

#[derive(Parser)]
#[command(name = "api-gateway", version, about = "HTTP API gateway")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Override the listener bind address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config_or_default(&cli.config)?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-gateway starting");
    tracing::info!(
        config = %cli.config.display(),
        bind_address = %config.listener.bind_address,
        settings = %config.settings.path,
        settings_mode = ?config.settings.mode,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher stops when dropped.
    let (settings, _watcher) = open_settings_store(&config.settings)?;

    let listener = net::bind(&config.listener).await?;
    let server = HttpServer::new(config, settings, &builtin_registry());

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
