//! REST router service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ axum catch-all ──▶ Dispatcher ──▶ RouteTable
//!                     (CORS, request ID,   │  exact lookup, then
//!                      body buffering)     │  ordered {placeholder} scan
//!                                          ▼
//!                                     handler(request, response, params)
//!                                          │
//!     Client Response                      ▼
//!     ◀────────────── axum response ◀── Response::flush
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use rest_router::api::{self, Stores};
use rest_router::config::{load_config, validate_config, AppConfig};
use rest_router::lifecycle::{signals::shutdown_signal, Shutdown};
use rest_router::observability::{logging, metrics};
use rest_router::HttpServer;

#[derive(Parser)]
#[command(name = "rest-router")]
#[command(about = "Lightweight HTTP router serving a users REST API", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(rest_router::config::ConfigError::Validation)?;
    }

    logging::init_logging(&config.observability);
    tracing::info!("rest-router v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_body_size = config.limits.max_body_size,
        cors_development = config.cors.development,
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

    let stores = Stores::default();
    let routes = api::routes(&stores);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    let server = HttpServer::new(config, routes);
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
