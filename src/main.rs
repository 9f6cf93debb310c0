//! User-service proxy.
//!
//! ```text
//!     inbound /proxy/*  ┌──────────┐   ┌──────────────┐   ┌───────────┐
//!     ────────────────▶ │ handlers │──▶│ circuit      │──▶│ user      │
//!                       │  (axum)  │   │ breaker      │   │ service   │
//!                       └──────────┘   │ (get-user)   │   │ stub      │
//!                                      └──────────────┘   └─────┬─────┘
//!                                                               ▼
//!     backend instance  ┌──────────┐   ┌──────────────┐   ┌───────────┐
//!     ◀──────────────── │ timeout  │◀──│ interceptors │◀──│ discovery │
//!                       │  io      │   │ + transport  │   │ + zone    │
//!                       └──────────┘   └──────────────┘   │ + lb      │
//!                                                         └───────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use user_proxy::config::watcher::{apply_updates, ConfigWatcher};
use user_proxy::config::{load_config, ProxyConfig};
use user_proxy::discovery::StaticDiscovery;
use user_proxy::lifecycle::{run_smoke_check, wait_for_signal, Shutdown};
use user_proxy::observability::{logging, metrics};
use user_proxy::{AppState, HttpServer};

/// Reverse proxy for the backend user service.
#[derive(Debug, Parser)]
#[command(name = "user-proxy", version, about)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "user-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        service = %config.backend.service_id,
        instances = config.discovery.instances.len(),
        zone = ?config.load_balancer.zone,
        strategy = ?config.load_balancer.strategy,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let discovery = Arc::new(StaticDiscovery::new(&config.discovery.instances));

    // Held for the life of the process; dropping it stops file notifications.
    let _watcher = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            tokio::spawn(apply_updates(updates, discovery.clone(), shutdown.subscribe()));
            match watcher.run() {
                Ok(w) => Some(w),
                Err(e) => {
                    tracing::warn!(error = %e, "Config watcher unavailable, instance list is static");
                    None
                }
            }
        }
        None => None,
    };

    let state = AppState::from_config(&config, discovery);
    let users = state.users.clone();
    let smoke_check = config.startup.smoke_check;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    if smoke_check {
        tokio::spawn(async move {
            run_smoke_check(&*users).await;
        });
    }

    let server_shutdown = shutdown.subscribe();
    let signals = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signals.trigger();
    });

    HttpServer::new(config, state).run(listener, server_shutdown).await?;

    shutdown.trigger();
    tracing::info!("Shutdown complete");
    Ok(())
}
