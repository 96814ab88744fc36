//! Checkmeter Server
//!
//! Classifies meter photos as matching or not matching a target meter type
//! using a hosted vision model, with daily per-client quotas.

use anyhow::Result;
use checkmeter_server::{build_backend, create_router, spawn_usage_pruner, telemetry, AppState, Cli, ServerConfig};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing(cli.verbose);

    info!("Starting Checkmeter Server");

    let config = ServerConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded successfully");
    info!("Vision backend: {}", config.vision.backend_url);
    info!(
        "Models: standard={}, detailed={}",
        config.vision.standard_model, config.vision.detailed_model
    );
    info!(
        "Daily limits: standard={}, detailed={}",
        config.quota.limits.standard_per_day, config.quota.limits.detailed_per_day
    );

    let metrics_handle = telemetry::init_metrics()?;

    let backend = build_backend(&config, cli.api_key.as_deref(), cli.mock)?;

    let addr: SocketAddr = format!("{}:{}", config.server.listen, config.server.port).parse()?;
    let prune_every = Duration::from_secs(config.quota.prune_interval_secs);

    let state = AppState::new(config, backend, Some(metrics_handle))?;
    info!("Using {} vision backend", state.pipeline.backend_name());
    let pruner = spawn_usage_pruner(state.usage.clone(), prune_every);

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    pruner.abort();
    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
