// Scheduler binary entry point: settings, telemetry, scheduler service, HTTP API

use anyhow::{Context, Result};
use std::net::SocketAddr;

mod handlers;
mod routes;
mod state;

use common::bootstrap::init_scheduler_service;
use common::config::Settings;
use common::telemetry;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::load().context("Failed to load configuration")?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.tracing_endpoint.as_deref(),
    )?;
    tracing::info!(
        host = %settings.server.host,
        port = settings.server.port,
        storage = ?settings.storage.backend,
        "Configuration loaded"
    );

    let metrics_handle = telemetry::init_metrics()?;
    tracing::info!("Metrics exporter initialized");

    let service = init_scheduler_service(&settings).await?;
    service
        .start()
        .await
        .context("Failed to start scheduler")?;

    let state = AppState::new(service.clone(), metrics_handle, settings.clone());
    let app = routes::create_router(state);

    let addr = SocketAddr::from((
        settings
            .server
            .host
            .parse::<std::net::IpAddr>()
            .context("Invalid server host")?,
        settings.server.port,
    ));
    tracing::info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("HTTP server stopped, stopping scheduler");
    if let Err(e) = service.stop().await {
        tracing::error!(error = %e, "Scheduler did not stop cleanly");
    }

    telemetry::shutdown_tracer();
    tracing::info!("Scheduler stopped");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}
