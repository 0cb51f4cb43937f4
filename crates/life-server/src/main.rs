//! HTTP server that evolves Game of Life boards and serves their history.

mod api;
mod database;
mod evolution;
mod job_manager;
mod telemetry;

use anyhow::Result;
use life_core::ServerConfig;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize telemetry
    telemetry::init_telemetry(config.otel_endpoint.as_deref())?;

    info!("Starting Life Board server on {}:{}", config.bind_address, config.port);
    info!("Evolution runs capped at {} attempts", config.evolution.max_attempts);

    // Initialize database
    let db = database::Database::new(&config.database_path).await?;
    db.migrate().await?;

    let evolution = Arc::new(evolution::EvolutionService::new(
        db.clone(),
        config.evolution.clone(),
    ));
    let job_manager = Arc::new(job_manager::JobManager::new());

    // Pick up runs interrupted by a previous shutdown
    match db.processing_boards().await {
        Ok(pending) => {
            job_manager.resume_pending(evolution.clone(), pending);
        }
        Err(e) => warn!("Failed to load unfinished boards: {}", e),
    }

    let app = api::router(api::AppState {
        job_manager: job_manager.clone(),
        evolution,
        db,
    });

    // Start server
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    job_manager.cancel_all();

    // Shutdown telemetry
    telemetry::shutdown_telemetry();

    Ok(())
}

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
            Ok(mut stream) => {
                stream.recv().await;
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

    info!("Shutdown signal received");
}
