mod auth;
mod config;
mod error;
mod middleware;
mod routes;
mod state;

use std::sync::Arc;

use site_admin_core::document::model::DEFAULT_PARTITIONS;
use site_admin_core::events::bus::EventBus;
use site_admin_core::store::postgres::{PgBlobStore, PgPartitionStore};
use tower_http::limit::RequestBodyLimitLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience)
    let _ = dotenvy::dotenv();

    // Load configuration
    let config = config::AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load config: {e}. Is DATABASE_URL set?"))?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    tracing::info!("Starting site admin API server");

    // Create database connection pool
    let pool = config
        .store
        .connect()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {e}"))?;

    tracing::info!("Connected to PostgreSQL");

    // Run migrations
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {e}"))?;

    tracing::info!("Database migrations applied");

    // Editable partitions stay reachable even when left out of the backup scope.
    let mut reachable = config.store.partitions.clone();
    for name in DEFAULT_PARTITIONS {
        if !reachable.iter().any(|p| p == name) {
            reachable.push(name.to_string());
        }
    }
    let partitions = PgPartitionStore::new(pool.clone(), reachable)
        .map_err(|e| anyhow::anyhow!("Invalid partition configuration: {e}"))?;
    let blobs = PgBlobStore::new(pool);
    tracing::info!(partitions = ?config.store.partitions, bucket = %config.store.bucket, "Backup scope configured");
    tracing::info!(bucket = %config.store.image_bucket, folder = %config.store.image_folder, "Image library configured");

    // Create event bus
    let event_bus = EventBus::new(config.event_bus_capacity);

    // Build application state
    let state = state::AppState::new(config.clone(), Arc::new(partitions), Arc::new(blobs), event_bus);

    // Build router with middleware
    let app = routes::build_router(state)
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(
            middleware::request_tracing::trace_layer()
                .make_span_with(middleware::request_tracing::make_span()),
        )
        .layer(middleware::cors::cors_layer());

    // Start server
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { tracing::info!("Received Ctrl+C, shutting down..."); }
        _ = terminate => { tracing::info!("Received SIGTERM, shutting down..."); }
    }
}
