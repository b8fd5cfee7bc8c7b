//! Statboard API Server Entry Point
//!
//! Bootstraps configuration, optionally applies the bundled schema, loads
//! the column registry and starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use statboard_api::telemetry::{init_tracer, with_metrics, TelemetryConfig};
use statboard_api::{
    bind_address, create_api_router, ApiConfig, ApiError, ApiResult, AppState, DbClient, DbConfig,
};
use statboard_storage::{StatStore, TableRouter};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::from_env();
    init_tracer(&telemetry_config)?;

    let db_config = DbConfig::from_env();
    let db = DbClient::from_config(&db_config)?;
    if db_config.bootstrap {
        db.bootstrap_schema().await?;
    }
    let store: Arc<dyn StatStore> = Arc::new(db);

    let api_config = ApiConfig::from_env();
    let router = Arc::new(TableRouter::load(store.clone(), api_config.registry_ttl).await?);
    with_metrics(|m| m.set_registry_version(router.snapshot().version()));

    let app = create_api_router(AppState::new(store, router, api_config));

    let addr: SocketAddr = bind_address()
        .parse()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address: {}", e)))?;
    tracing::info!(
        %addr,
        service = %telemetry_config.service_name,
        version = %telemetry_config.service_version,
        "Starting Statboard API server"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
