//! REST API Routes Module
//!
//! - Stats ingestion, leaderboards and catalogues under /stats
//! - Health check endpoints (Kubernetes-compatible) under /health
//! - Prometheus metrics at /metrics
//! - OpenAPI document at /openapi.json
//! - CORS support for browser-based leaderboard clients

pub mod health;
pub mod stats;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::from_fn,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::config::ApiConfig;
use crate::middleware::API_KEY_HEADER;
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use health::create_router as health_router;
pub use stats::create_router as stats_router;

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins, including
/// `*.example.com` style wildcard subdomains.
fn build_cors_layer(config: &Arc<ApiConfig>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(API_KEY_HEADER),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if !config.is_production() {
        tracing::info!("CORS: Development mode - allowing all origins");
        return cors.allow_origin(Any);
    }

    tracing::info!(
        "CORS: Production mode - allowing origins: {:?}",
        config.cors_origins
    );
    let config = Arc::clone(config);
    cors.allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        origin
            .to_str()
            .is_ok_and(|origin| config.is_origin_allowed(origin))
    }))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the complete API router.
///
/// # Middleware Order (outer to inner)
/// 1. CORS - handles preflight requests
/// 2. HTTP trace spans
/// 3. Request timeout
/// 4. Observability - per-route metrics and request logs
/// 5. Body size limit
/// 6. Ingest token check (write routes only, see [`stats::create_router`])
pub fn create_api_router(state: AppState) -> Router {
    let config = state.config.clone();
    let health_state = health::HealthState {
        store: state.store.clone(),
        router: state.router.clone(),
        start_time: state.start_time,
    };

    #[allow(unused_mut)]
    let mut router = Router::new()
        .nest("/stats", stats::create_router(state.clone()))
        .nest("/health", health::create_router(health_state))
        .route("/metrics", get(metrics_handler).with_state(state.router.clone()))
        .route("/openapi.json", get(openapi_json));

    #[cfg(feature = "swagger-ui")]
    {
        use utoipa_swagger_ui::SwaggerUi;
        router = router.merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        );
    }

    router
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(from_fn(observability_middleware))
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&config))
}
