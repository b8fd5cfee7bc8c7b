//! Stats REST API Routes
//!
//! - `POST /stats` - apply a batch of counter increments
//! - `GET /stats` - one page of a category leaderboard
//! - `GET /stats/codes` - the wire code table
//! - `GET /stats/tabs` - categories with their sortable columns
//! - `POST /stats/registry/invalidate` - force a column registry reload

use axum::{
    body::Bytes,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use statboard_core::{CodeRegistry, LeaderboardPage, LeaderboardRequest, StatBatch};
use statboard_storage::TableRouter;
use std::sync::Arc;
use tracing::info;

use crate::{
    config::ApiConfig,
    error::{ApiError, ApiResult},
    middleware::ingest_auth_middleware,
    services::{IngestService, LeaderboardService},
    state::AppState,
    telemetry::with_metrics,
    types::{CodeTableResponse, IngestResponse, RegistryReloadResponse, TabsResponse},
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /stats - Apply a batch of stat increments
///
/// The body is a JSON array of objects, each with `steamId`, `serverId` and
/// any number of wire code keys mapped to integer increments.
#[utoipa::path(
    post,
    path = "/stats",
    tag = "Stats",
    request_body(content = Vec<Object>, description = "Array of stat entries keyed by wire code"),
    responses(
        (status = 200, description = "Batch applied; see skipped and droppedFields", body = IngestResponse),
        (status = 400, description = "Malformed batch", body = ApiError),
        (status = 401, description = "Missing or invalid ingest token", body = ApiError),
        (status = 413, description = "Body too large"),
        (status = 500, description = "Storage failure before any write", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn ingest_stats(
    State(ingest): State<IngestService>,
    State(config): State<Arc<ApiConfig>>,
    body: Bytes,
) -> ApiResult<Json<IngestResponse>> {
    let value: serde_json::Value = serde_json::from_slice(&body)?;
    let batch = StatBatch::from_value(value, config.max_batch_len)?;
    let response = ingest.ingest(batch).await?;
    Ok(Json(response))
}

/// GET /stats - Leaderboard page for one category
#[utoipa::path(
    get,
    path = "/stats",
    tag = "Stats",
    params(LeaderboardRequest),
    responses(
        (status = 200, description = "Leaderboard page", body = LeaderboardPage),
        (status = 400, description = "Unknown tab, unknown sort field or invalid parameter", body = ApiError),
        (status = 500, description = "Storage failure", body = ApiError),
    ),
)]
pub async fn get_leaderboard(
    State(leaderboard): State<LeaderboardService>,
    Query(params): Query<LeaderboardRequest>,
) -> ApiResult<Json<LeaderboardPage>> {
    Ok(Json(leaderboard.page(&params).await?))
}

/// GET /stats/codes - Wire code table
#[utoipa::path(
    get,
    path = "/stats/codes",
    tag = "Stats",
    responses(
        (status = 200, description = "Versioned wire code table", body = CodeTableResponse),
    ),
)]
pub async fn get_codes() -> impl IntoResponse {
    Json(CodeTableResponse::from_registry(CodeRegistry::global()))
}

/// GET /stats/tabs - Categories and their sortable columns
#[utoipa::path(
    get,
    path = "/stats/tabs",
    tag = "Stats",
    responses(
        (status = 200, description = "Leaderboard tabs", body = TabsResponse),
    ),
)]
pub async fn get_tabs(State(leaderboard): State<LeaderboardService>) -> Json<TabsResponse> {
    Json(leaderboard.tabs().await)
}

/// POST /stats/registry/invalidate - Reload the column registry now
#[utoipa::path(
    post,
    path = "/stats/registry/invalidate",
    tag = "Stats",
    responses(
        (status = 200, description = "Registry reloaded", body = RegistryReloadResponse),
        (status = 401, description = "Missing or invalid ingest token", body = ApiError),
        (status = 503, description = "Storage unavailable", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn invalidate_registry(
    State(router): State<Arc<TableRouter>>,
) -> ApiResult<Json<RegistryReloadResponse>> {
    let snapshot = router.invalidate().await?;
    with_metrics(|m| m.set_registry_version(snapshot.version()));
    info!(
        version = snapshot.version(),
        routes = snapshot.route_count(),
        "Column registry reloaded on request"
    );
    Ok(Json(RegistryReloadResponse {
        version: snapshot.version(),
        routes: snapshot.route_count(),
        loaded_at: snapshot.loaded_at().to_rfc3339(),
    }))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Stats routes. Writes sit behind the ingest token check; reads are open.
pub fn create_router(state: AppState) -> Router {
    let auth = from_fn_with_state(state.config.clone(), ingest_auth_middleware);

    Router::new()
        .route(
            "/",
            post(ingest_stats).route_layer(auth.clone()).get(get_leaderboard),
        )
        .route("/codes", get(get_codes))
        .route("/tabs", get(get_tabs))
        .route(
            "/registry/invalidate",
            post(invalidate_registry).route_layer(auth),
        )
        .with_state(state)
}
