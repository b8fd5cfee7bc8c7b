//! OpenAPI Specification for the Statboard API
//!
//! Generated by utoipa from the route annotations and schema derives.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::routes::{health, stats};
use crate::types::*;

use statboard_core::{Category, LeaderboardPage, LeaderboardRequest, LeaderboardRow};

/// OpenAPI document for the Statboard API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Statboard API",
        description = "Player stat ingestion and leaderboard aggregation",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Stats", description = "Stat ingestion and leaderboards"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        // === Stats Routes ===
        stats::ingest_stats,
        stats::get_leaderboard,
        stats::get_codes,
        stats::get_tabs,
        stats::invalidate_registry,

        // === Health Routes ===
        health::ping,
        health::liveness,
        health::readiness,

        // === Metrics ===
        crate::telemetry::metrics::metrics_handler,
    ),
    components(
        schemas(
            // === Error Types ===
            ApiError, ErrorCode,

            // === Ingest Types ===
            IngestResponse, SkippedEntry, SkipReason, DroppedField, DropReason,

            // === Catalogue Types ===
            CodeTableResponse, WireCodeView, TabsResponse, TabView, TabColumn,
            RegistryReloadResponse,

            // === Leaderboard Types (from statboard-core) ===
            Category, LeaderboardRequest, LeaderboardPage, LeaderboardRow,

            // === Health Types ===
            health::HealthResponse, health::HealthStatus, health::HealthDetails,
            health::ComponentHealth
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security schemes accepted on the write routes.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("Shared ingest token"))
                        .build(),
                ),
            );
        }
    }
}
