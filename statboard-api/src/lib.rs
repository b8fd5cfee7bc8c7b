//! Statboard API - Stat Ingestion and Leaderboard HTTP Layer
//!
//! Game servers push batched counter increments keyed by compact wire codes;
//! leaderboard clients read paginated per-category aggregates. Storage is
//! PostgreSQL through [`DbClient`], behind the `StatStore` trait from
//! `statboard-storage`.

pub mod config;
pub mod db;
pub mod error;
pub mod macros;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod sql;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use config::{bind_address, ApiConfig};
pub use db::{DbClient, DbConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::ingest_auth_middleware;
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use services::{IngestService, LeaderboardService};
pub use state::AppState;
pub use types::*;
