//! Shared application state for Axum routers.

use statboard_storage::{StatStore, TableRouter};
use std::sync::Arc;

use crate::config::ApiConfig;
use crate::services::{IngestService, LeaderboardService};

/// Application-wide state shared across the stats routes.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StatStore>,
    /// Column-to-table routing shared by ingest and queries
    pub router: Arc<TableRouter>,
    pub config: Arc<ApiConfig>,
    pub ingest: IngestService,
    pub leaderboard: LeaderboardService,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn StatStore>, router: Arc<TableRouter>, config: ApiConfig) -> Self {
        Self {
            ingest: IngestService::new(store.clone(), router.clone()),
            leaderboard: LeaderboardService::new(store.clone(), router.clone(), config.page_limits),
            store,
            router,
            config: Arc::new(config),
            start_time: std::time::Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<dyn StatStore>, store);
crate::impl_from_ref!(Arc<TableRouter>, router);
crate::impl_from_ref!(Arc<ApiConfig>, config);
crate::impl_from_ref!(IngestService, ingest);
crate::impl_from_ref!(LeaderboardService, leaderboard);
