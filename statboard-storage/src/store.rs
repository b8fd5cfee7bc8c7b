//! Async storage trait for statboard persistence.
//!
//! The HTTP layer talks to storage only through [`StatStore`]. The Postgres
//! implementation lives in `statboard-api`; [`crate::InMemoryStatStore`]
//! implements the same contract for tests and local runs.

use ::async_trait::async_trait;
use statboard_core::{
    Category, CategorySchema, ColumnRegistryEntry, CounterDeltas, LeaderboardPage,
    LeaderboardQuery, StatKey, StorageResult, Timestamp,
};
use std::collections::HashSet;

/// Storage operations used by the ingest and leaderboard paths.
#[async_trait]
pub trait StatStore: Send + Sync {
    /// Cheap round trip to the backend.
    async fn health_check(&self) -> StorageResult<()>;

    // ========================================================================
    // COLLABORATOR LOOKUPS
    // ========================================================================

    /// Server ids currently registered. Fetched once per ingest batch.
    async fn registered_servers(&self) -> StorageResult<HashSet<String>>;

    /// The subset of `steam_ids` that exist as players.
    async fn known_players(&self, steam_ids: &[String]) -> StorageResult<HashSet<String>>;

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Insert the `(steam_id, server_id)` row of `category` if absent, then
    /// add every delta to its column. Must be a single atomic step: two
    /// concurrent calls for the same key both land in full.
    ///
    /// Every column must belong to the live schema of `category`.
    async fn increment_counters(
        &self,
        category: Category,
        key: &StatKey,
        deltas: &CounterDeltas,
    ) -> StorageResult<()>;

    /// Record that the player was last seen on `key.server_id`.
    async fn touch_player(&self, key: &StatKey, seen_at: Timestamp) -> StorageResult<()>;

    // ========================================================================
    // SCHEMA
    // ========================================================================

    /// Persisted column to category mapping.
    async fn column_registry(&self) -> StorageResult<Vec<ColumnRegistryEntry>>;

    /// Counter columns physically present in each category table.
    async fn category_schemas(&self) -> StorageResult<Vec<CategorySchema>>;

    // ========================================================================
    // READS
    // ========================================================================

    /// One page of aggregated rows plus the total row count.
    async fn leaderboard(&self, query: &LeaderboardQuery) -> StorageResult<LeaderboardPage>;
}
