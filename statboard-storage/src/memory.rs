//! In-memory [`StatStore`] for tests and local runs.
//!
//! Everything sits behind one `RwLock`, so each trait call is atomic with
//! respect to every other call. Leaderboard aggregation mirrors the SQL
//! produced by the Postgres builder: sums are `u128`, KDR is rounded to two
//! decimals, ties fall back to steam id ascending.

use ::async_trait::async_trait;
use statboard_core::{
    default_registry_entries, kill_death_ratio, Category, CategorySchema, ColumnRegistryEntry,
    CounterDeltas, Identifier, LeaderboardPage, LeaderboardQuery, LeaderboardRow, ServerScope,
    SortDirection, SortKey, StatKey, StorageError, StorageResult, Timestamp,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::StatStore;

/// A player as owned by the player registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub steam_id: String,
    pub username: String,
    pub last_seen_at: Option<Timestamp>,
    pub last_server_id: Option<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    players: BTreeMap<String, PlayerRecord>,
    servers: BTreeSet<String>,
    registry: Vec<ColumnRegistryEntry>,
    schemas: BTreeMap<Category, CategorySchema>,
    rows: HashMap<(Category, StatKey), BTreeMap<Identifier, i64>>,
    fail_next: Option<(Option<&'static str>, String)>,
}

/// In-memory statboard storage.
#[derive(Debug, Default)]
pub struct InMemoryStatStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStatStore {
    /// Empty store: no players, no servers, no columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the default column layout and registry of the embedded
    /// wire code table.
    pub fn with_default_layout() -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.write() {
            state.registry = default_registry_entries();
            state.schemas = Category::ALL
                .into_iter()
                .map(|c| (c, CategorySchema::default_for(c)))
                .collect();
        }
        store
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, MemoryState>> {
        self.state.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state.write().map_err(|_| StorageError::LockPoisoned)
    }

    fn take_failure(&self, operation: &'static str) -> StorageResult<()> {
        let mut state = self.write()?;
        let armed = matches!(&state.fail_next, Some((op, _)) if op.map_or(true, |op| op == operation));
        let failure = if armed { state.fail_next.take() } else { None };
        match failure {
            Some((_, reason)) => Err(StorageError::QueryFailed { operation, reason }),
            None => Ok(()),
        }
    }

    /// Register a player.
    pub fn add_player(&self, steam_id: &str, username: &str) -> StorageResult<()> {
        self.write()?.players.insert(
            steam_id.to_string(),
            PlayerRecord {
                steam_id: steam_id.to_string(),
                username: username.to_string(),
                last_seen_at: None,
                last_server_id: None,
            },
        );
        Ok(())
    }

    /// Register a server.
    pub fn add_server(&self, server_id: &str) -> StorageResult<()> {
        self.write()?.servers.insert(server_id.to_string());
        Ok(())
    }

    /// Replace the persisted column registry.
    pub fn set_registry(&self, entries: Vec<ColumnRegistryEntry>) -> StorageResult<()> {
        self.write()?.registry = entries;
        Ok(())
    }

    /// Add a counter column to a category table, the way an administrator
    /// would with `ALTER TABLE ... ADD COLUMN`.
    pub fn add_counter_column(&self, category: Category, column: Identifier) -> StorageResult<()> {
        let mut state = self.write()?;
        let mut columns = state
            .schemas
            .get(&category)
            .map(|s| s.columns().to_vec())
            .unwrap_or_default();
        columns.push(column);
        state
            .schemas
            .insert(category, CategorySchema::new(category, columns));
        Ok(())
    }

    /// Make the next storage call fail with `reason`.
    pub fn fail_next(&self, reason: &str) -> StorageResult<()> {
        self.write()?.fail_next = Some((None, reason.to_string()));
        Ok(())
    }

    /// Make the next call of `operation` fail with `reason`. Other calls are
    /// unaffected.
    pub fn fail_next_on(&self, operation: &'static str, reason: &str) -> StorageResult<()> {
        self.write()?.fail_next = Some((Some(operation), reason.to_string()));
        Ok(())
    }

    /// Current value of one counter. Absent rows and columns read as zero.
    pub fn counter(&self, category: Category, key: &StatKey, column: &str) -> StorageResult<i64> {
        let state = self.read()?;
        Ok(state
            .rows
            .get(&(category, key.clone()))
            .and_then(|row| row.iter().find(|(c, _)| c.as_str() == column))
            .map(|(_, v)| *v)
            .unwrap_or(0))
    }

    /// Whether a category row exists for `key`.
    pub fn has_row(&self, category: Category, key: &StatKey) -> StorageResult<bool> {
        Ok(self.read()?.rows.contains_key(&(category, key.clone())))
    }

    /// Number of category rows across all tables.
    pub fn row_count(&self) -> StorageResult<usize> {
        Ok(self.read()?.rows.len())
    }

    pub fn player(&self, steam_id: &str) -> StorageResult<Option<PlayerRecord>> {
        Ok(self.read()?.players.get(steam_id).cloned())
    }
}

#[async_trait]
impl StatStore for InMemoryStatStore {
    async fn health_check(&self) -> StorageResult<()> {
        self.take_failure("health_check")
    }

    async fn registered_servers(&self) -> StorageResult<HashSet<String>> {
        self.take_failure("registered_servers")?;
        Ok(self.read()?.servers.iter().cloned().collect())
    }

    async fn known_players(&self, steam_ids: &[String]) -> StorageResult<HashSet<String>> {
        self.take_failure("known_players")?;
        let state = self.read()?;
        Ok(steam_ids
            .iter()
            .filter(|id| state.players.contains_key(id.as_str()))
            .cloned()
            .collect())
    }

    async fn increment_counters(
        &self,
        category: Category,
        key: &StatKey,
        deltas: &CounterDeltas,
    ) -> StorageResult<()> {
        self.take_failure("increment_counters")?;
        let mut state = self.write()?;
        let table = category.table_name();

        let schema = state
            .schemas
            .get(&category)
            .ok_or_else(|| StorageError::QueryFailed {
                operation: "increment_counters",
                reason: format!("relation {} does not exist", table),
            })?;
        if let Some(column) = deltas.keys().find(|c| !schema.contains(c.as_str())) {
            return Err(StorageError::UnknownColumn {
                table,
                column: column.to_string(),
            });
        }
        if !state.players.contains_key(&key.steam_id) || !state.servers.contains(&key.server_id)
        {
            return Err(StorageError::QueryFailed {
                operation: "increment_counters",
                reason: format!("foreign key violation for {}", key),
            });
        }

        let row_key = (category, key.clone());
        let existing = state.rows.get(&row_key);

        // Compute every new value before writing any, so a failure leaves the
        // row untouched (or absent).
        let mut updated = Vec::with_capacity(deltas.len());
        for (column, delta) in deltas {
            let current = existing.and_then(|row| row.get(column).copied()).unwrap_or(0);
            let next = current
                .checked_add(*delta)
                .filter(|v| *v >= 0)
                .ok_or_else(|| StorageError::CounterOverflow {
                    table,
                    column: column.to_string(),
                })?;
            updated.push((column.clone(), next));
        }
        state.rows.entry(row_key).or_default().extend(updated);
        Ok(())
    }

    async fn touch_player(&self, key: &StatKey, seen_at: Timestamp) -> StorageResult<()> {
        self.take_failure("touch_player")?;
        let mut state = self.write()?;
        if let Some(player) = state.players.get_mut(&key.steam_id) {
            player.last_seen_at = Some(seen_at);
            player.last_server_id = Some(key.server_id.clone());
        }
        Ok(())
    }

    async fn column_registry(&self) -> StorageResult<Vec<ColumnRegistryEntry>> {
        self.take_failure("column_registry")?;
        Ok(self.read()?.registry.clone())
    }

    async fn category_schemas(&self) -> StorageResult<Vec<CategorySchema>> {
        self.take_failure("category_schemas")?;
        Ok(self.read()?.schemas.values().cloned().collect())
    }

    async fn leaderboard(&self, query: &LeaderboardQuery) -> StorageResult<LeaderboardPage> {
        self.take_failure("leaderboard")?;
        let state = self.read()?;
        let category = query.category();
        let needle = query.filter().map(str::to_lowercase);

        let mut sums: BTreeMap<&str, BTreeMap<&str, u128>> = BTreeMap::new();
        for ((row_category, key), counters) in &state.rows {
            if *row_category != category {
                continue;
            }
            if let ServerScope::Server(server_id) = query.server() {
                if &key.server_id != server_id {
                    continue;
                }
            }
            let Some(player) = state.players.get(&key.steam_id) else {
                continue;
            };
            if let (Some(raw), Some(needle)) = (query.filter(), needle.as_deref()) {
                let by_name = player.username.to_lowercase().contains(needle);
                if !by_name && player.steam_id != raw {
                    continue;
                }
            }

            let totals = sums.entry(player.steam_id.as_str()).or_default();
            for column in query.columns() {
                let value = counters.get(column).copied().unwrap_or(0).max(0) as u128;
                *totals.entry(column.as_str()).or_insert(0) += value;
            }
        }

        let mut rows: Vec<LeaderboardRow> = sums
            .into_iter()
            .filter_map(|(steam_id, totals)| {
                let player = state.players.get(steam_id)?;
                let stats: BTreeMap<String, u128> = query
                    .columns()
                    .iter()
                    .map(|c| (c.to_string(), totals.get(c.as_str()).copied().unwrap_or(0)))
                    .collect();
                let kdr = query.include_kdr().then(|| {
                    kill_death_ratio(
                        stats.get("kills").copied().unwrap_or(0),
                        stats.get("deaths").copied().unwrap_or(0),
                    )
                });
                Some(LeaderboardRow {
                    steam_id: player.steam_id.clone(),
                    username: player.username.clone(),
                    kdr,
                    stats,
                })
            })
            .collect();

        rows.sort_by(|a, b| compare_rows(a, b, query.sort(), query.direction()));

        let total_count = rows.len() as u64;
        let data = rows
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.page_size() as usize)
            .collect();

        Ok(LeaderboardPage::new(data, total_count, query.page_size()))
    }
}

fn compare_rows(
    a: &LeaderboardRow,
    b: &LeaderboardRow,
    sort: &SortKey,
    direction: SortDirection,
) -> Ordering {
    let primary = match sort {
        SortKey::Column(column) => {
            let left = a.stats.get(column.as_str()).copied().unwrap_or(0);
            let right = b.stats.get(column.as_str()).copied().unwrap_or(0);
            left.cmp(&right)
        }
        SortKey::KillDeathRatio => a.kdr.unwrap_or(0.0).total_cmp(&b.kdr.unwrap_or(0.0)),
        SortKey::SteamId => Ordering::Equal,
    };
    let primary = match direction {
        SortDirection::Asc => primary,
        SortDirection::Desc => primary.reverse(),
    };
    primary.then_with(|| a.steam_id.cmp(&b.steam_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use statboard_core::{LeaderboardRequest, PageLimits};
    use std::sync::Arc;

    fn ident(name: &str) -> Identifier {
        Identifier::parse(name).unwrap()
    }

    fn deltas(pairs: &[(&str, i64)]) -> CounterDeltas {
        pairs.iter().map(|(c, v)| (ident(c), *v)).collect()
    }

    fn seeded() -> InMemoryStatStore {
        let store = InMemoryStatStore::with_default_layout();
        store.add_server("srv1").unwrap();
        store.add_server("srv2").unwrap();
        store.add_player("S1", "alice").unwrap();
        store.add_player("S2", "bob").unwrap();
        store.add_player("S3", "carol").unwrap();
        store
    }

    fn pvp_query(req: LeaderboardRequest) -> LeaderboardQuery {
        let schema = CategorySchema::default_for(Category::Pvp);
        LeaderboardQuery::validate(&req, &schema, PageLimits::default()).unwrap()
    }

    #[tokio::test]
    async fn test_increment_creates_then_adds() {
        let store = seeded();
        let key = StatKey::new("S1", "srv1");
        store
            .increment_counters(Category::Pvp, &key, &deltas(&[("kills", 3)]))
            .await
            .unwrap();
        store
            .increment_counters(Category::Pvp, &key, &deltas(&[("kills", 3), ("deaths", 1)]))
            .await
            .unwrap();
        assert_eq!(store.counter(Category::Pvp, &key, "kills").unwrap(), 6);
        assert_eq!(store.counter(Category::Pvp, &key, "deaths").unwrap(), 1);
        assert_eq!(store.row_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_increment_rejects_foreign_columns() {
        let store = seeded();
        let key = StatKey::new("S1", "srv1");
        let err = store
            .increment_counters(Category::Pvp, &key, &deltas(&[("kills", 1), ("wood_farmed", 5)]))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownColumn { .. }));
        assert!(!store.has_row(Category::Pvp, &key).unwrap());
    }

    #[tokio::test]
    async fn test_increment_overflow_leaves_row_untouched() {
        let store = seeded();
        let key = StatKey::new("S1", "srv1");
        store
            .increment_counters(Category::Pvp, &key, &deltas(&[("kills", 1), ("deaths", i64::MAX)]))
            .await
            .unwrap();
        let err = store
            .increment_counters(Category::Pvp, &key, &deltas(&[("kills", 1), ("deaths", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::CounterOverflow { .. }));
        assert_eq!(store.counter(Category::Pvp, &key, "kills").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_first_increment_creates_no_row() {
        let store = seeded();
        let key = StatKey::new("S1", "srv1");
        let err = store
            .increment_counters(Category::Pvp, &key, &deltas(&[("kills", 1), ("deaths", -1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::CounterOverflow { .. }));
        assert!(!store.has_row(Category::Pvp, &key).unwrap());
        assert_eq!(store.row_count().unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_sum_exactly() {
        let store = Arc::new(seeded());
        let key = StatKey::new("S1", "srv1");
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = Arc::clone(&store);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                store
                    .increment_counters(Category::Pvp, &key, &deltas(&[("kills", 2)]))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.counter(Category::Pvp, &key, "kills").unwrap(), 100);
    }

    #[tokio::test]
    async fn test_touch_player_records_server() {
        let store = seeded();
        let now = chrono::Utc::now();
        store.touch_player(&StatKey::new("S1", "srv2"), now).await.unwrap();
        let player = store.player("S1").unwrap().unwrap();
        assert_eq!(player.last_server_id.as_deref(), Some("srv2"));
        assert_eq!(player.last_seen_at, Some(now));
    }

    #[tokio::test]
    async fn test_leaderboard_sums_across_servers_and_ranks_kdr() {
        let store = seeded();
        for (steam, server, kills, deaths) in [
            ("S1", "srv1", 10, 0),
            ("S2", "srv1", 10, 2),
            ("S2", "srv2", 10, 3),
            ("S3", "srv2", 7, 0),
        ] {
            store
                .increment_counters(
                    Category::Pvp,
                    &StatKey::new(steam, server),
                    &deltas(&[("kills", kills), ("deaths", deaths)]),
                )
                .await
                .unwrap();
        }

        let page = store
            .leaderboard(&pvp_query(LeaderboardRequest {
                sort_field: Some("kdr".to_string()),
                sort_order: Some("DESC".to_string()),
                page_size: Some("5".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap();

        assert_eq!(page.total_count, 3);
        assert_eq!(page.total_pages, 1);
        let order: Vec<_> = page.data.iter().map(|r| r.steam_id.as_str()).collect();
        assert_eq!(order, vec!["S1", "S3", "S2"]);
        assert_eq!(page.data[0].kdr, Some(10.0));
        assert_eq!(page.data[2].stats["kills"], 20);
        assert_eq!(page.data[2].kdr, Some(4.0));
    }

    #[tokio::test]
    async fn test_leaderboard_server_scope_and_filter() {
        let store = seeded();
        store
            .increment_counters(Category::Pvp, &StatKey::new("S1", "srv1"), &deltas(&[("kills", 1)]))
            .await
            .unwrap();
        store
            .increment_counters(Category::Pvp, &StatKey::new("S2", "srv2"), &deltas(&[("kills", 4)]))
            .await
            .unwrap();

        let page = store
            .leaderboard(&pvp_query(LeaderboardRequest {
                server: Some("srv1".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].steam_id, "S1");

        let page = store
            .leaderboard(&pvp_query(LeaderboardRequest {
                filter: Some("BO".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].username, "bob");

        let page = store
            .leaderboard(&pvp_query(LeaderboardRequest {
                filter: Some("S1".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].steam_id, "S1");
    }

    #[tokio::test]
    async fn test_pages_are_disjoint() {
        let store = InMemoryStatStore::with_default_layout();
        store.add_server("srv1").unwrap();
        for i in 0..23 {
            let steam = format!("S{:02}", i);
            store.add_player(&steam, &format!("player{}", i)).unwrap();
            store
                .increment_counters(
                    Category::Pvp,
                    &StatKey::new(steam, "srv1"),
                    &deltas(&[("kills", (i % 4) as i64)]),
                )
                .await
                .unwrap();
        }

        let mut seen = HashSet::new();
        for page in 1..=3 {
            let result = store
                .leaderboard(&pvp_query(LeaderboardRequest {
                    page: Some(page.to_string()),
                    ..Default::default()
                }))
                .await
                .unwrap();
            assert_eq!(result.total_count, 23);
            assert_eq!(result.total_pages, 3);
            for row in result.data {
                assert!(seen.insert(row.steam_id), "row repeated across pages");
            }
        }
        assert_eq!(seen.len(), 23);
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let store = seeded();
        store.fail_next("connection reset").unwrap();
        assert!(store.registered_servers().await.is_err());
        assert_eq!(store.registered_servers().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fail_next_on_targets_one_operation() {
        let store = seeded();
        store.fail_next_on("touch_player", "timeout").unwrap();
        assert!(store.registered_servers().await.is_ok());
        let key = StatKey::new("S1", "srv1");
        assert!(store.touch_player(&key, chrono::Utc::now()).await.is_err());
        assert!(store.touch_player(&key, chrono::Utc::now()).await.is_ok());
    }
}
