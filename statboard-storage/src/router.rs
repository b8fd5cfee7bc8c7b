//! Column to table routing cache.
//!
//! The router holds an immutable [`RouterSnapshot`] behind an `ArcSwap`.
//! Readers load the current snapshot without locking; a reload builds a new
//! snapshot and swaps it in whole. Reloads are serialized through an async
//! mutex so a burst of cache misses costs one registry round trip.
//!
//! A snapshot is refreshed when:
//! - [`TableRouter::invalidate`] is called,
//! - it is older than the configured TTL (checked by [`TableRouter::current`],
//!   which serves the stale snapshot rather than wait on a reload in flight),
//! - a column misses and the caller asks for [`TableRouter::reload_after_miss`].

use arc_swap::ArcSwap;
use statboard_core::{
    Category, CategorySchema, ColumnRegistryEntry, Identifier, StorageResult, Timestamp,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::StatStore;

/// One immutable view of the column registry and live table layouts.
#[derive(Debug, Clone)]
pub struct RouterSnapshot {
    version: u64,
    loaded_at: Timestamp,
    loaded_instant: Instant,
    routes: HashMap<String, Category>,
    schemas: BTreeMap<Category, CategorySchema>,
    registry: Vec<ColumnRegistryEntry>,
}

impl RouterSnapshot {
    /// Build a snapshot. A registry entry becomes a route only when its
    /// column exists in the live schema of its category; anything else is
    /// reported and left unroutable.
    pub fn build(
        version: u64,
        registry: Vec<ColumnRegistryEntry>,
        schemas: Vec<CategorySchema>,
    ) -> Self {
        let mut by_category: BTreeMap<Category, CategorySchema> = Category::ALL
            .into_iter()
            .map(|c| (c, CategorySchema::new(c, Vec::new())))
            .collect();
        for schema in schemas {
            by_category.insert(schema.category(), schema);
        }

        let mut routes = HashMap::with_capacity(registry.len());
        for entry in &registry {
            let Ok(column) = Identifier::parse(&entry.column) else {
                warn!(column = %entry.column, "Registry column is not a valid identifier");
                continue;
            };
            let present = by_category
                .get(&entry.category)
                .is_some_and(|schema| schema.contains(column.as_str()));
            if !present {
                warn!(
                    column = %column,
                    table = entry.category.table_name(),
                    "Registry column missing from its table"
                );
                continue;
            }
            if let Some(previous) = routes.insert(column.to_string(), entry.category) {
                if previous != entry.category {
                    warn!(
                        column = %column,
                        first = previous.table_name(),
                        second = entry.category.table_name(),
                        "Column registered to two tables, keeping the later entry"
                    );
                }
            }
        }

        Self {
            version,
            loaded_at: chrono::Utc::now(),
            loaded_instant: Instant::now(),
            routes,
            schemas: by_category,
            registry,
        }
    }

    /// Monotonic reload counter, starting at 1 for the first load.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn loaded_at(&self) -> Timestamp {
        self.loaded_at
    }

    pub fn age(&self) -> Duration {
        self.loaded_instant.elapsed()
    }

    /// Owning table of `column`, if routable.
    pub fn table_for(&self, column: &str) -> Option<Category> {
        self.routes.get(column).copied()
    }

    /// Live schema of `category`. Always present; empty when the table has
    /// no counter columns.
    pub fn schema(&self, category: Category) -> Option<&CategorySchema> {
        self.schemas.get(&category)
    }

    /// Registry entries as loaded.
    pub fn registry(&self) -> &[ColumnRegistryEntry] {
        &self.registry
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

/// Shared, read-mostly column router.
pub struct TableRouter {
    store: Arc<dyn StatStore>,
    ttl: Option<Duration>,
    current: ArcSwap<RouterSnapshot>,
    reload_lock: Mutex<()>,
}

impl std::fmt::Debug for TableRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.current.load();
        f.debug_struct("TableRouter")
            .field("ttl", &self.ttl)
            .field("version", &snapshot.version)
            .field("routes", &snapshot.routes.len())
            .finish()
    }
}

impl TableRouter {
    /// Load the first snapshot. `ttl` of zero disables age-based refresh.
    pub async fn load(store: Arc<dyn StatStore>, ttl: Duration) -> StorageResult<Self> {
        let snapshot = fetch(store.as_ref(), 1).await?;
        info!(
            version = snapshot.version,
            routes = snapshot.route_count(),
            "Table router loaded"
        );
        Ok(Self {
            store,
            ttl: (!ttl.is_zero()).then_some(ttl),
            current: ArcSwap::from_pointee(snapshot),
            reload_lock: Mutex::new(()),
        })
    }

    /// Current snapshot without any freshness check. Never blocks.
    pub fn snapshot(&self) -> Arc<RouterSnapshot> {
        self.current.load_full()
    }

    /// Current snapshot, refreshed first if it has outlived the TTL.
    ///
    /// Never waits on another task's reload: while one is in flight the
    /// stale snapshot is served. A failed refresh also serves it.
    pub async fn current(&self) -> Arc<RouterSnapshot> {
        let snapshot = self.snapshot();
        match self.ttl {
            Some(ttl) if snapshot.age() >= ttl => self.refresh_expired(snapshot).await,
            _ => snapshot,
        }
    }

    async fn refresh_expired(&self, snapshot: Arc<RouterSnapshot>) -> Arc<RouterSnapshot> {
        let Ok(_guard) = self.reload_lock.try_lock() else {
            debug!(version = snapshot.version, "Router reload in flight, serving stale snapshot");
            return snapshot;
        };
        let current = self.current.load_full();
        if current.version != snapshot.version {
            return current;
        }
        match self.swap_in(current.version + 1).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(error = %e, version = current.version, "Router refresh failed, serving stale snapshot");
                current
            }
        }
    }

    /// Reload because a column missed in the snapshot with `observed_version`.
    /// If another task already replaced that snapshot, its result is reused.
    pub async fn reload_after_miss(&self, observed_version: u64) -> StorageResult<Arc<RouterSnapshot>> {
        self.reload_if_version(observed_version).await
    }

    /// Owning table of `column`, reloading once on a miss.
    pub async fn table_for(&self, column: &str) -> StorageResult<Option<Category>> {
        let snapshot = self.current().await;
        if let Some(category) = snapshot.table_for(column) {
            return Ok(Some(category));
        }
        let fresh = self.reload_after_miss(snapshot.version).await?;
        Ok(fresh.table_for(column))
    }

    /// Drop the cached snapshot and load a new one unconditionally.
    pub async fn invalidate(&self) -> StorageResult<Arc<RouterSnapshot>> {
        let _guard = self.reload_lock.lock().await;
        let next = self.current.load().version + 1;
        self.swap_in(next).await
    }

    async fn reload_if_version(&self, observed_version: u64) -> StorageResult<Arc<RouterSnapshot>> {
        let _guard = self.reload_lock.lock().await;
        let current = self.current.load_full();
        if current.version != observed_version {
            debug!(
                observed = observed_version,
                current = current.version,
                "Router already reloaded by another task"
            );
            return Ok(current);
        }
        self.swap_in(current.version + 1).await
    }

    async fn swap_in(&self, version: u64) -> StorageResult<Arc<RouterSnapshot>> {
        let snapshot = Arc::new(fetch(self.store.as_ref(), version).await?);
        self.current.store(Arc::clone(&snapshot));
        info!(
            version,
            routes = snapshot.route_count(),
            "Table router reloaded"
        );
        Ok(snapshot)
    }
}

async fn fetch(store: &dyn StatStore, version: u64) -> StorageResult<RouterSnapshot> {
    let registry = store.column_registry().await?;
    let schemas = store.category_schemas().await?;
    Ok(RouterSnapshot::build(version, registry, schemas))
}
