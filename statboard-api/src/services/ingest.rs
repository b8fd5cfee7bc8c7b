//! Increment Engine
//!
//! Applies a structurally valid [`StatBatch`]: decode wire codes, reject
//! entries for unknown servers or players, route each column to its table,
//! then one atomic upsert per table. Lookups happen before any write and no
//! transaction spans more than one statement.

use statboard_core::{
    Category, CodeRegistry, CounterDeltas, Identifier, StatBatch, StatEntry,
};
use statboard_storage::{RouterSnapshot, StatStore, TableRouter};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::ApiResult;
use crate::telemetry::with_metrics;
use crate::types::{DropReason, DroppedField, IngestResponse, SkipReason, SkippedEntry};

/// Applies ingest batches.
#[derive(Clone)]
pub struct IngestService {
    store: Arc<dyn StatStore>,
    router: Arc<TableRouter>,
    codes: &'static CodeRegistry,
}

/// Routing state for one batch: the snapshot in use and whether the single
/// reload a batch is allowed has been spent.
struct BatchRouting<'a> {
    router: &'a TableRouter,
    snapshot: Arc<RouterSnapshot>,
    reloaded: bool,
}

impl BatchRouting<'_> {
    async fn table_for(&mut self, column: &str) -> Option<Category> {
        if let Some(category) = self.snapshot.table_for(column) {
            return Some(category);
        }
        if self.reloaded {
            return None;
        }
        self.reloaded = true;
        match self.router.reload_after_miss(self.snapshot.version()).await {
            Ok(fresh) => {
                debug!(column, version = fresh.version(), "Reloaded router after miss");
                self.snapshot = fresh;
            }
            Err(e) => warn!(column, error = %e, "Router reload after miss failed"),
        }
        self.snapshot.table_for(column)
    }
}

impl IngestService {
    pub fn new(store: Arc<dyn StatStore>, router: Arc<TableRouter>) -> Self {
        Self {
            store,
            router,
            codes: CodeRegistry::global(),
        }
    }

    /// Apply `batch`. Per-entry problems are reported in the response; only
    /// a failed collaborator lookup fails the request, and that happens
    /// before anything is written.
    pub async fn ingest(&self, batch: StatBatch) -> ApiResult<IngestResponse> {
        let mut response = IngestResponse {
            success: true,
            ..Default::default()
        };
        if batch.is_empty() {
            return Ok(response);
        }

        let servers = self.store.registered_servers().await?;
        let steam_ids: Vec<String> = batch
            .entries
            .iter()
            .map(|e| e.key.steam_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let players = self.store.known_players(&steam_ids).await?;

        let mut routing = BatchRouting {
            router: &self.router,
            snapshot: self.router.current().await,
            reloaded: false,
        };

        for entry in &batch.entries {
            let reject = if !servers.contains(&entry.key.server_id) {
                Some(SkipReason::UnregisteredServer)
            } else if !players.contains(&entry.key.steam_id) {
                Some(SkipReason::UnknownPlayer)
            } else {
                None
            };
            if let Some(reason) = reject {
                warn!(
                    index = entry.index,
                    steam_id = %entry.key.steam_id,
                    server_id = %entry.key.server_id,
                    reason = reason.as_str(),
                    "Skipping stat entry"
                );
                response.skipped.push(skipped(entry, reason));
                continue;
            }

            let columns = self.decode(entry, &mut response.dropped_fields);
            let grouped = route(entry, columns, &mut routing, &mut response.dropped_fields).await;

            match self.apply(entry, grouped).await {
                Ok(()) => response.processed += 1,
                Err(reason) => response.skipped.push(skipped(entry, reason)),
            }
        }

        with_metrics(|m| {
            m.record_ingest(response.processed, response.skipped.len());
            for field in &response.dropped_fields {
                m.record_dropped_field(field.reason.as_str());
            }
        });
        info!(
            entries = batch.len(),
            processed = response.processed,
            skipped = response.skipped.len(),
            dropped_fields = response.dropped_fields.len(),
            "Stat batch applied"
        );
        Ok(response)
    }

    /// Decode wire keys into columns. Duplicate codes for the same column
    /// are summed.
    fn decode(&self, entry: &StatEntry, dropped: &mut Vec<DroppedField>) -> BTreeMap<Identifier, (String, i64)> {
        let mut columns: BTreeMap<Identifier, (String, i64)> = BTreeMap::new();
        for key in &entry.unknown_keys {
            drop_field(entry, key, DropReason::UnknownCode, dropped);
        }
        for (key, value) in &entry.stats {
            let mut reject = |reason| drop_field(entry, key, reason, dropped);

            let Some(column) = self.codes.decode(key).and_then(|c| Identifier::parse(c).ok()) else {
                reject(DropReason::UnknownCode);
                continue;
            };
            if *value < 0 {
                reject(DropReason::NegativeValue);
                continue;
            }
            let Ok(amount) = i64::try_from(*value) else {
                reject(DropReason::OutOfRange);
                continue;
            };

            match columns.get_mut(&column) {
                None => {
                    columns.insert(column, (key.clone(), amount));
                }
                Some((_, total)) => match total.checked_add(amount) {
                    Some(sum) => *total = sum,
                    None => reject(DropReason::OutOfRange),
                },
            }
        }
        columns
    }

    /// Run one upsert per table, then mark the player as seen.
    async fn apply(
        &self,
        entry: &StatEntry,
        grouped: BTreeMap<Category, CounterDeltas>,
    ) -> Result<(), SkipReason> {
        let mut applied = 0usize;
        for (category, deltas) in &grouped {
            if let Err(e) = self.store.increment_counters(*category, &entry.key, deltas).await {
                warn!(
                    index = entry.index,
                    steam_id = %entry.key.steam_id,
                    server_id = %entry.key.server_id,
                    table = category.table_name(),
                    tables_applied = applied,
                    error = %e,
                    "Stat increment failed"
                );
                return Err(SkipReason::WriteFailed);
            }
            applied += 1;
        }

        if let Err(e) = self
            .store
            .touch_player(&entry.key, chrono::Utc::now())
            .await
        {
            warn!(steam_id = %entry.key.steam_id, error = %e, "Failed to update player last seen");
        }
        Ok(())
    }
}

fn drop_field(entry: &StatEntry, key: &str, reason: DropReason, dropped: &mut Vec<DroppedField>) {
    warn!(
        index = entry.index,
        steam_id = %entry.key.steam_id,
        code = %key,
        reason = reason.as_str(),
        "Dropping stat field"
    );
    dropped.push(DroppedField {
        index: entry.index,
        key: key.to_string(),
        reason,
    });
}

async fn route(
    entry: &StatEntry,
    columns: BTreeMap<Identifier, (String, i64)>,
    routing: &mut BatchRouting<'_>,
    dropped: &mut Vec<DroppedField>,
) -> BTreeMap<Category, CounterDeltas> {
    let mut grouped: BTreeMap<Category, CounterDeltas> = BTreeMap::new();
    for (column, (key, amount)) in columns {
        match routing.table_for(column.as_str()).await {
            Some(category) => {
                grouped.entry(category).or_default().insert(column, amount);
            }
            None => {
                warn!(
                    index = entry.index,
                    code = %key,
                    column = %column,
                    "Dropping unroutable stat field"
                );
                dropped.push(DroppedField {
                    index: entry.index,
                    key,
                    reason: DropReason::Unroutable,
                });
            }
        }
    }
    grouped
}

fn skipped(entry: &StatEntry, reason: SkipReason) -> SkippedEntry {
    SkippedEntry {
        index: entry.index,
        steam_id: entry.key.steam_id.clone(),
        server_id: entry.key.server_id.clone(),
        reason,
    }
}
