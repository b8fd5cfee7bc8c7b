//! Aggregation queries and the tab catalogue.

use statboard_core::{
    Category, CategorySchema, CodeRegistry, LeaderboardPage, LeaderboardQuery,
    LeaderboardRequest, PageLimits, StatError,
};
use statboard_storage::{RouterSnapshot, StatStore, TableRouter};
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiResult;
use crate::types::{TabColumn, TabView, TabsResponse};

/// Serves leaderboard pages against the live column layout.
#[derive(Clone)]
pub struct LeaderboardService {
    store: Arc<dyn StatStore>,
    router: Arc<TableRouter>,
    limits: PageLimits,
}

impl LeaderboardService {
    pub fn new(store: Arc<dyn StatStore>, router: Arc<TableRouter>, limits: PageLimits) -> Self {
        Self {
            store,
            router,
            limits,
        }
    }

    /// Validate `req` and fetch one page.
    ///
    /// A sort field missing from the snapshot may be a column added since
    /// the last load, so the snapshot is reloaded once before rejecting it.
    pub async fn page(&self, req: &LeaderboardRequest) -> ApiResult<LeaderboardPage> {
        let category = Category::parse_tab(req.tab.as_deref().unwrap_or_default())?;
        let snapshot = self.router.current().await;

        let query = match self.validate(req, category, &snapshot) {
            Err(StatError::UnknownSortField { field, .. }) => {
                debug!(field = %field, %category, "Unknown sort field, reloading layout");
                let fresh = self.router.reload_after_miss(snapshot.version()).await?;
                self.validate(req, category, &fresh)?
            }
            other => other?,
        };

        let page = self.store.leaderboard(&query).await?;
        debug!(
            %category,
            page = query.page(),
            rows = page.data.len(),
            total = page.total_count,
            "Leaderboard page served"
        );
        Ok(page)
    }

    fn validate(
        &self,
        req: &LeaderboardRequest,
        category: Category,
        snapshot: &RouterSnapshot,
    ) -> Result<LeaderboardQuery, StatError> {
        match snapshot.schema(category) {
            Some(schema) => LeaderboardQuery::validate(req, schema, self.limits),
            None => LeaderboardQuery::validate(req, &CategorySchema::new(category, Vec::new()), self.limits),
        }
    }

    /// Every category with its sortable columns, ordered by registry
    /// display order.
    pub async fn tabs(&self) -> TabsResponse {
        let snapshot = self.router.current().await;
        tabs_from_snapshot(&snapshot, CodeRegistry::global())
    }
}

pub(crate) fn tabs_from_snapshot(snapshot: &RouterSnapshot, codes: &CodeRegistry) -> TabsResponse {
    let tabs = Category::ALL
        .into_iter()
        .map(|category| {
            let schema = snapshot.schema(category);
            let mut columns: Vec<TabColumn> = schema
                .map(|s| s.columns())
                .unwrap_or_default()
                .iter()
                .map(|column| {
                    let entry = snapshot
                        .registry()
                        .iter()
                        .find(|e| e.column == column.as_str() && e.category == category);
                    TabColumn {
                        column: column.to_string(),
                        label: entry.and_then(|e| e.label.clone()),
                        display_order: entry.map_or(i32::MAX, |e| e.display_order),
                        code: codes.encode(column.as_str()).map(str::to_string),
                    }
                })
                .collect();
            columns.sort_by(|a, b| {
                a.display_order
                    .cmp(&b.display_order)
                    .then_with(|| a.column.cmp(&b.column))
            });

            TabView {
                category,
                table: category.table_name().to_string(),
                short_name: category.short_name().to_string(),
                kdr: schema.is_some_and(CategorySchema::supports_kill_death_ratio),
                columns,
            }
        })
        .collect();

    TabsResponse {
        registry_version: snapshot.version(),
        tabs,
    }
}
