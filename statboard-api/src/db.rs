//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling with deadpool-postgres and the Postgres
//! implementation of [`StatStore`]. Dynamic statements come from
//! [`crate::sql`]; everything else is static SQL.

use ::async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use statboard_core::{
    default_registry_entries, Category, CategorySchema, ColumnRegistryEntry, CounterDeltas,
    Identifier, LeaderboardPage, LeaderboardQuery, LeaderboardRow, StatKey, StorageError,
    StorageResult, Timestamp,
};
use statboard_storage::StatStore;
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};
use tokio_postgres::error::SqlState;
use tokio_postgres::{NoTls, Row};

use crate::error::{ApiError, ApiResult};
use crate::sql::{self, leaderboard::KDR_ALIAS};
use crate::telemetry::with_metrics;

/// Bundled schema applied by [`DbClient::bootstrap_schema`].
pub const SCHEMA_SQL: &str = include_str!("../sql/schema.sql");

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
    /// Apply the bundled schema at startup
    pub bootstrap: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "statboard".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
            bootstrap: false,
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("STATBOARD_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("STATBOARD_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("STATBOARD_DB_NAME").unwrap_or_else(|_| "statboard".to_string()),
            user: std::env::var("STATBOARD_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("STATBOARD_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("STATBOARD_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("STATBOARD_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            bootstrap: std::env::var("STATBOARD_DB_BOOTSTRAP")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Database client that wraps a connection pool.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

impl DbClient {
    /// Create a new database client with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new database client from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    async fn get_conn(&self) -> StorageResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| {
            tracing::error!("Connection pool error: {:?}", e);
            StorageError::Unavailable {
                reason: e.to_string(),
            }
        })
    }

    /// Apply the bundled schema and seed the column registry with the
    /// embedded wire code table. Existing registry rows are left alone.
    pub async fn bootstrap_schema(&self) -> ApiResult<()> {
        let mut conn = self.pool.get().await?;
        let tx = conn.transaction().await?;
        tx.batch_execute(SCHEMA_SQL).await?;

        let stmt = tx
            .prepare(
                "INSERT INTO leaderboard_columns (column_name, table_name, label, display_order) \
                 VALUES ($1, $2, $3, $4) ON CONFLICT (column_name) DO NOTHING",
            )
            .await?;
        let mut seeded = 0u64;
        for entry in default_registry_entries() {
            seeded += tx
                .execute(
                    &stmt,
                    &[
                        &entry.column,
                        &entry.category.table_name(),
                        &entry.label,
                        &entry.display_order,
                    ],
                )
                .await?;
        }
        tx.commit().await?;

        tracing::info!(seeded, "Database schema bootstrapped");
        Ok(())
    }
}

/// Log a failed statement and turn it into a storage error. Numeric overflow
/// of a counter is reported as such.
fn query_failed(
    operation: &'static str,
    table: &'static str,
) -> impl FnOnce(tokio_postgres::Error) -> StorageError {
    move |err| {
        tracing::error!(operation, table, "Database error: {:?}", err);
        if err.code() == Some(&SqlState::NUMERIC_VALUE_OUT_OF_RANGE) {
            return StorageError::CounterOverflow {
                table,
                column: "unknown".to_string(),
            };
        }
        StorageError::QueryFailed {
            operation,
            reason: err.to_string(),
        }
    }
}

fn timed<T>(operation: &str, table: &str, start: Instant, result: &StorageResult<T>) {
    let elapsed = start.elapsed().as_secs_f64();
    with_metrics(|m| m.record_db_operation(operation, table, result.is_ok(), elapsed));
}

fn parse_sum(row: &Row, column: &str) -> StorageResult<u128> {
    let text: Option<String> = row.try_get(column).map_err(|e| StorageError::QueryFailed {
        operation: "leaderboard",
        reason: e.to_string(),
    })?;
    match text {
        None => Ok(0),
        Some(text) => text.parse::<u128>().map_err(|e| StorageError::QueryFailed {
            operation: "leaderboard",
            reason: format!("sum of {} is not an unsigned integer: {}", column, e),
        }),
    }
}

fn decode_row(row: &Row, query: &LeaderboardQuery) -> StorageResult<LeaderboardRow> {
    let decode_err = |e: tokio_postgres::Error| StorageError::QueryFailed {
        operation: "leaderboard",
        reason: e.to_string(),
    };

    let mut stats = BTreeMap::new();
    for column in query.columns() {
        stats.insert(column.to_string(), parse_sum(row, column.as_str())?);
    }
    let kdr = if query.include_kdr() {
        row.try_get::<_, Option<f64>>(KDR_ALIAS).map_err(decode_err)?
    } else {
        None
    };

    Ok(LeaderboardRow {
        steam_id: row.try_get("steam_id").map_err(decode_err)?,
        username: row.try_get("username").map_err(decode_err)?,
        kdr,
        stats,
    })
}

#[async_trait]
impl StatStore for DbClient {
    async fn health_check(&self) -> StorageResult<()> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[])
            .await
            .map_err(query_failed("health_check", "-"))?;
        Ok(())
    }

    async fn registered_servers(&self) -> StorageResult<HashSet<String>> {
        let start = Instant::now();
        let result = async {
            let conn = self.get_conn().await?;
            let rows = conn
                .query("SELECT server_id FROM servers", &[])
                .await
                .map_err(query_failed("registered_servers", "servers"))?;
            Ok::<_, StorageError>(rows.iter().map(|r| r.get::<_, String>(0)).collect())
        }
        .await;
        timed("registered_servers", "servers", start, &result);
        result
    }

    async fn known_players(&self, steam_ids: &[String]) -> StorageResult<HashSet<String>> {
        if steam_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let start = Instant::now();
        let result = async {
            let conn = self.get_conn().await?;
            let rows = conn
                .query(
                    "SELECT steam_id FROM players WHERE steam_id = ANY($1)",
                    &[&steam_ids],
                )
                .await
                .map_err(query_failed("known_players", "players"))?;
            Ok::<_, StorageError>(rows.iter().map(|r| r.get::<_, String>(0)).collect())
        }
        .await;
        timed("known_players", "players", start, &result);
        result
    }

    async fn increment_counters(
        &self,
        category: Category,
        key: &StatKey,
        deltas: &CounterDeltas,
    ) -> StorageResult<()> {
        let Some(built) = sql::build_increment(category, key, deltas) else {
            return Ok(());
        };
        let table = category.table_name();
        let start = Instant::now();
        let result = async {
            let conn = self.get_conn().await?;
            conn.execute(built.sql.as_str(), &built.sql_params())
                .await
                .map_err(query_failed("increment_counters", table))?;
            Ok::<_, StorageError>(())
        }
        .await;
        timed("increment", table, start, &result);
        result
    }

    async fn touch_player(&self, key: &StatKey, seen_at: Timestamp) -> StorageResult<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "UPDATE players SET last_seen_at = $2, last_server_id = $3 WHERE steam_id = $1",
            &[&key.steam_id, &seen_at, &key.server_id],
        )
        .await
        .map_err(query_failed("touch_player", "players"))?;
        Ok(())
    }

    async fn column_registry(&self) -> StorageResult<Vec<ColumnRegistryEntry>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT column_name, table_name, label, display_order \
                 FROM leaderboard_columns ORDER BY table_name, display_order, column_name",
                &[],
            )
            .await
            .map_err(query_failed("column_registry", "leaderboard_columns"))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let column: String = row.get("column_name");
            let table: String = row.get("table_name");
            let Some(category) = Category::from_table_name(&table) else {
                tracing::warn!(column = %column, table = %table, "Registry row names an unknown table");
                continue;
            };
            entries.push(ColumnRegistryEntry {
                column,
                category,
                label: row.get("label"),
                display_order: row.get("display_order"),
            });
        }
        Ok(entries)
    }

    async fn category_schemas(&self) -> StorageResult<Vec<CategorySchema>> {
        let conn = self.get_conn().await?;
        let tables: Vec<&str> = Category::ALL.iter().map(|c| c.table_name()).collect();
        let rows = conn
            .query(
                "SELECT table_name::TEXT, column_name::TEXT FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name::TEXT = ANY($1::TEXT[]) \
                 AND data_type IN ('smallint', 'integer', 'bigint') \
                 ORDER BY table_name, ordinal_position",
                &[&tables],
            )
            .await
            .map_err(query_failed("category_schemas", "information_schema.columns"))?;

        let mut columns: BTreeMap<Category, Vec<Identifier>> = BTreeMap::new();
        for row in rows {
            let table: String = row.get(0);
            let column: String = row.get(1);
            let Some(category) = Category::from_table_name(&table) else {
                continue;
            };
            match Identifier::parse(&column) {
                Ok(ident) => columns.entry(category).or_default().push(ident),
                Err(e) => tracing::warn!(table = %table, error = %e, "Skipping counter column"),
            }
        }

        Ok(Category::ALL
            .into_iter()
            .map(|c| CategorySchema::new(c, columns.remove(&c).unwrap_or_default()))
            .collect())
    }

    async fn leaderboard(&self, query: &LeaderboardQuery) -> StorageResult<LeaderboardPage> {
        let table = query.category().table_name();
        let page_sql = sql::build_page(query);
        let count_sql = sql::build_count(query);

        let start = Instant::now();
        let result = async {
            let conn = self.get_conn().await?;
            let count_row = conn
                .query_one(count_sql.sql.as_str(), &count_sql.sql_params())
                .await
                .map_err(query_failed("leaderboard_count", table))?;
            let total_count: i64 = count_row.get(0);

            let rows = conn
                .query(page_sql.sql.as_str(), &page_sql.sql_params())
                .await
                .map_err(query_failed("leaderboard", table))?;
            let data = rows
                .iter()
                .map(|row| decode_row(row, query))
                .collect::<StorageResult<Vec<_>>>()?;

            Ok::<_, StorageError>(LeaderboardPage::new(
                data,
                u64::try_from(total_count).unwrap_or(0),
                query.page_size(),
            ))
        }
        .await;
        timed("leaderboard", table, start, &result);
        result
    }
}
