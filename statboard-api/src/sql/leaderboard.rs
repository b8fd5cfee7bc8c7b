//! Leaderboard aggregate and count statements.
//!
//! Counters are `BIGINT`; `SUM(bigint)` is `NUMERIC` in Postgres, so sums
//! never overflow. They come back as text and are parsed into `u128`.

use statboard_core::{LeaderboardQuery, ServerScope, SortKey};

use super::{BuiltQuery, SqlParam};

/// Column alias of the derived kill/death ratio.
pub const KDR_ALIAS: &str = "kdr";

/// Escape `\`, `%` and `_` for use inside a `LIKE ... ESCAPE '\'` pattern.
pub fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn sum_expr(column: &str) -> String {
    format!("SUM(t.\"{}\")", column)
}

/// Zero deaths ranks by raw kills; otherwise the ratio rounded to 2 places.
fn kdr_expr() -> String {
    format!(
        "(CASE WHEN {deaths} = 0 THEN {kills}::NUMERIC \
         ELSE ROUND({kills}::NUMERIC / {deaths}, 2) END)::FLOAT8",
        kills = sum_expr("kills"),
        deaths = sum_expr("deaths"),
    )
}

/// `FROM ... JOIN ... WHERE ...` shared by the page and count statements.
fn from_clause(query: &LeaderboardQuery, built: &mut BuiltQuery) -> String {
    let mut sql = format!(
        " FROM \"{}\" t JOIN players p ON p.steam_id = t.steam_id",
        query.category().table_name()
    );

    let mut conditions = Vec::new();
    if let ServerScope::Server(server_id) = query.server() {
        let param = built.bind(SqlParam::Text(server_id.clone()));
        conditions.push(format!("t.server_id = {}", param));
    }
    if let Some(filter) = query.filter() {
        let pattern = built.bind(SqlParam::Text(format!("%{}%", escape_like(filter))));
        let exact = built.bind(SqlParam::Text(filter.to_string()));
        conditions.push(format!(
            "(p.username ILIKE {} ESCAPE '\\' OR p.steam_id = {})",
            pattern, exact
        ));
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql
}

/// One page of aggregated rows.
///
/// Result columns: `steam_id`, `username`, one text column per counter
/// named after it, and `kdr` when the category has one.
pub fn build_page(query: &LeaderboardQuery) -> BuiltQuery {
    let mut built = BuiltQuery {
        sql: String::new(),
        params: Vec::new(),
    };

    let mut select = vec!["p.steam_id".to_string(), "p.username".to_string()];
    for column in query.columns() {
        select.push(format!(
            "{}::TEXT AS {}",
            sum_expr(column.as_str()),
            column.quoted()
        ));
    }
    if query.include_kdr() {
        select.push(format!("{} AS {}", kdr_expr(), KDR_ALIAS));
    }

    let from = from_clause(query, &mut built);

    let direction = query.direction().as_sql();
    let order = match query.sort() {
        SortKey::Column(column) => {
            format!("{} {}, p.steam_id ASC", sum_expr(column.as_str()), direction)
        }
        SortKey::KillDeathRatio => format!("{} {}, p.steam_id ASC", kdr_expr(), direction),
        SortKey::SteamId => "p.steam_id ASC".to_string(),
    };

    let limit = built.bind(SqlParam::BigInt(i64::from(query.page_size())));
    let offset = built.bind(SqlParam::BigInt(
        i64::try_from(query.offset()).unwrap_or(i64::MAX),
    ));

    built.sql = format!(
        "SELECT {select}{from} GROUP BY p.steam_id, p.username ORDER BY {order} LIMIT {limit} OFFSET {offset}",
        select = select.join(", "),
    );
    built
}

/// Number of distinct players matching the same filters as [`build_page`].
pub fn build_count(query: &LeaderboardQuery) -> BuiltQuery {
    let mut built = BuiltQuery {
        sql: String::new(),
        params: Vec::new(),
    };
    let from = from_clause(query, &mut built);
    built.sql = format!("SELECT COUNT(DISTINCT t.steam_id){}", from);
    built
}
