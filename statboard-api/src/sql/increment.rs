//! Insert-or-increment statement.

use statboard_core::{Category, CounterDeltas, StatKey};

use super::{BuiltQuery, SqlParam};

/// One atomic upsert adding `deltas` to the `(steam_id, server_id)` row of
/// `category`. `None` when there is nothing to add.
///
/// ```sql
/// INSERT INTO "pvp_stats" AS t ("steam_id", "server_id", "deaths", "kills")
/// VALUES ($1, $2, $3, $4)
/// ON CONFLICT ("steam_id", "server_id") DO UPDATE
/// SET "deaths" = t."deaths" + EXCLUDED."deaths", "kills" = t."kills" + EXCLUDED."kills"
/// ```
pub fn build_increment(
    category: Category,
    key: &StatKey,
    deltas: &CounterDeltas,
) -> Option<BuiltQuery> {
    if deltas.is_empty() {
        return None;
    }

    let mut query = BuiltQuery {
        sql: String::new(),
        params: Vec::with_capacity(deltas.len() + 2),
    };

    let mut columns = vec!["\"steam_id\"".to_string(), "\"server_id\"".to_string()];
    let mut values = vec![
        query.bind(SqlParam::Text(key.steam_id.clone())),
        query.bind(SqlParam::Text(key.server_id.clone())),
    ];
    let mut updates = Vec::with_capacity(deltas.len());

    for (column, delta) in deltas {
        let quoted = column.quoted();
        values.push(query.bind(SqlParam::BigInt(*delta)));
        updates.push(format!("{q} = t.{q} + EXCLUDED.{q}", q = quoted));
        columns.push(quoted);
    }

    query.sql = format!(
        "INSERT INTO \"{table}\" AS t ({columns}) VALUES ({values}) \
         ON CONFLICT (\"steam_id\", \"server_id\") DO UPDATE SET {updates}",
        table = category.table_name(),
        columns = columns.join(", "),
        values = values.join(", "),
        updates = updates.join(", "),
    );
    Some(query)
}
