use statboard_api::db::{DbClient, DbConfig};

pub fn test_db_client() -> DbClient {
    let config = DbConfig::from_env();
    DbClient::from_config(&config).expect("Failed to create database client")
}

/// Register a server and players directly; both registries are owned by
/// other services in production.
pub async fn seed_registries(server_id: &str, players: &[(&str, &str)]) {
    let pool = DbConfig::from_env()
        .create_pool()
        .expect("Failed to create pool");
    let conn = pool.get().await.expect("Failed to get connection");
    conn.execute(
        "INSERT INTO servers (server_id, name) VALUES ($1, $1) ON CONFLICT DO NOTHING",
        &[&server_id],
    )
    .await
    .expect("Failed to insert server");
    for (steam_id, username) in players {
        conn.execute(
            "INSERT INTO players (steam_id, username) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            &[steam_id, username],
        )
        .await
        .expect("Failed to insert player");
    }
}

/// Suffix that keeps ids unique across runs against the same database.
pub fn run_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
