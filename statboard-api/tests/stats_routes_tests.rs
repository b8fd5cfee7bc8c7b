//! HTTP-level tests for the stats routes against the in-memory store.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use secrecy::SecretString;
use serde_json::{json, Value};
use statboard_api::ApiConfig;
use statboard_core::{Category, ColumnRegistryEntry, StatKey};
use statboard_storage::StatStore;
use statboard_test_utils::assertions::{assert_counter, assert_no_rows};

#[path = "support/app.rs"]
mod test_app_support;
use test_app_support::{test_app, test_app_with, TestApp};

async fn ingest(app: &TestApp, body: Value) -> Value {
    let (status, response) = app.post_stats(&body.to_string()).await;
    assert_eq!(status, StatusCode::OK, "ingest failed: {response}");
    response
}

fn steam_ids(page: &Value) -> Vec<&str> {
    page["data"]
        .as_array()
        .map(|rows| rows.iter().filter_map(|r| r["steamId"].as_str()).collect())
        .unwrap_or_default()
}

// ============================================================================
// POST /stats
// ============================================================================

#[tokio::test]
async fn ingest_applies_and_reports() {
    let app = test_app().await;
    let response = ingest(
        &app,
        json!([
            {"steamId": "S1", "serverId": "srv0", "A1": 3, "A2": 1, "Z9": 5},
            {"steamId": "S2", "serverId": "nowhere", "A1": 7},
            {"steamId": "S404", "serverId": "srv0", "A1": 7}
        ]),
    )
    .await;

    assert_eq!(response["success"], true);
    assert_eq!(response["processed"], 1);
    assert_eq!(response["skipped"][0]["index"], 1);
    assert_eq!(response["skipped"][0]["reason"], "unregistered_server");
    assert_eq!(response["skipped"][1]["index"], 2);
    assert_eq!(response["skipped"][1]["reason"], "unknown_player");
    assert_eq!(response["droppedFields"][0]["key"], "Z9");
    assert_eq!(response["droppedFields"][0]["reason"], "unknown_code");

    let key = StatKey::new("S1", "srv0");
    assert_counter(&app.store, Category::Pvp, &key, "kills", 3);
    assert_counter(&app.store, Category::Pvp, &key, "deaths", 1);
    assert_no_rows(&app.store, &StatKey::new("S2", "nowhere"));
}

#[tokio::test]
async fn ingest_twice_doubles_counters() {
    let app = test_app().await;
    let body = json!([{"steamId": "S1", "serverId": "srv1", "C1": 250, "e1": 30}]);
    ingest(&app, body.clone()).await;
    ingest(&app, body).await;

    let key = StatKey::new("S1", "srv1");
    assert_counter(&app.store, Category::Resources, &key, "wood_farmed", 500);
    assert_counter(&app.store, Category::Misc, &key, "time_played", 60);
}

#[tokio::test]
async fn ingest_empty_array_is_ok() {
    let app = test_app().await;
    let response = ingest(&app, json!([])).await;
    assert_eq!(response["success"], true);
    assert_eq!(response["processed"], 0);
    assert_eq!(app.store.row_count().unwrap(), 0);
}

#[tokio::test]
async fn malformed_batches_are_rejected_whole() {
    let app = test_app().await;
    let cases = [
        "not json",
        r#"{"steamId": "S1", "serverId": "srv0"}"#,
        r#"[42]"#,
        r#"[{"serverId": "srv0", "A1": 1}]"#,
        r#"[{"steamId": "S1", "A1": 1}]"#,
        r#"[{"steamId": 7, "serverId": "srv0", "A1": 1}]"#,
        r#"[{"steamId": "S1", "serverId": "srv0", "A1": "three"}]"#,
        r#"[{"steamId": "S1", "serverId": "srv0", "A1": 1.5}]"#,
        r#"[{"steamId": "S1", "serverId": "srv0", "A1": 1}, {"steamId": "", "serverId": "srv0"}]"#,
    ];
    for body in cases {
        let (status, response) = app.post_stats(body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {body}");
        assert_eq!(response["code"], "INVALID_BATCH", "wrong code for {body}");
    }
    assert_eq!(app.store.row_count().unwrap(), 0);
}

#[tokio::test]
async fn unknown_keys_of_any_type_are_dropped() {
    let app = test_app().await;
    let (status, response) = app
        .post_stats(r#"[{"steamId": "S1", "serverId": "srv0", "A1": 2, "name": "bob", "Z9": 1.5}]"#)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["processed"], 1);
    let dropped = response["droppedFields"].as_array().unwrap();
    assert_eq!(dropped.len(), 2);
    assert!(dropped.iter().all(|d| d["reason"] == "unknown_code"));
    assert_counter(&app.store, Category::Pvp, &StatKey::new("S1", "srv0"), "kills", 2);
}

#[tokio::test]
async fn oversized_batch_is_rejected() {
    let app = test_app_with(ApiConfig {
        max_batch_len: 2,
        ..ApiConfig::default()
    })
    .await;
    let entry = json!({"steamId": "S1", "serverId": "srv0", "A1": 1});
    let (status, response) = app
        .post_stats(&json!([entry.clone(), entry.clone(), entry]).to_string())
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["code"], "BATCH_TOO_LARGE");
    assert_eq!(response["details"]["max"], 2);
    assert_eq!(app.store.row_count().unwrap(), 0);
}

#[tokio::test]
async fn ingest_token_guards_writes_only() {
    let app = test_app_with(ApiConfig {
        ingest_token: Some(SecretString::from("s3cret".to_string())),
        ..ApiConfig::default()
    })
    .await;
    let body = json!([{"steamId": "S1", "serverId": "srv0", "A1": 1}]).to_string();

    let (status, response) = app.post_stats(&body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["code"], "UNAUTHORIZED");

    let (status, _) = app
        .send(
            Request::post("/stats")
                .header("authorization", "Bearer s3cret")
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/stats?tab=pvp").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(Request::post("/stats/registry/invalidate").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// GET /stats
// ============================================================================

#[tokio::test]
async fn leaderboard_sorts_and_paginates() {
    let app = test_app().await;
    let mut entries = Vec::new();
    for i in 0..4 {
        entries.push(json!({
            "steamId": format!("7656119800000{:04}", i),
            "serverId": "srv0",
            "A1": 10 * (i + 1),
        }));
    }
    ingest(&app, Value::Array(entries)).await;

    let (status, page1) = app
        .get("/stats?tab=pvp_stats&sortField=kills&sortOrder=DESC&page=1&pageSize=3")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page1["totalCount"], 4);
    assert_eq!(page1["totalPages"], 2);
    assert_eq!(
        steam_ids(&page1),
        vec!["76561198000000003", "76561198000000002", "76561198000000001"]
    );
    assert_eq!(page1["data"][0]["kills"], 40);
    assert_eq!(page1["data"][0]["username"], "player3");

    let (_, page2) = app
        .get("/stats?tab=pvp&sortField=kills&sortOrder=desc&page=2&pageSize=3")
        .await;
    assert_eq!(steam_ids(&page2), vec!["76561198000000000"]);

    let (_, asc) = app.get("/stats?tab=pvp&sortField=kills&sortOrder=asc&pageSize=1").await;
    assert_eq!(steam_ids(&asc), vec!["76561198000000000"]);
}

#[tokio::test]
async fn leaderboard_kdr_policy() {
    let app = test_app().await;
    ingest(
        &app,
        json!([
            {"steamId": "S1", "serverId": "srv0", "A1": 10, "A2": 3},
            {"steamId": "S2", "serverId": "srv0", "A1": 5, "A2": 0}
        ]),
    )
    .await;

    let (status, page) = app.get("/stats?tab=pvp&sortField=kdr").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(steam_ids(&page), vec!["S2", "S1"]);
    assert_eq!(page["data"][0]["kdr"], 5.0);
    assert_eq!(page["data"][1]["kdr"], 3.33);

    let (status, response) = app.get("/stats?tab=farming&sortField=kdr").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["code"], "UNKNOWN_SORT_FIELD");
}

#[tokio::test]
async fn leaderboard_server_scope_and_filter() {
    let app = test_app().await;
    ingest(
        &app,
        json!([
            {"steamId": "S1", "serverId": "srv0", "A1": 4},
            {"steamId": "S1", "serverId": "srv1", "A1": 6},
            {"steamId": "S2", "serverId": "srv1", "A1": 1}
        ]),
    )
    .await;

    let (_, global) = app.get("/stats?tab=pvp&server=global").await;
    assert_eq!(global["data"][0]["steamId"], "S1");
    assert_eq!(global["data"][0]["kills"], 10);

    let (_, srv0) = app.get("/stats?tab=pvp&server=srv0").await;
    assert_eq!(srv0["totalCount"], 1);
    assert_eq!(srv0["data"][0]["kills"], 4);

    let (_, by_name) = app.get("/stats?tab=pvp&filter=bob_THE").await;
    assert_eq!(steam_ids(&by_name), vec!["S2"]);

    let (_, by_id) = app.get("/stats?tab=pvp&filter=S1").await;
    assert_eq!(steam_ids(&by_id), vec!["S1"]);

    let (_, wildcard) = app.get("/stats?tab=pvp&filter=%25").await;
    assert_eq!(wildcard["totalCount"], 0);
}

#[tokio::test]
async fn leaderboard_validation_errors() {
    let app = test_app().await;
    let cases = [
        ("/stats", "UNKNOWN_TAB"),
        ("/stats?tab=cooking", "UNKNOWN_TAB"),
        ("/stats?tab=pvp&sortField=kills;DROP", "UNKNOWN_SORT_FIELD"),
        ("/stats?tab=pvp&page=0", "INVALID_INPUT"),
        ("/stats?tab=pvp&page=abc", "INVALID_INPUT"),
        ("/stats?tab=pvp&sortOrder=sideways", "INVALID_INPUT"),
    ];
    for (uri, code) in cases {
        let (status, response) = app.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {uri}");
        assert_eq!(response["code"], code, "wrong code for {uri}");
    }
}

#[tokio::test]
async fn leaderboard_empty_category() {
    let app = test_app().await;
    let (status, page) = app.get("/stats?tab=events").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"], json!([]));
    assert_eq!(page["totalCount"], 0);
    assert_eq!(page["totalPages"], 0);
}

#[tokio::test]
async fn leaderboard_page_size_is_clamped() {
    let app = test_app().await;
    let (status, _) = app.get("/stats?tab=pvp&pageSize=100000").await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// CATALOGUE AND REGISTRY ROUTES
// ============================================================================

#[tokio::test]
async fn codes_and_tabs() {
    let app = test_app().await;
    let (status, codes) = app.get("/stats/codes").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(codes["version"], 1);
    assert!(codes["codes"]
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c["code"] == "A1" && c["column"] == "kills" && c["defaultCategory"] == "pvp"));

    let (status, tabs) = app.get("/stats/tabs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tabs["tabs"].as_array().unwrap().len(), 6);
    let pvp = tabs["tabs"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["table"] == "pvp_stats")
        .unwrap();
    assert_eq!(pvp["kdr"], true);
    assert_eq!(pvp["shortName"], "pvp");
}

#[tokio::test]
async fn invalidate_picks_up_registry_edits() {
    let app = test_app().await;
    let before = app.router.snapshot().version();

    let registry: Vec<ColumnRegistryEntry> = app
        .store
        .column_registry()
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.column != "kills")
        .collect();
    app.store.set_registry(registry).unwrap();

    let (status, reload) = app
        .send(Request::post("/stats/registry/invalidate").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reload["version"], before + 1);
    assert!(reload["loadedAt"].is_string());

    let response = ingest(&app, json!([{"steamId": "S1", "serverId": "srv0", "A1": 2}])).await;
    assert_eq!(response["processed"], 1);
    assert_eq!(response["droppedFields"][0]["reason"], "unroutable");
    assert_no_rows(&app.store, &StatKey::new("S1", "srv0"));
}

// ============================================================================
// HEALTH AND METRICS
// ============================================================================

#[tokio::test]
async fn health_and_metrics() {
    let app = test_app().await;
    let (status, ready) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ready["status"], "healthy");
    assert_eq!(ready["details"]["registry_version"], 1);

    app.store.fail_next_on("health_check", "connection refused").unwrap();
    let (status, ready) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(ready["status"], "unhealthy");

    let response = tower::ServiceExt::oneshot(
        app.app.clone(),
        Request::get("/metrics").body(Body::empty()).unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn readiness_hides_storage_error_text() {
    let app = test_app().await;
    let reason = "password authentication failed for user \"statboard_admin\" at 10.0.0.5";
    app.store.fail_next_on("health_check", reason).unwrap();

    let (status, ready) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(ready["details"]["database"]["error"], "Storage unavailable");
    let body = ready.to_string();
    assert!(!body.contains("statboard_admin"));
    assert!(!body.contains("10.0.0.5"));
}

#[tokio::test]
async fn openapi_document_served() {
    let app = test_app().await;
    let (status, doc) = app.get("/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/stats"].is_object());
}
