use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use statboard_api::{create_api_router, ApiConfig, AppState};
use statboard_storage::{InMemoryStatStore, StatStore, TableRouter};
use statboard_test_utils::fixtures;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub struct TestApp {
    pub app: Router,
    pub store: Arc<InMemoryStatStore>,
    pub router: Arc<TableRouter>,
}

pub async fn test_app_with(config: ApiConfig) -> TestApp {
    let store = Arc::new(fixtures::seeded_store(4, 2).expect("seed store"));
    store.add_player("S1", "alice").expect("add player");
    store.add_player("S2", "Bob_the_Builder").expect("add player");
    let dyn_store: Arc<dyn StatStore> = store.clone();
    let router = Arc::new(
        TableRouter::load(dyn_store.clone(), Duration::ZERO)
            .await
            .expect("load router"),
    );
    let app = create_api_router(AppState::new(dyn_store, router.clone(), config));
    TestApp { app, store, router }
}

pub async fn test_app() -> TestApp {
    test_app_with(ApiConfig::default()).await
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn post_stats(&self, body: &str) -> (StatusCode, Value) {
        self.send(
            Request::post("/stats")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).expect("request"))
            .await
    }
}
