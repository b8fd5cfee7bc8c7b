//! Ingest authentication.
//!
//! Game servers present the shared ingest token either as
//! `Authorization: Bearer <token>` or as `x-api-key: <token>`. With no token
//! configured the check is disabled (development mode).

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::warn;

use crate::config::ApiConfig;
use crate::error::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

fn presented_token(request: &Request) -> Option<&str> {
    let headers = request.headers();
    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|h| h.to_str().ok()) {
        return Some(key.trim());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Compare without short-circuiting on the first differing byte.
fn tokens_match(presented: &[u8], expected: &[u8]) -> bool {
    if presented.len() != expected.len() {
        return false;
    }
    presented
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

pub async fn ingest_auth_middleware(
    State(config): State<Arc<ApiConfig>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = config.ingest_token.as_ref() else {
        return Ok(next.run(request).await);
    };

    match presented_token(&request) {
        Some(token) if tokens_match(token.as_bytes(), expected.expose_secret().as_bytes()) => {
            Ok(next.run(request).await)
        }
        Some(_) => {
            warn!(path = %request.uri().path(), "Rejected ingest request with bad token");
            Err(ApiError::unauthorized("Invalid ingest token"))
        }
        None => Err(ApiError::unauthorized("Missing ingest token")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware::from_fn_with_state, routing::post, Router};
    use secrecy::SecretString;
    use tower::ServiceExt;

    fn app(token: Option<&str>) -> Router {
        let config = Arc::new(ApiConfig {
            ingest_token: token.map(|t| SecretString::from(t.to_string())),
            ..ApiConfig::default()
        });
        Router::new()
            .route("/stats", post(|| async { "ok" }))
            .layer(from_fn_with_state(config, ingest_auth_middleware))
    }

    async fn status(app: Router, header: Option<(&str, &str)>) -> StatusCode {
        let mut builder = Request::builder().method("POST").uri("/stats");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_disabled_without_token() {
        assert_eq!(status(app(None), None).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bearer_and_api_key_accepted() {
        assert_eq!(
            status(app(Some("s3cret")), Some(("authorization", "Bearer s3cret"))).await,
            StatusCode::OK
        );
        assert_eq!(
            status(app(Some("s3cret")), Some((API_KEY_HEADER, "s3cret"))).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_missing_or_wrong_token_rejected() {
        assert_eq!(status(app(Some("s3cret")), None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(app(Some("s3cret")), Some(("authorization", "Bearer nope"))).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(app(Some("s3cret")), Some(("authorization", "s3cret"))).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match(b"abc", b"abc"));
        assert!(!tokens_match(b"abc", b"abd"));
        assert!(!tokens_match(b"ab", b"abc"));
    }
}
