//! Prometheus Metrics Definitions
//!
//! Defines all statboard metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use std::sync::Arc;
use statboard_storage::TableRouter;

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Database operation latency buckets (seconds)
const DB_LATENCY_BUCKETS: &[f64] =
    &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<StatboardMetrics>> = Lazy::new(StatboardMetrics::new);

/// Container for all statboard metrics.
#[derive(Clone)]
pub struct StatboardMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Database operation counter - labels: operation, table, status
    pub db_operations_total: CounterVec,

    /// Database operation duration histogram - labels: operation, table
    pub db_operation_duration_seconds: HistogramVec,

    /// Ingest entries - labels: outcome (applied, skipped)
    pub ingest_entries_total: CounterVec,

    /// Fields dropped during ingest - labels: reason
    pub dropped_fields_total: CounterVec,

    /// Version of the table router snapshot in use
    pub registry_version: Gauge,
}

impl StatboardMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "statboard_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "statboard_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            db_operations_total: register_counter_vec!(
                "statboard_db_operations_total",
                "Total number of database operations",
                &["operation", "table", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register db_operations_total: {}", e)))?,

            db_operation_duration_seconds: register_histogram_vec!(
                "statboard_db_operation_duration_seconds",
                "Database operation duration in seconds",
                &["operation", "table"],
                DB_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register db_operation_duration_seconds: {}", e)))?,

            ingest_entries_total: register_counter_vec!(
                "statboard_ingest_entries_total",
                "Stat batch entries by outcome",
                &["outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register ingest_entries_total: {}", e)))?,

            dropped_fields_total: register_counter_vec!(
                "statboard_dropped_fields_total",
                "Stat fields dropped during ingest",
                &["reason"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register dropped_fields_total: {}", e)))?,

            registry_version: register_gauge!(
                "statboard_registry_version",
                "Version of the column registry snapshot in use"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register registry_version: {}", e)))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a database operation.
    pub fn record_db_operation(&self, operation: &str, table: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.db_operations_total
            .with_label_values(&[operation, table, status])
            .inc();
        self.db_operation_duration_seconds
            .with_label_values(&[operation, table])
            .observe(duration_secs);
    }

    /// Record the outcome of one ingest batch.
    pub fn record_ingest(&self, applied: usize, skipped: usize) {
        self.ingest_entries_total
            .with_label_values(&["applied"])
            .inc_by(applied as f64);
        self.ingest_entries_total
            .with_label_values(&["skipped"])
            .inc_by(skipped as f64);
    }

    /// Record one dropped field.
    pub fn record_dropped_field(&self, reason: &str) {
        self.dropped_fields_total.with_label_values(&[reason]).inc();
    }

    pub fn set_registry_version(&self, version: u64) {
        self.registry_version.set(version as f64);
    }
}

/// Run `f` against the global metrics if they registered.
pub fn with_metrics(f: impl FnOnce(&StatboardMetrics)) {
    if let Ok(metrics) = METRICS.as_ref() {
        f(metrics);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler(State(router): State<Arc<TableRouter>>) -> impl IntoResponse {
    with_metrics(|m| m.set_registry_version(router.snapshot().version()));

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
