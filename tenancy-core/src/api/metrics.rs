//! Prometheus scrape endpoint

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// GET /metrics. Not routed to a recorder unless `METRICS_ENABLED=true`.
pub async fn metrics_handler(State(handle): State<Arc<Option<PrometheusHandle>>>) -> Response {
    match handle.as_ref() {
        Some(handle) => (
            [(CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
