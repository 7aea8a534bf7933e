//! Liveness and readiness probes

use crate::catalog::CatalogSource;
use crate::state::HasServices;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness of the pieces a session needs
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub database: bool,
    /// Catalog new sessions resolve permissions against
    pub published_catalog: CatalogSource,
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /ready
///
/// Only the database gates readiness. A failed override load publishes the
/// static matrix, so the catalog is reported but never blocks.
pub async fn ready<S: HasServices>(State(state): State<S>) -> impl IntoResponse {
    let database = state.check_ready().await;
    let published_catalog = state.access_service().store().snapshot().await.source();

    let (code, status) = if database {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };
    (
        code,
        Json(ReadinessResponse {
            status,
            database,
            published_catalog,
        }),
    )
}
