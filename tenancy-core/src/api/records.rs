//! Generic record endpoints over the scoped gateway

use crate::api::SuccessResponse;
use crate::catalog::defaults::is_catalogued;
use crate::error::{AppError, Result};
use crate::policy::GuardRequirements;
use crate::repository::{QueryOptions, ScopedExecutor};
use crate::service::quote::{CURRENT_VERSION_COLUMN, QUOTES, QUOTE_VERSIONS};
use crate::service::AuthorizedSession;
use crate::state::HasServices;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Default, Deserialize)]
pub struct RecordsQuery {
    #[serde(default)]
    pub bypass_scope: bool,
}

/// Catalog resource guarding a table; quote versions share the quote tags
fn permission_resource(table: &str) -> &str {
    match table {
        QUOTE_VERSIONS => QUOTES,
        other => other,
    }
}

/// First catalogued tag among `<resource>.<action>` candidates
fn required_permission(table: &str, actions: &[&str]) -> Option<GuardRequirements> {
    let resource = permission_resource(table);
    actions
        .iter()
        .map(|action| format!("{}.{}", resource, action))
        .find(|tag| is_catalogued(tag))
        .map(GuardRequirements::permission)
}

/// Refuse generic writes to rows the quote lifecycle owns
fn reject_lifecycle_writes(table: &str, payload: &Map<String, Value>) -> Result<()> {
    match table {
        QUOTE_VERSIONS => Err(AppError::Forbidden(
            "Quote versions are created and transitioned through the quote endpoints".to_string(),
        )),
        QUOTES if payload.contains_key(CURRENT_VERSION_COLUMN) => Err(AppError::Forbidden(
            "The current quote version is set through make-current".to_string(),
        )),
        _ => Ok(()),
    }
}

/// GET /api/v1/records/{table}
pub async fn list<S: HasServices>(
    State(state): State<S>,
    session: AuthorizedSession,
    Path(table): Path<String>,
    Query(params): Query<RecordsQuery>,
) -> Result<impl IntoResponse> {
    if let Some(requirements) = required_permission(&table, &["view"]) {
        session.enforce(&requirements)?;
    }

    let query = state.gateway().scoped_query(
        session.context(),
        &table,
        QueryOptions {
            bypass_scope: params.bypass_scope,
        },
    )?;
    let rows = state.executor().fetch_all(&query, &[]).await?;
    Ok(Json(SuccessResponse::new(rows)))
}

/// POST /api/v1/records/{table}
pub async fn create<S: HasServices>(
    State(state): State<S>,
    session: AuthorizedSession,
    Path(table): Path<String>,
    Query(params): Query<RecordsQuery>,
    Json(payload): Json<Map<String, Value>>,
) -> Result<impl IntoResponse> {
    if let Some(requirements) = required_permission(&table, &["create", "manage"]) {
        session.enforce(&requirements)?;
    }
    reject_lifecycle_writes(&table, &payload)?;

    let query = state.gateway().scoped_query(
        session.context(),
        &table,
        QueryOptions {
            bypass_scope: params.bypass_scope,
        },
    )?;
    let row = state.executor().insert(&query, payload).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(row))))
}
