//! Access introspection endpoints
//!
//! Advisory only: these tell a UI what to show. Data access is still enforced
//! by the scoped gateway.

use crate::api::SuccessResponse;
use crate::catalog::CatalogSource;
use crate::domain::{AdminOverride, EffectiveScope};
use crate::error::Result;
use crate::policy::GuardRequirements;
use crate::service::AuthorizedSession;
use crate::state::HasServices;
use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct AccessSummary {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub franchise_id: Option<Uuid>,
    pub roles: Vec<String>,
    pub effective_scope: EffectiveScope,
    pub permissions: Vec<String>,
    pub admin_override: Option<AdminOverride>,
    pub catalog_source: CatalogSource,
}

impl AccessSummary {
    pub fn from_session(session: &AuthorizedSession) -> Result<Self> {
        let ctx = session.context();
        Ok(Self {
            user_id: ctx.user_id(),
            tenant_id: ctx.tenant_id(),
            franchise_id: ctx.franchise_id(),
            roles: ctx.roles().iter().map(|r| r.to_string()).collect(),
            effective_scope: session.effective_scope()?,
            permissions: session.permissions().tags(),
            admin_override: ctx.admin_override(),
            catalog_source: session.catalog().source(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct GuardDecision {
    pub allowed: bool,
}

#[derive(Debug, Serialize)]
pub struct CatalogReload {
    pub catalog_source: CatalogSource,
}

/// Role level required to republish the process-wide catalog
const PLATFORM_LEVEL: u8 = 0;

/// GET /api/v1/access/me
pub async fn me(session: AuthorizedSession) -> Result<impl IntoResponse> {
    Ok(Json(SuccessResponse::new(AccessSummary::from_session(
        &session,
    )?)))
}

/// POST /api/v1/access/check
pub async fn check(
    session: AuthorizedSession,
    Json(requirements): Json<GuardRequirements>,
) -> Result<impl IntoResponse> {
    requirements.validate()?;
    Ok(Json(SuccessResponse::new(GuardDecision {
        allowed: session.allow(&requirements),
    })))
}

/// POST /api/v1/access/catalog/reload
///
/// Reloads role overrides and publishes the result for new sessions.
pub async fn reload_catalog<S: HasServices>(
    State(state): State<S>,
    session: AuthorizedSession,
) -> Result<impl IntoResponse> {
    session.enforce(&GuardRequirements::role_level(PLATFORM_LEVEL))?;
    let catalog = state.access_service().reload_catalog().await;
    tracing::info!(
        target: "audit",
        user_id = %session.context().user_id(),
        source = ?catalog.source(),
        "Role catalog reload requested"
    );
    Ok(Json(SuccessResponse::new(CatalogReload {
        catalog_source: catalog.source(),
    })))
}
