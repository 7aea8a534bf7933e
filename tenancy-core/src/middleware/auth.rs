//! Session extraction
//!
//! Turns a bearer token into an [`AuthorizedSession`]. The token only proves
//! who the caller is; roles and scope are loaded from role assignments on every
//! request. A platform admin may send `X-Admin-Override-Tenant` to act inside
//! one tenant for that request only.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use uuid::Uuid;

use crate::error::AppError;
use crate::service::AuthorizedSession;
use crate::state::HasServices;

pub const ADMIN_OVERRIDE_HEADER: &str = "x-admin-override-tenant";

/// Extract the Bearer token from the Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing authorization token".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header".to_string()))?;

    auth_header
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            AppError::Unauthorized("Authorization header must use Bearer scheme".to_string())
        })
}

/// Target tenant of a per-request admin override, if one was requested
pub fn admin_override_target(headers: &HeaderMap) -> Result<Option<Uuid>, AppError> {
    headers
        .get(ADMIN_OVERRIDE_HEADER)
        .map(|value| {
            value
                .to_str()
                .ok()
                .and_then(|s| Uuid::parse_str(s.trim()).ok())
                .ok_or_else(|| {
                    AppError::BadRequest(format!("{} must be a tenant UUID", ADMIN_OVERRIDE_HEADER))
                })
        })
        .transpose()
}

impl<S> FromRequestParts<S> for AuthorizedSession
where
    S: HasServices + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let claims = state
            .jwt_manager()
            .verify_identity_token(token)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;
        let user_id = claims.user_id()?;

        let session = state.access_service().open_session(user_id).await?;

        match admin_override_target(&parts.headers)? {
            Some(tenant_id) => session.with_admin_override(tenant_id),
            None => Ok(session),
        }
    }
}
