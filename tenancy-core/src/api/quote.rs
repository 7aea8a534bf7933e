//! Quote version lifecycle endpoints

use crate::api::SuccessResponse;
use crate::domain::TransitionQuoteInput;
use crate::error::Result;
use crate::policy::GuardRequirements;
use crate::service::AuthorizedSession;
use crate::state::HasServices;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

const CREATE_QUOTES: &str = "quotes.create";
const EDIT_QUOTES: &str = "quotes.edit";

/// POST /api/v1/quotes/{id}/versions
pub async fn create_version<S: HasServices>(
    State(state): State<S>,
    session: AuthorizedSession,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    session.enforce(&GuardRequirements::permission(CREATE_QUOTES))?;
    let version = state
        .quote_service()
        .create_version(session.context(), id)
        .await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(version))))
}

/// POST /api/v1/quote-versions/{id}/transition
pub async fn transition<S: HasServices>(
    State(state): State<S>,
    session: AuthorizedSession,
    Path(id): Path<Uuid>,
    Json(input): Json<TransitionQuoteInput>,
) -> Result<impl IntoResponse> {
    session.enforce(&GuardRequirements::permission(EDIT_QUOTES))?;
    let version = state
        .quote_service()
        .transition(session.context(), id, input.status)
        .await?;
    Ok(Json(SuccessResponse::new(version)))
}

/// POST /api/v1/quote-versions/{id}/make-current
pub async fn make_current<S: HasServices>(
    State(state): State<S>,
    session: AuthorizedSession,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    session.enforce(&GuardRequirements::permission(EDIT_QUOTES))?;
    let quote = state
        .quote_service()
        .set_current_version(session.context(), id)
        .await?;
    Ok(Json(SuccessResponse::new(quote)))
}
