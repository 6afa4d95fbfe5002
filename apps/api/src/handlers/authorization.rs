use axum::Json;
use axum::extract::{Extension, Path, State};
use tasklane_core::OrganizationId;

use crate::dto::{AuthorizationRequest, CapabilitiesResponse, DecisionResponse};
use crate::error::ApiResult;
use crate::middleware::RequestActor;
use crate::state::AppState;

/// Decides one action and records the verdict in the audit log.
pub async fn authorize_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path(organization_id): Path<OrganizationId>,
    Json(payload): Json<AuthorizationRequest>,
) -> ApiResult<Json<DecisionResponse>> {
    let action = payload.action()?;
    let target = payload.target.into_target(organization_id)?;

    let explanation = state
        .authorization_service
        .decide(
            actor.user_id(),
            organization_id,
            action,
            &target,
            actor.context(),
        )
        .await?;

    Ok(Json(DecisionResponse::from(explanation)))
}

/// Same verdict as [`authorize_handler`] without an audit entry.
pub async fn explain_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path(organization_id): Path<OrganizationId>,
    Json(payload): Json<AuthorizationRequest>,
) -> ApiResult<Json<DecisionResponse>> {
    let action = payload.action()?;
    let target = payload.target.into_target(organization_id)?;

    let explanation = state
        .authorization_service
        .explain(actor.user_id(), organization_id, action, &target)
        .await?;

    Ok(Json(DecisionResponse::from(explanation)))
}

/// Lists the cataloged permissions the caller holds at class level.
pub async fn capabilities_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path(organization_id): Path<OrganizationId>,
) -> ApiResult<Json<CapabilitiesResponse>> {
    let permissions = state
        .authorization_service
        .capabilities(actor.user_id(), organization_id)
        .await?;

    Ok(Json(CapabilitiesResponse::from(permissions)))
}
