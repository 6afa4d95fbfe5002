use super::*;

use tasklane_application::{AuditLogEntry, AuditSummary};

pub async fn list_audit_log_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path(organization_id): Path<OrganizationId>,
    Query(params): Query<AuditLogQueryParams>,
) -> ApiResult<Json<Vec<AuditLogEntry>>> {
    let actor = actor.identity(organization_id)?;
    let entries = state
        .security_admin_service
        .list_audit_entries(&actor, params.into())
        .await?;

    Ok(Json(entries))
}

pub async fn audit_summary_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path(organization_id): Path<OrganizationId>,
    Query(params): Query<AuditWindowParams>,
) -> ApiResult<Json<AuditSummary>> {
    let actor = actor.identity(organization_id)?;
    let summary = state
        .security_admin_service
        .audit_summary(&actor, params.into())
        .await?;

    Ok(Json(summary))
}

pub async fn export_audit_log_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path(organization_id): Path<OrganizationId>,
    Query(params): Query<AuditWindowParams>,
) -> ApiResult<Json<Vec<AuditLogEntry>>> {
    let actor = actor.identity(organization_id)?;
    let entries = state
        .security_admin_service
        .export_audit_entries(&actor, params.into())
        .await?;

    Ok(Json(entries))
}

pub async fn purge_audit_log_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path(organization_id): Path<OrganizationId>,
    Json(payload): Json<AuditPurgeRequest>,
) -> ApiResult<Json<AuditPurgeResponse>> {
    let actor = actor.identity(organization_id)?;
    let purged = state
        .security_admin_service
        .purge_audit_entries(&actor, payload.retention_days)
        .await?;

    Ok(Json(AuditPurgeResponse { purged }))
}
