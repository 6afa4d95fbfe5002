use super::*;

pub async fn list_resource_permissions_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path(organization_id): Path<OrganizationId>,
    Query(params): Query<ResourcePermissionListParams>,
) -> ApiResult<Json<Vec<ResourcePermissionResponse>>> {
    let actor = actor.identity(organization_id)?;
    let now = Utc::now();
    let grants = state
        .security_admin_service
        .list_resource_permissions(
            &actor,
            ResourcePermissionQuery {
                user_id: params.user_id,
                active_only: params.active_only,
            },
        )
        .await?
        .into_iter()
        .map(|grant| ResourcePermissionResponse::at(grant, now))
        .collect();

    Ok(Json(grants))
}

pub async fn grant_resource_permission_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path(organization_id): Path<OrganizationId>,
    Json(payload): Json<GrantResourcePermissionRequest>,
) -> ApiResult<(StatusCode, Json<ResourcePermissionResponse>)> {
    let actor = actor.identity(organization_id)?;
    let grant = state
        .security_admin_service
        .grant_resource_permission(&actor, payload.try_into()?)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ResourcePermissionResponse::at(grant, Utc::now())),
    ))
}

pub async fn revoke_resource_permission_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path((organization_id, resource_permission_id)): Path<(OrganizationId, ResourcePermissionId)>,
) -> ApiResult<Json<ResourcePermissionResponse>> {
    let actor = actor.identity(organization_id)?;
    let grant = state
        .security_admin_service
        .revoke_resource_permission(&actor, resource_permission_id)
        .await?;

    Ok(Json(ResourcePermissionResponse::at(grant, Utc::now())))
}

pub async fn extend_resource_permission_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path((organization_id, resource_permission_id)): Path<(OrganizationId, ResourcePermissionId)>,
    Json(payload): Json<ExtendResourcePermissionRequest>,
) -> ApiResult<Json<ResourcePermissionResponse>> {
    let actor = actor.identity(organization_id)?;
    let grant = state
        .security_admin_service
        .extend_resource_permission(&actor, resource_permission_id, payload.expires_at)
        .await?;

    Ok(Json(ResourcePermissionResponse::at(grant, Utc::now())))
}
