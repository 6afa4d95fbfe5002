use super::*;

pub async fn list_roles_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path(organization_id): Path<OrganizationId>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let actor = actor.identity(organization_id)?;
    let roles = state
        .security_admin_service
        .list_roles(&actor)
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();

    Ok(Json(roles))
}

pub async fn create_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path(organization_id): Path<OrganizationId>,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    let actor = actor.identity(organization_id)?;
    let role = state
        .security_admin_service
        .create_role(&actor, payload.try_into()?)
        .await?;

    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

pub async fn duplicate_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path((organization_id, role_id)): Path<(OrganizationId, RoleId)>,
    Json(payload): Json<DuplicateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    let actor = actor.identity(organization_id)?;
    let role = state
        .security_admin_service
        .duplicate_role(&actor, role_id, payload.into())
        .await?;

    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

pub async fn update_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path((organization_id, role_id)): Path<(OrganizationId, RoleId)>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<Json<RoleResponse>> {
    let actor = actor.identity(organization_id)?;
    let role = state
        .security_admin_service
        .update_role(&actor, role_id, payload.into())
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn delete_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path((organization_id, role_id)): Path<(OrganizationId, RoleId)>,
) -> ApiResult<StatusCode> {
    let actor = actor.identity(organization_id)?;
    state
        .security_admin_service
        .delete_role(&actor, role_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_role_permission_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path((organization_id, role_id)): Path<(OrganizationId, RoleId)>,
    Json(payload): Json<RoleGrantRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    let actor = actor.identity(organization_id)?;
    let role = state
        .security_admin_service
        .add_role_permission(&actor, role_id, payload.try_into()?)
        .await?;

    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

pub async fn remove_role_permission_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path((organization_id, role_id, permission)): Path<(OrganizationId, RoleId, String)>,
) -> ApiResult<Json<RoleResponse>> {
    let actor = actor.identity(organization_id)?;
    let permission = Permission::from_transport(permission.as_str())?;
    let role = state
        .security_admin_service
        .remove_role_permission(&actor, role_id, permission)
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn assign_role_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path((organization_id, user_id)): Path<(OrganizationId, UserId)>,
    Json(payload): Json<AssignRoleRequest>,
) -> ApiResult<Json<MembershipResponse>> {
    let actor = actor.identity(organization_id)?;
    let membership = state
        .security_admin_service
        .assign_role(&actor, user_id, payload.role_id)
        .await?;

    Ok(Json(MembershipResponse::from(membership)))
}

/// Seeds the system roles of an organization; requires organization update rights.
pub async fn bootstrap_roles_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path(organization_id): Path<OrganizationId>,
) -> ApiResult<Json<Vec<RoleResponse>>> {
    let actor = actor.identity(organization_id)?;
    state
        .authorization_service
        .require_permission(
            &actor,
            Action::Update,
            &ResourceInstance::organization(organization_id, true).into(),
        )
        .await?;

    let created = state
        .role_bootstrap_service
        .ensure_default_roles(organization_id)
        .await?
        .into_iter()
        .map(RoleResponse::from)
        .collect();

    Ok(Json(created))
}
