use super::*;

pub async fn list_delegations_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path(organization_id): Path<OrganizationId>,
    Query(params): Query<DelegationListParams>,
) -> ApiResult<Json<Vec<DelegationResponse>>> {
    let actor = actor.identity(organization_id)?;
    let now = Utc::now();
    let delegations = state
        .security_admin_service
        .list_delegations(
            &actor,
            DelegationQuery {
                user_id: params.user_id,
                active_only: params.active_only,
            },
        )
        .await?
        .into_iter()
        .map(|delegation| DelegationResponse::at(delegation, now))
        .collect();

    Ok(Json(delegations))
}

pub async fn create_delegation_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path(organization_id): Path<OrganizationId>,
    Json(payload): Json<CreateDelegationRequest>,
) -> ApiResult<(StatusCode, Json<DelegationResponse>)> {
    let actor = actor.identity(organization_id)?;
    let delegation = state
        .security_admin_service
        .create_delegation(&actor, payload.try_into()?)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(DelegationResponse::at(delegation, Utc::now())),
    ))
}

pub async fn revoke_delegation_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path((organization_id, delegation_id)): Path<(OrganizationId, DelegationId)>,
) -> ApiResult<Json<DelegationResponse>> {
    let actor = actor.identity(organization_id)?;
    let delegation = state
        .security_admin_service
        .revoke_delegation(&actor, delegation_id)
        .await?;

    Ok(Json(DelegationResponse::at(delegation, Utc::now())))
}

pub async fn extend_delegation_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<RequestActor>,
    Path((organization_id, delegation_id)): Path<(OrganizationId, DelegationId)>,
    Json(payload): Json<ExtendDelegationRequest>,
) -> ApiResult<Json<DelegationResponse>> {
    let actor = actor.identity(organization_id)?;
    let delegation = state
        .security_admin_service
        .extend_delegation(&actor, delegation_id, payload.ends_at)
        .await?;

    Ok(Json(DelegationResponse::at(delegation, Utc::now())))
}
