//! Row types and decoders shared by the PostgreSQL security adapters.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use tasklane_core::{AppError, AppResult, NonEmptyString, OrganizationId, UserId};
use tasklane_domain::{
    DelegationId, GrantConditions, GrantScope, LegacyRole, Membership, MembershipRole,
    PermissionDelegation, ResourcePermission, ResourcePermissionId, Role, RoleGrant, RoleId,
    RoleKey, RolePriority, StoredPermission,
};

#[derive(Debug, FromRow)]
struct RoleRow {
    id: uuid::Uuid,
    organization_id: uuid::Uuid,
    key: String,
    name: String,
    priority: i32,
    is_system: bool,
    is_editable: bool,
}

#[derive(Debug, FromRow)]
struct RoleGrantRow {
    role_id: uuid::Uuid,
    resource_type: String,
    action: String,
    conditions: Json<GrantConditions>,
    scope: Json<GrantScope>,
}

#[derive(Debug, FromRow)]
pub(crate) struct MembershipRow {
    organization_id: uuid::Uuid,
    user_id: uuid::Uuid,
    legacy_role: Option<String>,
    role_id: Option<uuid::Uuid>,
    active: bool,
}

#[derive(Debug, FromRow)]
pub(crate) struct DelegationRow {
    id: uuid::Uuid,
    organization_id: uuid::Uuid,
    delegator_id: uuid::Uuid,
    delegatee_id: uuid::Uuid,
    role_id: Option<uuid::Uuid>,
    permissions: Json<Vec<StoredPermission>>,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    active: bool,
    revoked_at: Option<DateTime<Utc>>,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct ResourcePermissionRow {
    id: uuid::Uuid,
    organization_id: uuid::Uuid,
    user_id: uuid::Uuid,
    resource_type: String,
    permission_resource_type: String,
    permission_action: String,
    resource_id: String,
    granted: bool,
    expires_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    granted_by: Option<uuid::Uuid>,
    created_at: DateTime<Utc>,
}

pub(crate) const MEMBERSHIP_COLUMNS: &str =
    "organization_id, user_id, legacy_role, role_id, active";

pub(crate) const DELEGATION_COLUMNS: &str = "id, organization_id, delegator_id, delegatee_id, \
     role_id, permissions, starts_at, ends_at, active, revoked_at, reason, created_at";

pub(crate) const RESOURCE_PERMISSION_COLUMNS: &str = "id, organization_id, user_id, \
     resource_type, permission_resource_type, permission_action, resource_id, granted, \
     expires_at, revoked_at, granted_by, created_at";

/// Loads roles of an organization with their grants, optionally narrowed to one id.
pub(crate) async fn fetch_roles(
    pool: &PgPool,
    organization_id: OrganizationId,
    role_id: Option<RoleId>,
) -> AppResult<Vec<Role>> {
    let rows = sqlx::query_as::<_, RoleRow>(
        r#"
        SELECT id, organization_id, key, name, priority, is_system, is_editable
        FROM roles
        WHERE organization_id = $1
            AND ($2::UUID IS NULL OR id = $2)
        ORDER BY priority DESC, key
        "#,
    )
    .bind(organization_id.as_uuid())
    .bind(role_id.map(|role_id| role_id.as_uuid()))
    .fetch_all(pool)
    .await
    .map_err(|error| AppError::Internal(format!("failed to load roles: {error}")))?;

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let role_ids = rows.iter().map(|row| row.id).collect::<Vec<_>>();
    let grant_rows = sqlx::query_as::<_, RoleGrantRow>(
        r#"
        SELECT role_id, resource_type, action, conditions, scope
        FROM role_permissions
        WHERE role_id = ANY($1)
        ORDER BY created_at, resource_type, action
        "#,
    )
    .bind(role_ids)
    .fetch_all(pool)
    .await
    .map_err(|error| AppError::Internal(format!("failed to load role permissions: {error}")))?;

    let mut grants_by_role: HashMap<uuid::Uuid, Vec<RoleGrant>> = HashMap::new();
    for row in grant_rows {
        grants_by_role.entry(row.role_id).or_default().push(RoleGrant {
            permission: StoredPermission::new(row.resource_type, row.action),
            conditions: row.conditions.0,
            scope: row.scope.0,
        });
    }

    rows.into_iter()
        .map(|row| {
            let grants = grants_by_role.remove(&row.id).unwrap_or_default();
            decode_role(row, grants)
        })
        .collect()
}

/// Loads one role with its grants.
pub(crate) async fn fetch_role(
    pool: &PgPool,
    organization_id: OrganizationId,
    role_id: RoleId,
) -> AppResult<Option<Role>> {
    Ok(fetch_roles(pool, organization_id, Some(role_id))
        .await?
        .into_iter()
        .next())
}

/// Loads a membership row.
pub(crate) async fn fetch_membership(
    pool: &PgPool,
    organization_id: OrganizationId,
    user_id: UserId,
) -> AppResult<Option<Membership>> {
    let row = sqlx::query_as::<_, MembershipRow>(&format!(
        "SELECT {MEMBERSHIP_COLUMNS} FROM memberships \
         WHERE organization_id = $1 AND user_id = $2"
    ))
    .bind(organization_id.as_uuid())
    .bind(user_id.as_uuid())
    .fetch_optional(pool)
    .await
    .map_err(|error| AppError::Internal(format!("failed to load membership: {error}")))?;

    row.map(decode_membership).transpose()
}

fn decode_role(row: RoleRow, grants: Vec<RoleGrant>) -> AppResult<Role> {
    let key = RoleKey::new(row.key.as_str()).map_err(|error| {
        AppError::Internal(format!("invalid stored role key '{}': {error}", row.key))
    })?;
    let name = NonEmptyString::new(row.name).map_err(|error| {
        AppError::Internal(format!("invalid stored name of role '{key}': {error}"))
    })?;
    let priority = RolePriority::new(i64::from(row.priority)).map_err(|error| {
        AppError::Internal(format!("invalid stored priority of role '{key}': {error}"))
    })?;

    Ok(Role {
        id: RoleId::from_uuid(row.id),
        organization_id: OrganizationId::from_uuid(row.organization_id),
        key,
        name,
        priority,
        is_system: row.is_system,
        is_editable: row.is_editable,
        grants,
    })
}

pub(crate) fn decode_membership(row: MembershipRow) -> AppResult<Membership> {
    let role = match (row.legacy_role, row.role_id) {
        (_, Some(role_id)) => MembershipRole::Dynamic(RoleId::from_uuid(role_id)),
        (Some(legacy_role), None) => {
            MembershipRole::Legacy(LegacyRole::from_str(legacy_role.as_str()).map_err(
                |error| {
                    AppError::Internal(format!(
                        "invalid stored legacy role '{legacy_role}': {error}"
                    ))
                },
            )?)
        }
        (None, None) => {
            return Err(AppError::Internal(format!(
                "membership of '{}' in organization '{}' has no role",
                row.user_id, row.organization_id
            )));
        }
    };

    Ok(Membership {
        user_id: UserId::from_uuid(row.user_id),
        organization_id: OrganizationId::from_uuid(row.organization_id),
        active: row.active,
        role,
    })
}

pub(crate) fn decode_delegation(row: DelegationRow) -> PermissionDelegation {
    PermissionDelegation {
        id: DelegationId::from_uuid(row.id),
        organization_id: OrganizationId::from_uuid(row.organization_id),
        delegator_id: UserId::from_uuid(row.delegator_id),
        delegatee_id: UserId::from_uuid(row.delegatee_id),
        role_id: row.role_id.map(RoleId::from_uuid),
        permissions: row.permissions.0,
        starts_at: row.starts_at,
        ends_at: row.ends_at,
        active: row.active,
        revoked_at: row.revoked_at,
        reason: row.reason,
        created_at: row.created_at,
    }
}

pub(crate) fn decode_resource_permission(row: ResourcePermissionRow) -> ResourcePermission {
    ResourcePermission {
        id: ResourcePermissionId::from_uuid(row.id),
        organization_id: OrganizationId::from_uuid(row.organization_id),
        user_id: UserId::from_uuid(row.user_id),
        permission: StoredPermission::new(row.permission_resource_type, row.permission_action),
        resource_type: row.resource_type,
        resource_id: row.resource_id,
        granted: row.granted,
        expires_at: row.expires_at,
        revoked_at: row.revoked_at,
        granted_by: row.granted_by.map(UserId::from_uuid),
        created_at: row.created_at,
    }
}
