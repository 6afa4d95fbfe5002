use chrono::{DateTime, Utc};
use tasklane_application::{
    AddRolePermissionInput, CreateDelegationInput, CreateRoleInput, DuplicateRoleInput,
    GrantResourcePermissionInput, UpdateRoleInput,
};
use tasklane_core::AppError;
use tasklane_domain::{
    Membership, MembershipRole, Permission, PermissionDelegation, ResourcePermission, Role,
    RoleGrant, StoredPermission,
};

use super::types::{
    CreateDelegationRequest, CreateRoleRequest, DelegationResponse, DuplicateRoleRequest,
    GrantResourcePermissionRequest, MembershipResponse, ResourcePermissionResponse,
    RoleGrantRequest, RoleGrantResponse, RoleResponse, UpdateRoleRequest,
};

fn stored_key(permission: &StoredPermission) -> String {
    format!("{}.{}", permission.resource_type, permission.action)
}

impl TryFrom<RoleGrantRequest> for AddRolePermissionInput {
    type Error = AppError;

    fn try_from(value: RoleGrantRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            permission: Permission::from_transport(value.permission.trim())?,
            conditions: value.conditions,
            scope: value.scope,
        })
    }
}

impl TryFrom<CreateRoleRequest> for CreateRoleInput {
    type Error = AppError;

    fn try_from(value: CreateRoleRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            key: value.key,
            name: value.name,
            priority: value.priority,
            grants: value
                .grants
                .into_iter()
                .map(AddRolePermissionInput::try_from)
                .collect::<Result<Vec<_>, _>>()?,
        })
    }
}

impl From<DuplicateRoleRequest> for DuplicateRoleInput {
    fn from(value: DuplicateRoleRequest) -> Self {
        Self {
            key: value.key,
            name: value.name,
        }
    }
}

impl From<UpdateRoleRequest> for UpdateRoleInput {
    fn from(value: UpdateRoleRequest) -> Self {
        Self {
            name: value.name,
            priority: value.priority,
        }
    }
}

impl TryFrom<CreateDelegationRequest> for CreateDelegationInput {
    type Error = AppError;

    fn try_from(value: CreateDelegationRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            delegatee_id: value.delegatee_id,
            role_id: value.role_id,
            permissions: value
                .permissions
                .iter()
                .map(|permission| Permission::from_transport(permission.trim()))
                .collect::<Result<Vec<_>, _>>()?,
            starts_at: value.starts_at,
            ends_at: value.ends_at,
            reason: value.reason,
        })
    }
}

impl TryFrom<GrantResourcePermissionRequest> for GrantResourcePermissionInput {
    type Error = AppError;

    fn try_from(value: GrantResourcePermissionRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: value.user_id,
            permission: Permission::from_transport(value.permission.trim())?,
            resource_id: value.resource_id,
            granted: value.granted,
            expires_at: value.expires_at,
        })
    }
}

impl From<RoleGrant> for RoleGrantResponse {
    fn from(value: RoleGrant) -> Self {
        Self {
            permission: stored_key(&value.permission),
            conditions: value.conditions,
            scope: value.scope,
        }
    }
}

impl From<Role> for RoleResponse {
    fn from(value: Role) -> Self {
        Self {
            id: value.id,
            key: value.key.as_str().to_owned(),
            name: value.name.as_str().to_owned(),
            priority: value.priority.value(),
            is_system: value.is_system,
            is_editable: value.is_editable,
            grants: value
                .grants
                .into_iter()
                .map(RoleGrantResponse::from)
                .collect(),
        }
    }
}

impl From<Membership> for MembershipResponse {
    fn from(value: Membership) -> Self {
        let (legacy_role, role_id) = match value.role {
            MembershipRole::Legacy(legacy_role) => (Some(legacy_role.as_str().to_owned()), None),
            MembershipRole::Dynamic(role_id) => (None, Some(role_id)),
        };

        Self {
            user_id: value.user_id,
            organization_id: value.organization_id,
            active: value.active,
            legacy_role,
            role_id,
        }
    }
}

impl DelegationResponse {
    /// Renders a delegation with its lifecycle state at `now`.
    pub fn at(value: PermissionDelegation, now: DateTime<Utc>) -> Self {
        Self {
            status: value.status_at(now),
            id: value.id,
            delegator_id: value.delegator_id,
            delegatee_id: value.delegatee_id,
            role_id: value.role_id,
            permissions: value.permissions.iter().map(stored_key).collect(),
            starts_at: value.starts_at,
            ends_at: value.ends_at,
            reason: value.reason,
            revoked_at: value.revoked_at,
            created_at: value.created_at,
        }
    }
}

impl ResourcePermissionResponse {
    /// Renders an override with its lifecycle state at `now`.
    pub fn at(value: ResourcePermission, now: DateTime<Utc>) -> Self {
        Self {
            status: value.status_at(now),
            id: value.id,
            user_id: value.user_id,
            permission: stored_key(&value.permission),
            resource_type: value.resource_type,
            resource_id: value.resource_id,
            granted: value.granted,
            expires_at: value.expires_at,
            revoked_at: value.revoked_at,
            granted_by: value.granted_by,
            created_at: value.created_at,
        }
    }
}
