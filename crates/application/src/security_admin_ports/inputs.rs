use chrono::{DateTime, Utc};
use tasklane_core::UserId;
use tasklane_domain::{GrantConditions, GrantScope, Permission, RoleId};

/// Input payload for creating custom roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Unique role key in organization scope.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Requested priority.
    pub priority: i64,
    /// Grants to attach to the role.
    pub grants: Vec<AddRolePermissionInput>,
}

/// Input payload for copying a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateRoleInput {
    /// Key of the copy.
    pub key: String,
    /// Display name of the copy.
    pub name: String,
}

/// Input payload for changing a custom role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRoleInput {
    /// New display name.
    pub name: Option<String>,
    /// New priority.
    pub priority: Option<i64>,
}

/// Input payload for attaching one grant to a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRolePermissionInput {
    /// Granted catalog permission.
    pub permission: Permission,
    /// Per-grant predicates.
    pub conditions: GrantConditions,
    /// Id allow-lists.
    pub scope: GrantScope,
}

/// Input payload for creating a delegation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDelegationInput {
    /// Receiving user.
    pub delegatee_id: UserId,
    /// Delegated role; exclusive with `permissions`.
    pub role_id: Option<RoleId>,
    /// Delegated permissions; exclusive with `role_id`.
    pub permissions: Vec<Permission>,
    /// Window start.
    pub starts_at: DateTime<Utc>,
    /// Window end.
    pub ends_at: DateTime<Utc>,
    /// Optional justification.
    pub reason: Option<String>,
}

/// Filters for delegation listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelegationQuery {
    /// Only delegations where the user is delegator or delegatee.
    pub user_id: Option<UserId>,
    /// Only delegations active at listing time.
    pub active_only: bool,
}

/// Input payload for granting or denying one action on one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantResourcePermissionInput {
    /// Receiving user.
    pub user_id: UserId,
    /// Action and resource type.
    pub permission: Permission,
    /// Target instance identifier.
    pub resource_id: String,
    /// `true` grants, `false` denies.
    pub granted: bool,
    /// Optional expiry; falls back to the deployment default.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Filters for resource override listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourcePermissionQuery {
    /// Only overrides issued to this user.
    pub user_id: Option<UserId>,
    /// Only overrides active at listing time.
    pub active_only: bool,
}
