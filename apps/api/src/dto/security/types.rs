use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tasklane_core::{OrganizationId, UserId};
use tasklane_domain::{
    DelegationId, DelegationStatus, GrantConditions, GrantScope, ResourcePermissionId,
    ResourcePermissionStatus, RoleId,
};

/// Grant attached to a role; `permission` uses the `resource_type.action` form.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleGrantRequest {
    pub permission: String,
    #[serde(default)]
    pub conditions: GrantConditions,
    #[serde(default)]
    pub scope: GrantScope,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoleRequest {
    pub key: String,
    pub name: String,
    pub priority: i64,
    #[serde(default)]
    pub grants: Vec<RoleGrantRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuplicateRoleRequest {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRoleRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignRoleRequest {
    pub role_id: RoleId,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleGrantResponse {
    pub permission: String,
    pub conditions: GrantConditions,
    pub scope: GrantScope,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleResponse {
    pub id: RoleId,
    pub key: String,
    pub name: String,
    pub priority: u16,
    pub is_system: bool,
    pub is_editable: bool,
    pub grants: Vec<RoleGrantResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MembershipResponse {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    pub active: bool,
    pub legacy_role: Option<String>,
    pub role_id: Option<RoleId>,
}

/// Delegation of either one role or a list of permissions.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDelegationRequest {
    pub delegatee_id: UserId,
    #[serde(default)]
    pub role_id: Option<RoleId>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtendDelegationRequest {
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DelegationListParams {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DelegationResponse {
    pub id: DelegationId,
    pub delegator_id: UserId,
    pub delegatee_id: UserId,
    pub role_id: Option<RoleId>,
    pub permissions: Vec<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: DelegationStatus,
    pub reason: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrantResourcePermissionRequest {
    pub user_id: UserId,
    pub permission: String,
    pub resource_id: String,
    /// `false` records an explicit denial.
    #[serde(default = "granted_by_default")]
    pub granted: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn granted_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtendResourcePermissionRequest {
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ResourcePermissionListParams {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourcePermissionResponse {
    pub id: ResourcePermissionId,
    pub user_id: UserId,
    pub permission: String,
    pub resource_type: String,
    pub resource_id: String,
    pub granted: bool,
    pub status: ResourcePermissionStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub granted_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}
