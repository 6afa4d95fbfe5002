use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by administrative use-cases.
///
/// Authorization decisions are recorded under the checked action name
/// instead (`update`, `destroy`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a custom role is created.
    RoleCreated,
    /// Emitted when a role is copied into a new custom role.
    RoleDuplicated,
    /// Emitted when a role is renamed or reprioritized.
    RoleUpdated,
    /// Emitted when a custom role is deleted.
    RoleDeleted,
    /// Emitted when a membership switches role.
    RoleAssigned,
    /// Emitted when a grant is attached to a role.
    RolePermissionAdded,
    /// Emitted when a grant is removed from a role.
    RolePermissionRemoved,
    /// Emitted when a delegation is created.
    DelegationCreated,
    /// Emitted when a delegation is revoked.
    DelegationRevoked,
    /// Emitted when a delegation end is pushed later.
    DelegationExtended,
    /// Emitted when a resource override is granted.
    ResourcePermissionGranted,
    /// Emitted when a resource override is revoked.
    ResourcePermissionRevoked,
    /// Emitted when a resource override expiry is pushed later.
    ResourcePermissionExtended,
    /// Emitted when old audit entries are purged.
    AuditEntriesPurged,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleCreated => "security.role.created",
            Self::RoleDuplicated => "security.role.duplicated",
            Self::RoleUpdated => "security.role.updated",
            Self::RoleDeleted => "security.role.deleted",
            Self::RoleAssigned => "security.role.assigned",
            Self::RolePermissionAdded => "security.role_permission.added",
            Self::RolePermissionRemoved => "security.role_permission.removed",
            Self::DelegationCreated => "security.delegation.created",
            Self::DelegationRevoked => "security.delegation.revoked",
            Self::DelegationExtended => "security.delegation.extended",
            Self::ResourcePermissionGranted => "security.resource_permission.granted",
            Self::ResourcePermissionRevoked => "security.resource_permission.revoked",
            Self::ResourcePermissionExtended => "security.resource_permission.extended",
            Self::AuditEntriesPurged => "security.audit.purged",
        }
    }
}
