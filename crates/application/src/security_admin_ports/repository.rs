use async_trait::async_trait;
use tasklane_core::{AppResult, OrganizationId, UserId};
use tasklane_domain::{
    DelegationId, Membership, MembershipRole, Permission, PermissionDelegation,
    ResourcePermission, ResourcePermissionId, Role, RoleGrant, RoleId, RoleKey,
};

/// Repository port for role, delegation and override administration.
#[async_trait]
pub trait SecurityAdminRepository: Send + Sync {
    /// Lists organization roles with their grants.
    async fn list_roles(&self, organization_id: OrganizationId) -> AppResult<Vec<Role>>;

    /// Finds a role with its grants.
    async fn find_role(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> AppResult<Option<Role>>;

    /// Finds a role by key.
    async fn find_role_by_key(
        &self,
        organization_id: OrganizationId,
        key: &RoleKey,
    ) -> AppResult<Option<Role>>;

    /// Persists a new role with its grants; fails with conflict on a taken key.
    async fn create_role(&self, role: &Role) -> AppResult<()>;

    /// Persists name and priority changes.
    async fn update_role(&self, role: &Role) -> AppResult<()>;

    /// Deletes a role and its grants.
    async fn delete_role(&self, organization_id: OrganizationId, role_id: RoleId)
    -> AppResult<()>;

    /// Counts memberships referencing a role.
    async fn count_role_memberships(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> AppResult<u64>;

    /// Counts delegations referencing a role, revoked and expired ones included.
    async fn count_role_delegations(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> AppResult<u64>;

    /// Attaches a grant; fails with conflict when the permission is already granted.
    async fn add_role_grant(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
        grant: &RoleGrant,
    ) -> AppResult<()>;

    /// Removes the grant of one permission; fails with not found when absent.
    async fn remove_role_grant(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
        permission: Permission,
    ) -> AppResult<()>;

    /// Finds a membership regardless of its active flag.
    async fn find_membership(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<Option<Membership>>;

    /// Switches the role of an existing membership.
    async fn set_membership_role(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role: MembershipRole,
    ) -> AppResult<Membership>;

    /// Persists a new delegation.
    async fn create_delegation(&self, delegation: &PermissionDelegation) -> AppResult<()>;

    /// Finds a delegation.
    async fn find_delegation(
        &self,
        organization_id: OrganizationId,
        delegation_id: DelegationId,
    ) -> AppResult<Option<PermissionDelegation>>;

    /// Persists lifecycle changes of a delegation.
    async fn save_delegation(&self, delegation: &PermissionDelegation) -> AppResult<()>;

    /// Lists delegations, optionally those involving one user.
    async fn list_delegations(
        &self,
        organization_id: OrganizationId,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<PermissionDelegation>>;

    /// Persists a new resource override.
    async fn create_resource_permission(&self, grant: &ResourcePermission) -> AppResult<()>;

    /// Finds a resource override.
    async fn find_resource_permission(
        &self,
        organization_id: OrganizationId,
        resource_permission_id: ResourcePermissionId,
    ) -> AppResult<Option<ResourcePermission>>;

    /// Persists lifecycle changes of a resource override.
    async fn save_resource_permission(&self, grant: &ResourcePermission) -> AppResult<()>;

    /// Lists resource overrides, optionally those issued to one user.
    async fn list_resource_permissions(
        &self,
        organization_id: OrganizationId,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<ResourcePermission>>;
}
