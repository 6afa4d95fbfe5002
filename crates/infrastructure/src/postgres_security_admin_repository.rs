use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;

use tasklane_application::SecurityAdminRepository;
use tasklane_core::{AppError, AppResult, OrganizationId, UserId};
use tasklane_domain::{
    DelegationId, Membership, MembershipRole, Permission, PermissionDelegation,
    ResourcePermission, ResourcePermissionId, Role, RoleGrant, RoleId, RoleKey,
};

use crate::postgres_security_rows::{
    DELEGATION_COLUMNS, DelegationRow, MEMBERSHIP_COLUMNS, MembershipRow,
    RESOURCE_PERMISSION_COLUMNS, ResourcePermissionRow, decode_delegation, decode_membership,
    decode_resource_permission, fetch_membership, fetch_role, fetch_roles,
};

mod delegations;
mod resource_permissions;
mod roles;

/// PostgreSQL-backed repository for role, delegation and override administration.
#[derive(Clone)]
pub struct PostgresSecurityAdminRepository {
    pool: PgPool,
}

impl PostgresSecurityAdminRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecurityAdminRepository for PostgresSecurityAdminRepository {
    async fn list_roles(&self, organization_id: OrganizationId) -> AppResult<Vec<Role>> {
        fetch_roles(&self.pool, organization_id, None).await
    }

    async fn find_role(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> AppResult<Option<Role>> {
        fetch_role(&self.pool, organization_id, role_id).await
    }

    async fn find_role_by_key(
        &self,
        organization_id: OrganizationId,
        key: &RoleKey,
    ) -> AppResult<Option<Role>> {
        self.find_role_by_key_impl(organization_id, key).await
    }

    async fn create_role(&self, role: &Role) -> AppResult<()> {
        self.create_role_impl(role).await
    }

    async fn update_role(&self, role: &Role) -> AppResult<()> {
        self.update_role_impl(role).await
    }

    async fn delete_role(&self, organization_id: OrganizationId, role_id: RoleId) -> AppResult<()> {
        self.delete_role_impl(organization_id, role_id).await
    }

    async fn count_role_memberships(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> AppResult<u64> {
        self.count_role_memberships_impl(organization_id, role_id)
            .await
    }

    async fn count_role_delegations(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> AppResult<u64> {
        self.count_role_delegations_impl(organization_id, role_id)
            .await
    }

    async fn add_role_grant(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
        grant: &RoleGrant,
    ) -> AppResult<()> {
        self.add_role_grant_impl(organization_id, role_id, grant)
            .await
    }

    async fn remove_role_grant(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
        permission: Permission,
    ) -> AppResult<()> {
        self.remove_role_grant_impl(organization_id, role_id, permission)
            .await
    }

    async fn find_membership(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<Option<Membership>> {
        fetch_membership(&self.pool, organization_id, user_id).await
    }

    async fn set_membership_role(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role: MembershipRole,
    ) -> AppResult<Membership> {
        self.set_membership_role_impl(organization_id, user_id, role)
            .await
    }

    async fn create_delegation(&self, delegation: &PermissionDelegation) -> AppResult<()> {
        self.create_delegation_impl(delegation).await
    }

    async fn find_delegation(
        &self,
        organization_id: OrganizationId,
        delegation_id: DelegationId,
    ) -> AppResult<Option<PermissionDelegation>> {
        self.find_delegation_impl(organization_id, delegation_id)
            .await
    }

    async fn save_delegation(&self, delegation: &PermissionDelegation) -> AppResult<()> {
        self.save_delegation_impl(delegation).await
    }

    async fn list_delegations(
        &self,
        organization_id: OrganizationId,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<PermissionDelegation>> {
        self.list_delegations_impl(organization_id, user_id).await
    }

    async fn create_resource_permission(&self, grant: &ResourcePermission) -> AppResult<()> {
        self.create_resource_permission_impl(grant).await
    }

    async fn find_resource_permission(
        &self,
        organization_id: OrganizationId,
        resource_permission_id: ResourcePermissionId,
    ) -> AppResult<Option<ResourcePermission>> {
        self.find_resource_permission_impl(organization_id, resource_permission_id)
            .await
    }

    async fn save_resource_permission(&self, grant: &ResourcePermission) -> AppResult<()> {
        self.save_resource_permission_impl(grant).await
    }

    async fn list_resource_permissions(
        &self,
        organization_id: OrganizationId,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<ResourcePermission>> {
        self.list_resource_permissions_impl(organization_id, user_id)
            .await
    }
}

fn map_unique_conflict(
    error: sqlx::Error,
    conflict: impl FnOnce() -> String,
    context: &str,
) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(conflict());
    }

    AppError::Internal(format!("failed to {context}: {error}"))
}
