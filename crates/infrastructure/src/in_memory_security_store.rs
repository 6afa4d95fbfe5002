use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tasklane_application::{AuthorizationRepository, SecurityAdminRepository};
use tasklane_core::{AppError, AppResult, OrganizationId, UserId};
use tasklane_domain::{
    DelegationId, Membership, MembershipRole, Permission, PermissionDelegation,
    ResourcePermission, ResourcePermissionId, Role, RoleGrant, RoleId, RoleKey,
};
use tokio::sync::RwLock;

/// In-memory store backing both the resolution and administration ports.
///
/// Memberships and teams have no administration port; they are seeded through
/// [`InMemorySecurityStore::upsert_membership`] and
/// [`InMemorySecurityStore::add_team_member`].
#[derive(Debug, Default)]
pub struct InMemorySecurityStore {
    memberships: RwLock<HashMap<(OrganizationId, UserId), Membership>>,
    roles: RwLock<HashMap<RoleId, Role>>,
    teams: RwLock<HashMap<(OrganizationId, UserId), BTreeSet<String>>>,
    delegations: RwLock<Vec<PermissionDelegation>>,
    resource_permissions: RwLock<Vec<ResourcePermission>>,
}

impl InMemorySecurityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a membership.
    pub async fn upsert_membership(&self, membership: Membership) {
        self.memberships.write().await.insert(
            (membership.organization_id, membership.user_id),
            membership,
        );
    }

    /// Adds a user to a team of the organization.
    pub async fn add_team_member(
        &self,
        organization_id: OrganizationId,
        team_id: impl Into<String>,
        user_id: UserId,
    ) {
        self.teams
            .write()
            .await
            .entry((organization_id, user_id))
            .or_default()
            .insert(team_id.into());
    }

    async fn role_in(&self, organization_id: OrganizationId, role_id: RoleId) -> Option<Role> {
        self.roles
            .read()
            .await
            .get(&role_id)
            .filter(|role| role.organization_id == organization_id)
            .cloned()
    }

    async fn membership(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Option<Membership> {
        self.memberships
            .read()
            .await
            .get(&(organization_id, user_id))
            .cloned()
    }
}

#[async_trait]
impl AuthorizationRepository for InMemorySecurityStore {
    async fn find_membership(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<Option<Membership>> {
        Ok(self.membership(organization_id, user_id).await)
    }

    async fn find_role(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> AppResult<Option<Role>> {
        Ok(self.role_in(organization_id, role_id).await)
    }

    async fn list_team_ids(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<BTreeSet<String>> {
        Ok(self
            .teams
            .read()
            .await
            .get(&(organization_id, user_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_delegations_for_delegatee(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<Vec<PermissionDelegation>> {
        Ok(self
            .delegations
            .read()
            .await
            .iter()
            .filter(|delegation| {
                delegation.organization_id == organization_id
                    && delegation.delegatee_id == user_id
                    && delegation.active
            })
            .cloned()
            .collect())
    }

    async fn list_resource_permissions_for_user(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<Vec<ResourcePermission>> {
        Ok(self
            .resource_permissions
            .read()
            .await
            .iter()
            .filter(|grant| {
                grant.organization_id == organization_id
                    && grant.user_id == user_id
                    && grant.revoked_at.is_none()
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SecurityAdminRepository for InMemorySecurityStore {
    async fn list_roles(&self, organization_id: OrganizationId) -> AppResult<Vec<Role>> {
        let mut roles: Vec<Role> = self
            .roles
            .read()
            .await
            .values()
            .filter(|role| role.organization_id == organization_id)
            .cloned()
            .collect();
        roles.sort_by(|left, right| {
            right
                .priority
                .cmp(&left.priority)
                .then_with(|| left.key.as_str().cmp(right.key.as_str()))
        });

        Ok(roles)
    }

    async fn find_role(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> AppResult<Option<Role>> {
        Ok(self.role_in(organization_id, role_id).await)
    }

    async fn find_role_by_key(
        &self,
        organization_id: OrganizationId,
        key: &RoleKey,
    ) -> AppResult<Option<Role>> {
        Ok(self
            .roles
            .read()
            .await
            .values()
            .find(|role| role.organization_id == organization_id && &role.key == key)
            .cloned())
    }

    async fn create_role(&self, role: &Role) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        if roles.values().any(|existing| {
            existing.organization_id == role.organization_id && existing.key == role.key
        }) {
            return Err(AppError::Conflict(format!(
                "role key '{}' is already taken",
                role.key
            )));
        }

        roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn update_role(&self, role: &Role) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        let stored = roles
            .get_mut(&role.id)
            .filter(|stored| stored.organization_id == role.organization_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{}' not found", role.id)))?;
        stored.name = role.name.clone();
        stored.priority = role.priority;

        Ok(())
    }

    async fn delete_role(&self, organization_id: OrganizationId, role_id: RoleId) -> AppResult<()> {
        if self.count_role_memberships(organization_id, role_id).await? > 0
            || self.count_role_delegations(organization_id, role_id).await? > 0
        {
            return Err(AppError::Conflict(format!(
                "role '{role_id}' is still referenced by memberships or delegations"
            )));
        }

        let mut roles = self.roles.write().await;
        match roles.get(&role_id) {
            Some(role) if role.organization_id == organization_id => {
                roles.remove(&role_id);
                Ok(())
            }
            _ => Err(AppError::NotFound(format!("role '{role_id}' not found"))),
        }
    }

    async fn count_role_memberships(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> AppResult<u64> {
        let count = self
            .memberships
            .read()
            .await
            .values()
            .filter(|membership| {
                membership.organization_id == organization_id
                    && membership.role_id() == Some(role_id)
            })
            .count();

        Ok(count as u64)
    }

    async fn count_role_delegations(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> AppResult<u64> {
        let count = self
            .delegations
            .read()
            .await
            .iter()
            .filter(|delegation| {
                delegation.organization_id == organization_id
                    && delegation.role_id == Some(role_id)
            })
            .count();

        Ok(count as u64)
    }

    async fn add_role_grant(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
        grant: &RoleGrant,
    ) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        let role = roles
            .get_mut(&role_id)
            .filter(|role| role.organization_id == organization_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' not found")))?;
        if role
            .grants
            .iter()
            .any(|existing| existing.permission == grant.permission)
        {
            return Err(AppError::Conflict(format!(
                "role '{role_id}' already grants '{}:{}'",
                grant.permission.resource_type, grant.permission.action
            )));
        }

        role.grants.push(grant.clone());
        Ok(())
    }

    async fn remove_role_grant(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
        permission: Permission,
    ) -> AppResult<()> {
        let mut roles = self.roles.write().await;
        let role = roles
            .get_mut(&role_id)
            .filter(|role| role.organization_id == organization_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' not found")))?;
        let before = role.grants.len();
        role.grants
            .retain(|grant| grant.permission.resolve() != Some(permission));
        if role.grants.len() == before {
            return Err(AppError::NotFound(format!(
                "role '{role_id}' does not grant '{permission}'"
            )));
        }

        Ok(())
    }

    async fn find_membership(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<Option<Membership>> {
        Ok(self.membership(organization_id, user_id).await)
    }

    async fn set_membership_role(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role: MembershipRole,
    ) -> AppResult<Membership> {
        let mut memberships = self.memberships.write().await;
        let membership = memberships
            .get_mut(&(organization_id, user_id))
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "user '{user_id}' is not a member of organization '{organization_id}'"
                ))
            })?;
        membership.role = role;

        Ok(membership.clone())
    }

    async fn create_delegation(&self, delegation: &PermissionDelegation) -> AppResult<()> {
        let mut delegations = self.delegations.write().await;
        if delegations.iter().any(|stored| stored.id == delegation.id) {
            return Err(AppError::Conflict(format!(
                "delegation '{}' already exists",
                delegation.id
            )));
        }

        delegations.push(delegation.clone());
        Ok(())
    }

    async fn find_delegation(
        &self,
        organization_id: OrganizationId,
        delegation_id: DelegationId,
    ) -> AppResult<Option<PermissionDelegation>> {
        Ok(self
            .delegations
            .read()
            .await
            .iter()
            .find(|delegation| {
                delegation.organization_id == organization_id && delegation.id == delegation_id
            })
            .cloned())
    }

    async fn save_delegation(&self, delegation: &PermissionDelegation) -> AppResult<()> {
        let mut delegations = self.delegations.write().await;
        let stored = delegations
            .iter_mut()
            .find(|stored| {
                stored.id == delegation.id && stored.organization_id == delegation.organization_id
            })
            .ok_or_else(|| {
                AppError::NotFound(format!("delegation '{}' not found", delegation.id))
            })?;
        *stored = delegation.clone();

        Ok(())
    }

    async fn list_delegations(
        &self,
        organization_id: OrganizationId,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<PermissionDelegation>> {
        Ok(self
            .delegations
            .read()
            .await
            .iter()
            .filter(|delegation| {
                delegation.organization_id == organization_id
                    && user_id.is_none_or(|user_id| {
                        delegation.delegator_id == user_id || delegation.delegatee_id == user_id
                    })
            })
            .cloned()
            .collect())
    }

    async fn create_resource_permission(&self, grant: &ResourcePermission) -> AppResult<()> {
        let mut grants = self.resource_permissions.write().await;
        if grants.iter().any(|stored| stored.id == grant.id) {
            return Err(AppError::Conflict(format!(
                "resource permission '{}' already exists",
                grant.id
            )));
        }

        grants.push(grant.clone());
        Ok(())
    }

    async fn find_resource_permission(
        &self,
        organization_id: OrganizationId,
        resource_permission_id: ResourcePermissionId,
    ) -> AppResult<Option<ResourcePermission>> {
        Ok(self
            .resource_permissions
            .read()
            .await
            .iter()
            .find(|grant| {
                grant.organization_id == organization_id && grant.id == resource_permission_id
            })
            .cloned())
    }

    async fn save_resource_permission(&self, grant: &ResourcePermission) -> AppResult<()> {
        let mut grants = self.resource_permissions.write().await;
        let stored = grants
            .iter_mut()
            .find(|stored| stored.id == grant.id && stored.organization_id == grant.organization_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("resource permission '{}' not found", grant.id))
            })?;
        *stored = grant.clone();

        Ok(())
    }

    async fn list_resource_permissions(
        &self,
        organization_id: OrganizationId,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<ResourcePermission>> {
        Ok(self
            .resource_permissions
            .read()
            .await
            .iter()
            .filter(|grant| {
                grant.organization_id == organization_id
                    && user_id.is_none_or(|user_id| grant.user_id == user_id)
            })
            .cloned()
            .collect())
    }
}
