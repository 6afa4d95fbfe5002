use std::collections::BTreeSet;

use async_trait::async_trait;
use tasklane_core::{AppResult, OrganizationId, UserId};
use tasklane_domain::{Membership, PermissionDelegation, ResourcePermission, Role, RoleId, RuleSet};

/// Repository port for the state an ability resolution reads.
#[async_trait]
pub trait AuthorizationRepository: Send + Sync {
    /// Finds the actor's membership in the organization.
    async fn find_membership(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<Option<Membership>>;

    /// Finds a role with its grants.
    async fn find_role(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> AppResult<Option<Role>>;

    /// Lists the teams the actor belongs to.
    async fn list_team_ids(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<BTreeSet<String>>;

    /// Lists unrevoked delegations naming the actor as delegatee.
    async fn list_delegations_for_delegatee(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<Vec<PermissionDelegation>>;

    /// Lists unrevoked resource overrides issued to the actor.
    async fn list_resource_permissions_for_user(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<Vec<ResourcePermission>>;
}

/// Optional cache port for resolved rule sets.
///
/// Implementations must make every entry of an actor unreachable after
/// [`CapabilityCache::invalidate_actor`], and every entry of an organization
/// after [`CapabilityCache::invalidate_organization`].
#[async_trait]
pub trait CapabilityCache: Send + Sync {
    /// Returns the cached rule set for one actor.
    async fn get_rule_set(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<Option<RuleSet>>;

    /// Stores a rule set for one actor with ttl.
    async fn set_rule_set(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        rule_set: &RuleSet,
        ttl_seconds: u32,
    ) -> AppResult<()>;

    /// Drops cached state of one actor.
    async fn invalidate_actor(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<()>;

    /// Drops cached state of every actor in the organization.
    async fn invalidate_organization(&self, organization_id: OrganizationId) -> AppResult<()>;
}
