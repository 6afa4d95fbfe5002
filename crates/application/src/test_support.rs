use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tasklane_core::{AppError, AppResult, OrganizationId, UserId};
use tasklane_domain::{
    DelegationId, Membership, MembershipRole, Permission, PermissionDelegation,
    ResourcePermission, ResourcePermissionId, Role, RoleGrant, RoleId, RoleKey, RuleSet,
};
use tokio::sync::Mutex;

use crate::{
    AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditSummary, AuditWindow,
    AuthorizationRepository, CapabilityCache, Clock, SecurityAdminRepository,
};

pub(crate) struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub(crate) fn at(now: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(now.timestamp_millis()),
        }
    }

    pub(crate) fn advance(&self, duration: Duration) {
        self.millis
            .fetch_add(duration.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::at(
            Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0)
                .single()
                .unwrap_or_default(),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

#[derive(Default)]
pub(crate) struct InMemoryAuditLog {
    pub(crate) entries: Mutex<Vec<AuditLogEntry>>,
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditLog {
    async fn append_entry(&self, entry: AuditLogEntry) -> AppResult<()> {
        self.entries.lock().await.push(entry);
        Ok(())
    }

    async fn list_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .rev()
            .filter(|entry| query.matches(entry))
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn summarize(
        &self,
        organization_id: Option<OrganizationId>,
        window: AuditWindow,
    ) -> AppResult<AuditSummary> {
        let entries = self.entries.lock().await;
        Ok(AuditSummary::from_entries(entries.iter().filter(|entry| {
            organization_id.is_none_or(|organization_id| entry.organization_id == organization_id)
                && window.contains(entry.created_at)
        })))
    }

    async fn purge_entries_older_than(
        &self,
        organization_id: OrganizationId,
        retention_days: u16,
    ) -> AppResult<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|entry| {
            entry.organization_id != organization_id || entry.created_at >= cutoff
        });
        Ok((before - entries.len()) as u64)
    }
}

#[derive(Default)]
pub(crate) struct RecordingCapabilityCache {
    pub(crate) entries: Mutex<HashMap<(OrganizationId, UserId), RuleSet>>,
    pub(crate) invalidated_actors: Mutex<Vec<(OrganizationId, UserId)>>,
    pub(crate) invalidated_organizations: Mutex<Vec<OrganizationId>>,
}

#[async_trait]
impl CapabilityCache for RecordingCapabilityCache {
    async fn get_rule_set(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<Option<RuleSet>> {
        Ok(self
            .entries
            .lock()
            .await
            .get(&(organization_id, user_id))
            .cloned())
    }

    async fn set_rule_set(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        rule_set: &RuleSet,
        _ttl_seconds: u32,
    ) -> AppResult<()> {
        self.entries
            .lock()
            .await
            .insert((organization_id, user_id), rule_set.clone());
        Ok(())
    }

    async fn invalidate_actor(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<()> {
        self.entries.lock().await.remove(&(organization_id, user_id));
        self.invalidated_actors
            .lock()
            .await
            .push((organization_id, user_id));
        Ok(())
    }

    async fn invalidate_organization(&self, organization_id: OrganizationId) -> AppResult<()> {
        self.entries
            .lock()
            .await
            .retain(|(entry_organization_id, _), _| *entry_organization_id != organization_id);
        self.invalidated_organizations
            .lock()
            .await
            .push(organization_id);
        Ok(())
    }
}

#[derive(Default)]
struct StoreState {
    memberships: HashMap<(OrganizationId, UserId), Membership>,
    roles: HashMap<RoleId, Role>,
    teams: HashMap<(OrganizationId, UserId), BTreeSet<String>>,
    delegations: Vec<PermissionDelegation>,
    resource_permissions: Vec<ResourcePermission>,
}

/// Fake backing both authorization and administration ports.
#[derive(Default)]
pub(crate) struct FakeSecurityStore {
    state: Mutex<StoreState>,
}

impl FakeSecurityStore {
    pub(crate) async fn add_membership(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role: MembershipRole,
    ) {
        self.state.lock().await.memberships.insert(
            (organization_id, user_id),
            Membership {
                user_id,
                organization_id,
                active: true,
                role,
            },
        );
    }

    pub(crate) async fn add_role(&self, role: Role) {
        self.state.lock().await.roles.insert(role.id, role);
    }

    pub(crate) async fn add_team(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        team_id: &str,
    ) {
        self.state
            .lock()
            .await
            .teams
            .entry((organization_id, user_id))
            .or_default()
            .insert(team_id.to_owned());
    }

    pub(crate) async fn membership(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Option<Membership> {
        self.state
            .lock()
            .await
            .memberships
            .get(&(organization_id, user_id))
            .cloned()
    }

    pub(crate) async fn role(&self, role_id: RoleId) -> Option<Role> {
        self.state.lock().await.roles.get(&role_id).cloned()
    }
}

#[async_trait]
impl AuthorizationRepository for FakeSecurityStore {
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
        Ok(self
            .role(role_id)
            .await
            .filter(|role| role.organization_id == organization_id))
    }

    async fn list_team_ids(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<BTreeSet<String>> {
        Ok(self
            .state
            .lock()
            .await
            .teams
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
            .state
            .lock()
            .await
            .delegations
            .iter()
            .filter(|delegation| {
                delegation.organization_id == organization_id && delegation.delegatee_id == user_id
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
            .state
            .lock()
            .await
            .resource_permissions
            .iter()
            .filter(|grant| grant.organization_id == organization_id && grant.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SecurityAdminRepository for FakeSecurityStore {
    async fn list_roles(&self, organization_id: OrganizationId) -> AppResult<Vec<Role>> {
        let mut roles: Vec<Role> = self
            .state
            .lock()
            .await
            .roles
            .values()
            .filter(|role| role.organization_id == organization_id)
            .cloned()
            .collect();
        roles.sort_by(|left, right| right.priority.cmp(&left.priority));
        Ok(roles)
    }

    async fn find_role(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> AppResult<Option<Role>> {
        Ok(self
            .role(role_id)
            .await
            .filter(|role| role.organization_id == organization_id))
    }

    async fn find_role_by_key(
        &self,
        organization_id: OrganizationId,
        key: &RoleKey,
    ) -> AppResult<Option<Role>> {
        Ok(self
            .state
            .lock()
            .await
            .roles
            .values()
            .find(|role| role.organization_id == organization_id && &role.key == key)
            .cloned())
    }

    async fn create_role(&self, role: &Role) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state
            .roles
            .values()
            .any(|existing| existing.organization_id == role.organization_id && existing.key == role.key)
        {
            return Err(AppError::Conflict(format!("role '{}' already exists", role.key)));
        }
        state.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn update_role(&self, role: &Role) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let stored = state
            .roles
            .get_mut(&role.id)
            .ok_or_else(|| AppError::NotFound(format!("role '{}' not found", role.id)))?;
        stored.name = role.name.clone();
        stored.priority = role.priority;
        Ok(())
    }

    async fn delete_role(
        &self,
        _organization_id: OrganizationId,
        role_id: RoleId,
    ) -> AppResult<()> {
        self.state.lock().await.roles.remove(&role_id);
        Ok(())
    }

    async fn count_role_memberships(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> AppResult<u64> {
        Ok(self
            .state
            .lock()
            .await
            .memberships
            .values()
            .filter(|membership| {
                membership.organization_id == organization_id
                    && membership.role_id() == Some(role_id)
            })
            .count() as u64)
    }

    async fn count_role_delegations(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> AppResult<u64> {
        Ok(self
            .state
            .lock()
            .await
            .delegations
            .iter()
            .filter(|delegation| {
                delegation.organization_id == organization_id
                    && delegation.role_id == Some(role_id)
            })
            .count() as u64)
    }

    async fn add_role_grant(
        &self,
        _organization_id: OrganizationId,
        role_id: RoleId,
        grant: &RoleGrant,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let role = state
            .roles
            .get_mut(&role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' not found")))?;
        if role
            .grants
            .iter()
            .any(|existing| existing.permission == grant.permission)
        {
            return Err(AppError::Conflict("permission already granted".to_owned()));
        }
        role.grants.push(grant.clone());
        Ok(())
    }

    async fn remove_role_grant(
        &self,
        _organization_id: OrganizationId,
        role_id: RoleId,
        permission: Permission,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let role = state
            .roles
            .get_mut(&role_id)
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
        let mut state = self.state.lock().await;
        let membership = state
            .memberships
            .get_mut(&(organization_id, user_id))
            .ok_or_else(|| AppError::NotFound(format!("membership of '{user_id}' not found")))?;
        membership.role = role;
        Ok(membership.clone())
    }

    async fn create_delegation(&self, delegation: &PermissionDelegation) -> AppResult<()> {
        self.state.lock().await.delegations.push(delegation.clone());
        Ok(())
    }

    async fn find_delegation(
        &self,
        organization_id: OrganizationId,
        delegation_id: DelegationId,
    ) -> AppResult<Option<PermissionDelegation>> {
        Ok(self
            .state
            .lock()
            .await
            .delegations
            .iter()
            .find(|delegation| {
                delegation.organization_id == organization_id && delegation.id == delegation_id
            })
            .cloned())
    }

    async fn save_delegation(&self, delegation: &PermissionDelegation) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(stored) = state
            .delegations
            .iter_mut()
            .find(|stored| stored.id == delegation.id)
        {
            *stored = delegation.clone();
        }
        Ok(())
    }

    async fn list_delegations(
        &self,
        organization_id: OrganizationId,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<PermissionDelegation>> {
        Ok(self
            .state
            .lock()
            .await
            .delegations
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
        self.state
            .lock()
            .await
            .resource_permissions
            .push(grant.clone());
        Ok(())
    }

    async fn find_resource_permission(
        &self,
        organization_id: OrganizationId,
        resource_permission_id: ResourcePermissionId,
    ) -> AppResult<Option<ResourcePermission>> {
        Ok(self
            .state
            .lock()
            .await
            .resource_permissions
            .iter()
            .find(|grant| {
                grant.organization_id == organization_id && grant.id == resource_permission_id
            })
            .cloned())
    }

    async fn save_resource_permission(&self, grant: &ResourcePermission) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(stored) = state
            .resource_permissions
            .iter_mut()
            .find(|stored| stored.id == grant.id)
        {
            *stored = grant.clone();
        }
        Ok(())
    }

    async fn list_resource_permissions(
        &self,
        organization_id: OrganizationId,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<ResourcePermission>> {
        Ok(self
            .state
            .lock()
            .await
            .resource_permissions
            .iter()
            .filter(|grant| {
                grant.organization_id == organization_id
                    && user_id.is_none_or(|user_id| grant.user_id == user_id)
            })
            .cloned()
            .collect())
    }
}
