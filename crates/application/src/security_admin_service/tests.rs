use std::sync::Arc;

use chrono::Duration;
use tasklane_core::{ActorIdentity, AppError, NonEmptyString, OrganizationId, UserId};
use tasklane_domain::{
    Action, AuthorizationTarget, GrantConditions, GrantScope, LegacyRole, MembershipRole,
    Permission, ResourcePermissionId, ResourceType, Role, RoleGrant, RoleId, RoleKey,
    RolePriority,
};

use crate::security_admin_ports::{
    AddRolePermissionInput, CreateDelegationInput, CreateRoleInput, DelegationQuery,
    DuplicateRoleInput, GrantResourcePermissionInput, ResourcePermissionQuery, UpdateRoleInput,
};
use crate::test_support::{
    FakeSecurityStore, FixedClock, InMemoryAuditLog, RecordingCapabilityCache,
};
use crate::{
    AuditLogQuery, AuditLogger, AuditWindow, AuthorizationService, Clock, RoleBootstrapService,
    SecurityAdminRepository,
};

use super::SecurityAdminService;

struct Harness {
    store: Arc<FakeSecurityStore>,
    clock: Arc<FixedClock>,
    audit_log: Arc<InMemoryAuditLog>,
    cache: Arc<RecordingCapabilityCache>,
    organization_id: OrganizationId,
}

impl Harness {
    async fn new() -> Self {
        let harness = Self {
            store: Arc::new(FakeSecurityStore::default()),
            clock: Arc::new(FixedClock::default()),
            audit_log: Arc::new(InMemoryAuditLog::default()),
            cache: Arc::new(RecordingCapabilityCache::default()),
            organization_id: OrganizationId::new(),
        };
        let seeded = RoleBootstrapService::new(harness.store.clone())
            .ensure_default_roles(harness.organization_id)
            .await;
        assert!(seeded.is_ok());
        harness
    }

    fn service(&self) -> SecurityAdminService {
        let audit_logger = AuditLogger::new(self.audit_log.clone(), self.clock.clone());
        let authorization_service =
            AuthorizationService::new(self.store.clone(), self.clock.clone())
                .with_audit_logger(audit_logger.clone())
                .with_capability_cache(self.cache.clone(), 300);

        SecurityAdminService::new(
            authorization_service,
            self.store.clone(),
            audit_logger,
            self.clock.clone(),
        )
    }

    fn actor(&self, user_id: UserId) -> ActorIdentity {
        ActorIdentity::new(user_id, self.organization_id)
    }

    async fn legacy_member(&self, legacy_role: LegacyRole) -> UserId {
        let user_id = UserId::new();
        self.store
            .add_membership(
                self.organization_id,
                user_id,
                MembershipRole::Legacy(legacy_role),
            )
            .await;
        user_id
    }

    async fn role_manager(&self, priority: u16) -> UserId {
        let role = custom_role(
            self.organization_id,
            "role_manager",
            priority,
            vec![RoleGrant::unconditional(Permission::new(
                ResourceType::Role,
                Action::Manage,
            ))],
        );
        let user_id = UserId::new();
        self.store
            .add_membership(
                self.organization_id,
                user_id,
                MembershipRole::Dynamic(role.id),
            )
            .await;
        self.store.add_role(role).await;
        user_id
    }

    async fn system_role(&self, legacy_role: LegacyRole) -> Role {
        self.store
            .list_roles(self.organization_id)
            .await
            .unwrap_or_default()
            .into_iter()
            .find(|role| role.key.as_str() == legacy_role.as_str())
            .unwrap_or_else(|| unreachable!())
    }

    async fn audit_actions(&self) -> Vec<String> {
        self.audit_log
            .entries
            .lock()
            .await
            .iter()
            .map(|entry| entry.action.clone())
            .collect()
    }
}

fn custom_role(
    organization_id: OrganizationId,
    key: &str,
    priority: u16,
    grants: Vec<RoleGrant>,
) -> Role {
    Role {
        id: RoleId::new(),
        organization_id,
        key: RoleKey::new(key).unwrap_or_else(|_| unreachable!()),
        name: NonEmptyString::new(key).unwrap_or_else(|_| unreachable!()),
        priority: RolePriority::new(i64::from(priority)).unwrap_or_else(|_| unreachable!()),
        is_system: false,
        is_editable: true,
        grants,
    }
}

fn create_role_input(key: &str, priority: i64) -> CreateRoleInput {
    CreateRoleInput {
        key: key.to_owned(),
        name: "Team Lead".to_owned(),
        priority,
        grants: vec![AddRolePermissionInput {
            permission: Permission::new(ResourceType::Task, Action::Update),
            conditions: GrantConditions {
                team_only: true,
                ..GrantConditions::default()
            },
            scope: GrantScope::default(),
        }],
    }
}

#[tokio::test]
async fn create_role_is_capped_by_own_priority() {
    let harness = Harness::new().await;
    let service = harness.service();
    let actor = harness.actor(harness.role_manager(70).await);

    let above = service
        .create_role(&actor, create_role_input("lead", 75))
        .await;
    let within = service
        .create_role(&actor, create_role_input("lead", 60))
        .await;

    assert!(matches!(above, Err(AppError::Forbidden(_))));
    let within = within.unwrap_or_else(|_| unreachable!());
    assert!(!within.is_system);
    assert!(within.is_editable);
    assert_eq!(within.grants.len(), 1);
    assert!(
        harness
            .audit_actions()
            .await
            .contains(&"security.role.created".to_owned())
    );
}

#[tokio::test]
async fn create_role_rejects_taken_key_and_invalid_input() {
    let harness = Harness::new().await;
    let service = harness.service();
    let actor = harness.actor(harness.legacy_member(LegacyRole::Owner).await);

    let taken = service
        .create_role(&actor, create_role_input("member", 40))
        .await;
    let malformed = service
        .create_role(&actor, create_role_input("Team Lead", 40))
        .await;
    let negative = service
        .create_role(&actor, create_role_input("lead", -1))
        .await;
    let mut duplicated = create_role_input("lead", 40);
    duplicated.grants.push(duplicated.grants[0].clone());
    let duplicated = service.create_role(&actor, duplicated).await;

    assert!(matches!(taken, Err(AppError::Conflict(_))));
    assert!(matches!(malformed, Err(AppError::Validation(_))));
    assert!(matches!(negative, Err(AppError::Validation(_))));
    assert!(matches!(duplicated, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn admin_cannot_manage_roles() {
    let harness = Harness::new().await;
    let service = harness.service();
    let actor = harness.actor(harness.legacy_member(LegacyRole::Admin).await);

    let listed = service.list_roles(&actor).await;
    let created = service
        .create_role(&actor, create_role_input("lead", 40))
        .await;

    assert_eq!(listed.map(|roles| roles.len()).ok(), Some(4));
    assert!(matches!(created, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn system_roles_are_immutable() {
    let harness = Harness::new().await;
    let service = harness.service();
    let actor = harness.actor(harness.legacy_member(LegacyRole::Owner).await);
    let member_role = harness.system_role(LegacyRole::Member).await;

    let deleted = service.delete_role(&actor, member_role.id).await;
    let renamed = service
        .update_role(
            &actor,
            member_role.id,
            UpdateRoleInput {
                name: Some("Contributor".to_owned()),
                priority: None,
            },
        )
        .await;
    let extended = service
        .add_role_permission(
            &actor,
            member_role.id,
            AddRolePermissionInput {
                permission: Permission::new(ResourceType::Task, Action::Destroy),
                conditions: GrantConditions::default(),
                scope: GrantScope::default(),
            },
        )
        .await;

    assert!(matches!(deleted, Err(AppError::Validation(_))));
    assert!(matches!(renamed, Err(AppError::Validation(_))));
    assert!(matches!(extended, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn referenced_role_cannot_be_deleted() {
    let harness = Harness::new().await;
    let service = harness.service();
    let owner = harness.actor(harness.legacy_member(LegacyRole::Owner).await);
    let role = service
        .create_role(&owner, create_role_input("lead", 40))
        .await
        .unwrap_or_else(|_| unreachable!());
    let member = harness.legacy_member(LegacyRole::Member).await;
    assert!(service.assign_role(&owner, member, role.id).await.is_ok());

    let result = service.delete_role(&owner, role.id).await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn role_with_delegation_history_cannot_be_deleted() {
    let harness = Harness::new().await;
    let service = harness.service();
    let owner = harness.actor(harness.legacy_member(LegacyRole::Owner).await);
    let member = harness.legacy_member(LegacyRole::Member).await;
    let role = service
        .create_role(&owner, create_role_input("lead", 40))
        .await
        .unwrap_or_else(|_| unreachable!());
    let delegation = service
        .create_delegation(&owner, delegation_input(&harness, member, Some(role.id), Vec::new()))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(service.revoke_delegation(&owner, delegation.id).await.is_ok());

    let result = service.delete_role(&owner, role.id).await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert!(harness.store.role(role.id).await.is_some());
}

#[tokio::test]
async fn unreferenced_custom_role_is_deleted_and_rule_sets_invalidated() {
    let harness = Harness::new().await;
    let service = harness.service();
    let owner = harness.actor(harness.legacy_member(LegacyRole::Owner).await);
    let role = service
        .create_role(&owner, create_role_input("lead", 40))
        .await
        .unwrap_or_else(|_| unreachable!());

    let result = service.delete_role(&owner, role.id).await;

    assert!(result.is_ok());
    assert!(harness.store.role(role.id).await.is_none());
    assert_eq!(
        harness.cache.invalidated_organizations.lock().await.as_slice(),
        &[harness.organization_id]
    );
}

#[tokio::test]
async fn duplicate_role_copies_grants_into_custom_role() {
    let harness = Harness::new().await;
    let service = harness.service();
    let owner = harness.actor(harness.legacy_member(LegacyRole::Owner).await);
    let member_role = harness.system_role(LegacyRole::Member).await;

    let copy = service
        .duplicate_role(
            &owner,
            member_role.id,
            DuplicateRoleInput {
                key: "contributor".to_owned(),
                name: "Contributor".to_owned(),
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_ne!(copy.id, member_role.id);
    assert!(!copy.is_system);
    assert!(copy.is_editable);
    assert_eq!(copy.priority, member_role.priority);
    assert_eq!(copy.grants, member_role.grants);
}

#[tokio::test]
async fn role_permission_round_trip_invalidates_organization() {
    let harness = Harness::new().await;
    let service = harness.service();
    let owner = harness.actor(harness.legacy_member(LegacyRole::Owner).await);
    let role = service
        .create_role(&owner, create_role_input("lead", 40))
        .await
        .unwrap_or_else(|_| unreachable!());
    let permission = Permission::new(ResourceType::Sprint, Action::Create);
    let input = AddRolePermissionInput {
        permission,
        conditions: GrantConditions::default(),
        scope: GrantScope::default(),
    };

    let added = service
        .add_role_permission(&owner, role.id, input.clone())
        .await;
    let again = service.add_role_permission(&owner, role.id, input).await;
    let removed = service
        .remove_role_permission(&owner, role.id, permission)
        .await;
    let missing = service
        .remove_role_permission(&owner, role.id, permission)
        .await;

    assert!(
        added
            .map(|role| role.grant_for(permission).is_some())
            .unwrap_or_default()
    );
    assert!(matches!(again, Err(AppError::Conflict(_))));
    assert!(
        removed
            .map(|role| role.grant_for(permission).is_none())
            .unwrap_or_default()
    );
    assert!(matches!(missing, Err(AppError::NotFound(_))));
    assert_eq!(harness.cache.invalidated_organizations.lock().await.len(), 2);
}

#[tokio::test]
async fn admin_cannot_reassign_owner_membership() {
    let harness = Harness::new().await;
    let service = harness.service();
    let admin = harness.actor(harness.legacy_member(LegacyRole::Admin).await);
    let owner = harness.legacy_member(LegacyRole::Owner).await;
    let viewer_role = harness.system_role(LegacyRole::Viewer).await;

    let result = service.assign_role(&admin, owner, viewer_role.id).await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
    let membership = harness.store.membership(harness.organization_id, owner).await;
    assert_eq!(
        membership.map(|membership| membership.role),
        Some(MembershipRole::Legacy(LegacyRole::Owner))
    );
}

#[tokio::test]
async fn admin_cannot_assign_role_above_own_priority() {
    let harness = Harness::new().await;
    let service = harness.service();
    let admin = harness.actor(harness.legacy_member(LegacyRole::Admin).await);
    let member = harness.legacy_member(LegacyRole::Member).await;
    let owner_role = harness.system_role(LegacyRole::Owner).await;
    let viewer_role = harness.system_role(LegacyRole::Viewer).await;

    let promoted = service.assign_role(&admin, member, owner_role.id).await;
    let demoted = service.assign_role(&admin, member, viewer_role.id).await;

    assert!(matches!(promoted, Err(AppError::Forbidden(_))));
    assert_eq!(
        demoted.map(|membership| membership.role).ok(),
        Some(MembershipRole::Dynamic(viewer_role.id))
    );
    assert_eq!(
        harness.cache.invalidated_actors.lock().await.as_slice(),
        &[(harness.organization_id, member)]
    );
    assert!(
        harness
            .audit_actions()
            .await
            .contains(&"security.role.assigned".to_owned())
    );
}

fn delegation_input(
    harness: &Harness,
    delegatee_id: UserId,
    role_id: Option<RoleId>,
    permissions: Vec<Permission>,
) -> CreateDelegationInput {
    CreateDelegationInput {
        delegatee_id,
        role_id,
        permissions,
        starts_at: harness.clock.now() - Duration::hours(1),
        ends_at: harness.clock.now() + Duration::hours(1),
        reason: Some("vacation cover".to_owned()),
    }
}

#[tokio::test]
async fn delegation_rejects_self_and_roles_above_delegator() {
    let harness = Harness::new().await;
    let service = harness.service();
    let admin_id = harness.legacy_member(LegacyRole::Admin).await;
    let admin = harness.actor(admin_id);
    let member = harness.legacy_member(LegacyRole::Member).await;
    let owner_role = harness.system_role(LegacyRole::Owner).await;
    let sprint_create = Permission::new(ResourceType::Sprint, Action::Create);

    let to_self = service
        .create_delegation(
            &admin,
            delegation_input(&harness, admin_id, None, vec![sprint_create]),
        )
        .await;
    let above = service
        .create_delegation(
            &admin,
            delegation_input(&harness, member, Some(owner_role.id), Vec::new()),
        )
        .await;
    let both = service
        .create_delegation(
            &admin,
            delegation_input(&harness, member, Some(owner_role.id), vec![sprint_create]),
        )
        .await;
    let empty = service
        .create_delegation(&admin, delegation_input(&harness, member, None, Vec::new()))
        .await;

    assert!(matches!(to_self, Err(AppError::Validation(_))));
    assert!(matches!(above, Err(AppError::Validation(_))));
    assert!(matches!(both, Err(AppError::Validation(_))));
    assert!(matches!(empty, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn delegated_permissions_must_be_held_unconditionally() {
    let harness = Harness::new().await;
    let service = harness.service();
    let member = harness.actor(harness.legacy_member(LegacyRole::Member).await);
    let viewer = harness.legacy_member(LegacyRole::Viewer).await;

    let own_only = service
        .create_delegation(
            &member,
            delegation_input(
                &harness,
                viewer,
                None,
                vec![Permission::new(ResourceType::Task, Action::Update)],
            ),
        )
        .await;
    let held = service
        .create_delegation(
            &member,
            delegation_input(
                &harness,
                viewer,
                None,
                vec![Permission::new(ResourceType::Task, Action::Create)],
            ),
        )
        .await;

    assert!(matches!(own_only, Err(AppError::Forbidden(_))));
    assert!(held.is_ok());
    assert!(
        harness
            .cache
            .invalidated_actors
            .lock()
            .await
            .contains(&(harness.organization_id, viewer))
    );
}

#[tokio::test]
async fn admin_cannot_delegate_owner_protected_membership_actions() {
    let harness = Harness::new().await;
    let service = harness.service();
    let admin = harness.actor(harness.legacy_member(LegacyRole::Admin).await);
    let member_id = harness.legacy_member(LegacyRole::Member).await;
    let member = harness.actor(member_id);
    let owner = harness.legacy_member(LegacyRole::Owner).await;
    let viewer_role = harness.system_role(LegacyRole::Viewer).await;

    let change_role = service
        .create_delegation(
            &admin,
            delegation_input(
                &harness,
                member_id,
                None,
                vec![Permission::new(ResourceType::Membership, Action::ChangeRole)],
            ),
        )
        .await;
    let manage = service
        .create_delegation(
            &admin,
            delegation_input(
                &harness,
                member_id,
                None,
                vec![Permission::new(ResourceType::Membership, Action::Manage)],
            ),
        )
        .await;
    let invite = service
        .create_delegation(
            &admin,
            delegation_input(
                &harness,
                member_id,
                None,
                vec![Permission::new(ResourceType::Membership, Action::Invite)],
            ),
        )
        .await;
    let demoted = service.assign_role(&member, owner, viewer_role.id).await;

    assert!(matches!(change_role, Err(AppError::Forbidden(_))));
    assert!(matches!(manage, Err(AppError::Forbidden(_))));
    assert!(invite.is_ok());
    assert!(matches!(demoted, Err(AppError::Forbidden(_))));
    let membership = harness.store.membership(harness.organization_id, owner).await;
    assert_eq!(
        membership.map(|membership| membership.role),
        Some(MembershipRole::Legacy(LegacyRole::Owner))
    );
}

#[tokio::test]
async fn delegation_grants_until_revoked() {
    let harness = Harness::new().await;
    let service = harness.service();
    let member_id = harness.legacy_member(LegacyRole::Member).await;
    let member = harness.actor(member_id);
    let viewer = harness.legacy_member(LegacyRole::Viewer).await;
    let stranger = harness.actor(harness.legacy_member(LegacyRole::Viewer).await);
    let sprint_create = Permission::new(ResourceType::Sprint, Action::Create);
    let delegation = service
        .create_delegation(
            &member,
            delegation_input(&harness, viewer, None, vec![sprint_create]),
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    let authorization = AuthorizationService::new(harness.store.clone(), harness.clock.clone());
    let sprints = AuthorizationTarget::from(ResourceType::Sprint);

    let granted = authorization
        .authorize(Some(viewer), harness.organization_id, Action::Create, &sprints)
        .await;
    let by_stranger = service.revoke_delegation(&stranger, delegation.id).await;
    let by_delegator = service.revoke_delegation(&member, delegation.id).await;
    let after = authorization
        .authorize(Some(viewer), harness.organization_id, Action::Create, &sprints)
        .await;
    let twice = service.revoke_delegation(&member, delegation.id).await;

    assert!(matches!(granted, Ok(true)));
    assert!(matches!(by_stranger, Err(AppError::Forbidden(_))));
    assert!(by_delegator.is_ok());
    assert!(matches!(after, Ok(false)));
    assert!(matches!(twice, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn delegation_extension_and_listing_follow_the_clock() {
    let harness = Harness::new().await;
    let service = harness.service();
    let owner = harness.actor(harness.legacy_member(LegacyRole::Owner).await);
    let viewer = harness.legacy_member(LegacyRole::Viewer).await;
    let delegation = service
        .create_delegation(
            &owner,
            delegation_input(
                &harness,
                viewer,
                None,
                vec![Permission::new(ResourceType::Comment, Action::Create)],
            ),
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    let extended = service
        .extend_delegation(&owner, delegation.id, delegation.ends_at + Duration::hours(2))
        .await;
    harness.clock.advance(Duration::hours(2));
    let active = service
        .list_delegations(
            &owner,
            DelegationQuery {
                user_id: Some(viewer),
                active_only: true,
            },
        )
        .await
        .unwrap_or_default();
    harness.clock.advance(Duration::hours(2));
    let expired_active = service
        .list_delegations(
            &owner,
            DelegationQuery {
                user_id: None,
                active_only: true,
            },
        )
        .await
        .unwrap_or_default();
    let late_extension = service
        .extend_delegation(&owner, delegation.id, harness.clock.now() + Duration::hours(1))
        .await;

    assert!(extended.is_ok());
    assert_eq!(active.len(), 1);
    assert!(expired_active.is_empty());
    assert!(matches!(late_extension, Err(AppError::Validation(_))));
}

fn override_input(user_id: UserId, granted: bool) -> GrantResourcePermissionInput {
    GrantResourcePermissionInput {
        user_id,
        permission: Permission::new(ResourceType::Task, Action::Update),
        resource_id: "42".to_owned(),
        granted,
        expires_at: None,
    }
}

#[tokio::test]
async fn resource_permission_uses_default_expiry() {
    let harness = Harness::new().await;
    let service = harness
        .service()
        .with_default_resource_permission_expiry(Some(Duration::minutes(30)));
    let admin = harness.actor(harness.legacy_member(LegacyRole::Admin).await);
    let viewer = harness.legacy_member(LegacyRole::Viewer).await;

    let grant = service
        .grant_resource_permission(&admin, override_input(viewer, true))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        grant.expires_at,
        Some(harness.clock.now() + Duration::minutes(30))
    );
    assert_eq!(grant.granted_by, Some(admin.user_id()));
}

#[tokio::test]
async fn resource_permission_without_default_is_permanent_until_revoked() {
    let harness = Harness::new().await;
    let service = harness.service();
    let admin = harness.actor(harness.legacy_member(LegacyRole::Admin).await);
    let viewer = harness.legacy_member(LegacyRole::Viewer).await;

    let grant = service
        .grant_resource_permission(&admin, override_input(viewer, true))
        .await
        .unwrap_or_else(|_| unreachable!());
    let extended = service
        .extend_resource_permission(&admin, grant.id, harness.clock.now() + Duration::days(1))
        .await;
    let revoked = service
        .revoke_resource_permission(&admin, grant.id)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(grant.expires_at, None);
    assert!(matches!(extended, Err(AppError::Validation(_))));
    assert!(!revoked.granted);
    assert_eq!(revoked.revoked_at, Some(harness.clock.now()));
    assert!(
        harness
            .audit_actions()
            .await
            .contains(&"security.resource_permission.revoked".to_owned())
    );
}

#[tokio::test]
async fn resource_permission_requires_manage_and_active_member() {
    let harness = Harness::new().await;
    let service = harness.service();
    let admin = harness.actor(harness.legacy_member(LegacyRole::Admin).await);
    let member = harness.actor(harness.legacy_member(LegacyRole::Member).await);
    let viewer = harness.legacy_member(LegacyRole::Viewer).await;

    let by_member = service
        .grant_resource_permission(&member, override_input(viewer, true))
        .await;
    let to_stranger = service
        .grant_resource_permission(&admin, override_input(UserId::new(), false))
        .await;
    let missing = service
        .revoke_resource_permission(&admin, ResourcePermissionId::new())
        .await;

    assert!(matches!(by_member, Err(AppError::Forbidden(_))));
    assert!(matches!(to_stranger, Err(AppError::Validation(_))));
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

fn membership_override(
    user_id: UserId,
    target: UserId,
    action: Action,
) -> GrantResourcePermissionInput {
    GrantResourcePermissionInput {
        user_id,
        permission: Permission::new(ResourceType::Membership, action),
        resource_id: target.to_string(),
        granted: true,
        expires_at: None,
    }
}

#[tokio::test]
async fn admin_cannot_issue_overrides_on_owner_membership() {
    let harness = Harness::new().await;
    let service = harness.service();
    let admin_id = harness.legacy_member(LegacyRole::Admin).await;
    let admin = harness.actor(admin_id);
    let owner = harness.legacy_member(LegacyRole::Owner).await;
    let member = harness.legacy_member(LegacyRole::Member).await;
    let viewer = harness.legacy_member(LegacyRole::Viewer).await;
    let viewer_role = harness.system_role(LegacyRole::Viewer).await;

    let to_self = service
        .grant_resource_permission(
            &admin,
            membership_override(admin_id, owner, Action::ChangeRole),
        )
        .await;
    let to_member = service
        .grant_resource_permission(
            &admin,
            membership_override(member, owner, Action::ChangeRole),
        )
        .await;
    let manage = service
        .grant_resource_permission(&admin, membership_override(member, owner, Action::Manage))
        .await;
    let on_viewer = service
        .grant_resource_permission(
            &admin,
            membership_override(member, viewer, Action::ChangeRole),
        )
        .await;
    let demoted = service.assign_role(&admin, owner, viewer_role.id).await;

    assert!(matches!(to_self, Err(AppError::Forbidden(_))));
    assert!(matches!(to_member, Err(AppError::Forbidden(_))));
    assert!(matches!(manage, Err(AppError::Forbidden(_))));
    assert!(on_viewer.is_ok());
    assert!(matches!(demoted, Err(AppError::Forbidden(_))));
    let membership = harness.store.membership(harness.organization_id, owner).await;
    assert_eq!(
        membership.map(|membership| membership.role),
        Some(MembershipRole::Legacy(LegacyRole::Owner))
    );
}

#[tokio::test]
async fn resource_permission_cannot_target_the_issuer() {
    let harness = Harness::new().await;
    let service = harness.service();
    let admin = harness.actor(harness.legacy_member(LegacyRole::Admin).await);

    let result = service
        .grant_resource_permission(&admin, override_input(admin.user_id(), true))
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert!(
        service
            .list_resource_permissions(
                &admin,
                ResourcePermissionQuery {
                    user_id: None,
                    active_only: false,
                },
            )
            .await
            .unwrap_or_default()
            .is_empty()
    );
}

#[tokio::test]
async fn audit_listing_is_scoped_to_the_actor_organization() {
    let harness = Harness::new().await;
    let service = harness.service();
    let owner = harness.actor(harness.legacy_member(LegacyRole::Owner).await);
    let foreign = ActorIdentity::new(UserId::new(), OrganizationId::new());
    let viewer = harness.actor(harness.legacy_member(LegacyRole::Viewer).await);
    assert!(
        service
            .create_role(&owner, create_role_input("lead", 40))
            .await
            .is_ok()
    );
    // Denied for the foreign actor, which records an entry in its own organization.
    assert!(service.list_roles(&foreign).await.is_err());

    let listed = service
        .list_audit_entries(
            &owner,
            AuditLogQuery {
                organization_id: None,
                actor: None,
                action: None,
                resource_type: None,
                permitted: None,
                window: AuditWindow::default(),
                limit: 10_000,
                offset: 0,
            },
        )
        .await
        .unwrap_or_default();
    let summary = service
        .audit_summary(&owner, AuditWindow::default())
        .await
        .unwrap_or_default();
    let by_viewer = service.export_audit_entries(&viewer, AuditWindow::default()).await;

    assert_eq!(listed.len(), 1);
    assert!(
        listed
            .iter()
            .all(|entry| entry.organization_id == harness.organization_id)
    );
    assert_eq!(summary.total, 1);
    assert!(matches!(by_viewer, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn audit_purge_requires_destroy_and_is_audited() {
    let harness = Harness::new().await;
    let service = harness.service();
    let owner = harness.actor(harness.legacy_member(LegacyRole::Owner).await);
    let viewer = harness.actor(harness.legacy_member(LegacyRole::Viewer).await);
    assert!(
        service
            .create_role(&owner, create_role_input("lead", 40))
            .await
            .is_ok()
    );

    let by_viewer = service.purge_audit_entries(&viewer, 30).await;
    let out_of_range = service.purge_audit_entries(&owner, 0).await;
    let purged = service.purge_audit_entries(&owner, 30).await;

    assert!(matches!(by_viewer, Err(AppError::Forbidden(_))));
    assert!(matches!(out_of_range, Err(AppError::Validation(_))));
    assert!(purged.is_ok());
    assert_eq!(
        harness.audit_actions().await.last().map(String::as_str),
        Some("security.audit.purged")
    );
}
