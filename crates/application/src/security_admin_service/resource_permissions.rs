use super::*;

use chrono::{DateTime, Utc};
use tasklane_core::UserId;
use tasklane_domain::{
    NewResourcePermission, ResourceInstance, ResourcePermission, ResourcePermissionId,
};

use crate::security_admin_ports::{GrantResourcePermissionInput, ResourcePermissionQuery};

const RESOURCE_PERMISSION_RESOURCE: &str = "resource_permission";

impl SecurityAdminService {
    /// Grants or denies one action on one instance to one member.
    pub async fn grant_resource_permission(
        &self,
        actor: &ActorIdentity,
        input: GrantResourcePermissionInput,
    ) -> AppResult<ResourcePermission> {
        if input.user_id == actor.user_id() {
            return Err(AppError::Forbidden(
                "cannot issue resource overrides to yourself".to_owned(),
            ));
        }

        // The issuer must hold every action the override unlocks on the instance.
        let permission = input.permission;
        let target = self
            .override_target(actor, permission.resource_type(), input.resource_id.trim())
            .await?;
        self.require(actor, Action::Manage, target.clone()).await?;
        for action in permission.covered_actions() {
            self.require(actor, action, target.clone()).await?;
        }

        let is_member = self
            .repository
            .find_membership(actor.organization_id(), input.user_id)
            .await?
            .is_some_and(|membership| {
                membership.is_active_for(input.user_id, actor.organization_id())
            });
        if !is_member {
            return Err(AppError::Validation(format!(
                "user '{}' is not an active member of organization '{}'",
                input.user_id,
                actor.organization_id()
            )));
        }

        let now = self.clock.now();
        let expires_at = input.expires_at.or_else(|| {
            self.default_resource_permission_expiry
                .map(|expiry| now + expiry)
        });
        let grant = ResourcePermission::create(
            NewResourcePermission {
                organization_id: actor.organization_id(),
                user_id: input.user_id,
                permission: input.permission,
                resource_id: input.resource_id,
                granted: input.granted,
                expires_at,
                granted_by: Some(actor.user_id()),
            },
            now,
        )?;
        self.repository.create_resource_permission(&grant).await?;
        self.authorization_service
            .invalidate_actor(actor.organization_id(), grant.user_id)
            .await;

        tracing::info!(
            organization_id = %grant.organization_id,
            user_id = %grant.user_id,
            permission = %input.permission,
            resource_id = %grant.resource_id,
            granted = grant.granted,
            "created resource permission"
        );
        self.audit(
            actor,
            AuditAction::ResourcePermissionGranted,
            RESOURCE_PERMISSION_RESOURCE,
            grant.id.to_string(),
            format!(
                "{} '{}' on {} '{}' for '{}'",
                if grant.granted { "granted" } else { "denied" },
                input.permission,
                grant.resource_type,
                grant.resource_id,
                grant.user_id
            ),
        )
        .await;

        Ok(grant)
    }

    /// Revokes an override so it neither grants nor denies.
    pub async fn revoke_resource_permission(
        &self,
        actor: &ActorIdentity,
        resource_permission_id: ResourcePermissionId,
    ) -> AppResult<ResourcePermission> {
        let mut grant = self
            .find_managed_resource_permission(actor, resource_permission_id)
            .await?;
        grant.revoke(self.clock.now())?;
        self.repository.save_resource_permission(&grant).await?;
        self.authorization_service
            .invalidate_actor(actor.organization_id(), grant.user_id)
            .await;

        self.audit(
            actor,
            AuditAction::ResourcePermissionRevoked,
            RESOURCE_PERMISSION_RESOURCE,
            grant.id.to_string(),
            format!(
                "revoked override on {} '{}' for '{}'",
                grant.resource_type, grant.resource_id, grant.user_id
            ),
        )
        .await;

        Ok(grant)
    }

    /// Moves the expiry of an active timed override later.
    pub async fn extend_resource_permission(
        &self,
        actor: &ActorIdentity,
        resource_permission_id: ResourcePermissionId,
        new_expires_at: DateTime<Utc>,
    ) -> AppResult<ResourcePermission> {
        let mut grant = self
            .find_managed_resource_permission(actor, resource_permission_id)
            .await?;
        grant.extend(new_expires_at, self.clock.now())?;
        self.repository.save_resource_permission(&grant).await?;
        self.authorization_service
            .invalidate_actor(actor.organization_id(), grant.user_id)
            .await;

        self.audit(
            actor,
            AuditAction::ResourcePermissionExtended,
            RESOURCE_PERMISSION_RESOURCE,
            grant.id.to_string(),
            format!("extended override until {}", new_expires_at.to_rfc3339()),
        )
        .await;

        Ok(grant)
    }

    /// Lists organization resource overrides.
    pub async fn list_resource_permissions(
        &self,
        actor: &ActorIdentity,
        query: ResourcePermissionQuery,
    ) -> AppResult<Vec<ResourcePermission>> {
        self.require(actor, Action::Read, ResourceType::Membership)
            .await?;

        let now = self.clock.now();
        let mut grants = self
            .repository
            .list_resource_permissions(actor.organization_id(), query.user_id)
            .await?;
        if query.active_only {
            grants.retain(|grant| grant.is_active_at(now));
        }

        Ok(grants)
    }

    async fn find_managed_resource_permission(
        &self,
        actor: &ActorIdentity,
        resource_permission_id: ResourcePermissionId,
    ) -> AppResult<ResourcePermission> {
        let grant = self
            .repository
            .find_resource_permission(actor.organization_id(), resource_permission_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "resource permission '{resource_permission_id}' not found"
                ))
            })?;

        // Stored rows outside the allow-list are only manageable at class level.
        let target: AuthorizationTarget = match ResourceType::from_name(&grant.resource_type) {
            Some(ResourceType::Membership) => match UserId::parse(&grant.resource_id) {
                Ok(user_id) => self
                    .membership_instance(actor, user_id)
                    .await?
                    .map_or_else(|| ResourceType::Membership.into(), AuthorizationTarget::from),
                Err(_) => ResourceType::Membership.into(),
            },
            Some(resource_type) => ResourceInstance::new(
                resource_type,
                grant.resource_id.as_str(),
                actor.organization_id(),
            )
            .into(),
            None => ResourceType::Membership.into(),
        };
        self.require(actor, Action::Manage, target).await?;

        Ok(grant)
    }

    /// Builds the instance an override on `resource_id` applies to.
    ///
    /// Membership targets carry the role key of the membership so that
    /// owner protection applies to them.
    async fn override_target(
        &self,
        actor: &ActorIdentity,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> AppResult<AuthorizationTarget> {
        if resource_type != ResourceType::Membership {
            return Ok(
                ResourceInstance::new(resource_type, resource_id, actor.organization_id()).into(),
            );
        }

        let user_id = UserId::parse(resource_id)?;
        self.membership_instance(actor, user_id)
            .await?
            .map(AuthorizationTarget::from)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "user '{user_id}' is not a member of organization '{}'",
                    actor.organization_id()
                ))
            })
    }

    async fn membership_instance(
        &self,
        actor: &ActorIdentity,
        user_id: UserId,
    ) -> AppResult<Option<ResourceInstance>> {
        let Some(membership) = self
            .repository
            .find_membership(actor.organization_id(), user_id)
            .await?
        else {
            return Ok(None);
        };
        let role_key = self.membership_role_key(actor, membership.role).await?;

        Ok(Some(ResourceInstance::membership(
            actor.organization_id(),
            user_id,
            role_key,
        )))
    }
}
