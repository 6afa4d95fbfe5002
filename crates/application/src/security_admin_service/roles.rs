use super::*;

use std::collections::BTreeSet;

use tasklane_core::{NonEmptyString, UserId};
use tasklane_domain::{Membership, Permission, ResourceInstance, RoleGrant, RoleKey};

use crate::security_admin_ports::{
    AddRolePermissionInput, CreateRoleInput, DuplicateRoleInput, UpdateRoleInput,
};

impl SecurityAdminService {
    /// Returns organization roles for administrative users.
    pub async fn list_roles(&self, actor: &ActorIdentity) -> AppResult<Vec<Role>> {
        self.require(actor, Action::Read, ResourceType::Role).await?;
        self.repository.list_roles(actor.organization_id()).await
    }

    /// Creates a custom role and emits an audit event.
    pub async fn create_role(
        &self,
        actor: &ActorIdentity,
        input: CreateRoleInput,
    ) -> AppResult<Role> {
        self.require(actor, Action::Create, ResourceType::Role)
            .await?;

        let key = RoleKey::new(input.key)?;
        let name = NonEmptyString::new(input.name)?;
        let priority = RolePriority::new(input.priority)?;
        self.ensure_within_ceiling(actor, priority).await?;
        let grants = build_grants(input.grants)?;
        self.ensure_key_available(actor, &key).await?;

        let role = Role {
            id: RoleId::new(),
            organization_id: actor.organization_id(),
            key,
            name,
            priority,
            is_system: false,
            is_editable: true,
            grants,
        };
        self.repository.create_role(&role).await?;

        tracing::info!(
            organization_id = %role.organization_id,
            role_key = %role.key,
            priority = role.priority.value(),
            "created role"
        );
        self.audit(
            actor,
            AuditAction::RoleCreated,
            ResourceType::Role.as_str(),
            role.id.to_string(),
            format!(
                "created role '{}' with priority {}",
                role.key,
                role.priority.value()
            ),
        )
        .await;

        Ok(role)
    }

    /// Copies a role's grants into a new custom role.
    pub async fn duplicate_role(
        &self,
        actor: &ActorIdentity,
        role_id: RoleId,
        input: DuplicateRoleInput,
    ) -> AppResult<Role> {
        self.require(actor, Action::Create, ResourceType::Role)
            .await?;

        let source = self.find_role(actor, role_id).await?;
        self.ensure_within_ceiling(actor, source.priority).await?;
        let key = RoleKey::new(input.key)?;
        let name = NonEmptyString::new(input.name)?;
        self.ensure_key_available(actor, &key).await?;

        let role = Role {
            id: RoleId::new(),
            organization_id: actor.organization_id(),
            key,
            name,
            priority: source.priority,
            is_system: false,
            is_editable: true,
            grants: source.grants.clone(),
        };
        self.repository.create_role(&role).await?;

        self.audit(
            actor,
            AuditAction::RoleDuplicated,
            ResourceType::Role.as_str(),
            role.id.to_string(),
            format!("duplicated role '{}' into '{}'", source.key, role.key),
        )
        .await;

        Ok(role)
    }

    /// Renames or reprioritizes a custom role.
    pub async fn update_role(
        &self,
        actor: &ActorIdentity,
        role_id: RoleId,
        input: UpdateRoleInput,
    ) -> AppResult<Role> {
        self.require(actor, Action::Update, ResourceType::Role)
            .await?;

        let mut role = self.find_role(actor, role_id).await?;
        ensure_editable(&role)?;
        self.ensure_within_ceiling(actor, role.priority).await?;

        if let Some(name) = input.name {
            role.name = NonEmptyString::new(name)?;
        }
        if let Some(priority) = input.priority {
            let priority = RolePriority::new(priority)?;
            self.ensure_within_ceiling(actor, priority).await?;
            role.priority = priority;
        }

        self.repository.update_role(&role).await?;
        self.authorization_service
            .invalidate_organization(actor.organization_id())
            .await;

        self.audit(
            actor,
            AuditAction::RoleUpdated,
            ResourceType::Role.as_str(),
            role.id.to_string(),
            format!(
                "updated role '{}' (name '{}', priority {})",
                role.key,
                role.name.as_str(),
                role.priority.value()
            ),
        )
        .await;

        Ok(role)
    }

    /// Deletes a custom role no membership or delegation references.
    pub async fn delete_role(&self, actor: &ActorIdentity, role_id: RoleId) -> AppResult<()> {
        self.require(actor, Action::Destroy, ResourceType::Role)
            .await?;

        let role = self.find_role(actor, role_id).await?;
        if role.is_system {
            return Err(AppError::Validation(format!(
                "system role '{}' cannot be deleted",
                role.key
            )));
        }
        self.ensure_within_ceiling(actor, role.priority).await?;

        let memberships = self
            .repository
            .count_role_memberships(actor.organization_id(), role_id)
            .await?;
        if memberships > 0 {
            return Err(AppError::Conflict(format!(
                "role '{}' is still assigned to {memberships} membership(s)",
                role.key
            )));
        }
        let delegations = self
            .repository
            .count_role_delegations(actor.organization_id(), role_id)
            .await?;
        if delegations > 0 {
            return Err(AppError::Conflict(format!(
                "role '{}' is still referenced by {delegations} delegation(s)",
                role.key
            )));
        }

        self.repository
            .delete_role(actor.organization_id(), role_id)
            .await?;
        self.authorization_service
            .invalidate_organization(actor.organization_id())
            .await;

        self.audit(
            actor,
            AuditAction::RoleDeleted,
            ResourceType::Role.as_str(),
            role_id.to_string(),
            format!("deleted role '{}'", role.key),
        )
        .await;

        Ok(())
    }

    /// Points a membership at a role and emits an audit event.
    pub async fn assign_role(
        &self,
        actor: &ActorIdentity,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<Membership> {
        let membership = self
            .repository
            .find_membership(actor.organization_id(), user_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "user '{user_id}' is not a member of organization '{}'",
                    actor.organization_id()
                ))
            })?;
        let current_key = self.membership_role_key(actor, membership.role).await?;
        self.require(
            actor,
            Action::ChangeRole,
            ResourceInstance::membership(actor.organization_id(), user_id, current_key),
        )
        .await?;

        let role = self.find_role(actor, role_id).await?;
        self.ensure_within_ceiling(actor, role.priority).await?;

        let membership = self
            .repository
            .set_membership_role(
                actor.organization_id(),
                user_id,
                MembershipRole::Dynamic(role_id),
            )
            .await?;
        self.authorization_service
            .invalidate_actor(actor.organization_id(), user_id)
            .await;

        self.audit(
            actor,
            AuditAction::RoleAssigned,
            ResourceType::Membership.as_str(),
            user_id.to_string(),
            format!("assigned role '{}' to '{user_id}'", role.key),
        )
        .await;

        Ok(membership)
    }

    /// Attaches one grant to a custom role.
    pub async fn add_role_permission(
        &self,
        actor: &ActorIdentity,
        role_id: RoleId,
        input: AddRolePermissionInput,
    ) -> AppResult<Role> {
        self.require(actor, Action::Update, ResourceType::Role)
            .await?;

        let role = self.find_role(actor, role_id).await?;
        ensure_editable(&role)?;
        self.ensure_within_ceiling(actor, role.priority).await?;

        let permission = input.permission;
        let grant = RoleGrant::new(permission, input.conditions, input.scope)?;
        if role.grant_for(permission).is_some() {
            return Err(AppError::Conflict(format!(
                "role '{}' already grants '{permission}'",
                role.key
            )));
        }

        self.repository
            .add_role_grant(actor.organization_id(), role_id, &grant)
            .await?;
        self.authorization_service
            .invalidate_organization(actor.organization_id())
            .await;

        self.audit(
            actor,
            AuditAction::RolePermissionAdded,
            ResourceType::Role.as_str(),
            role_id.to_string(),
            format!("granted '{permission}' to role '{}'", role.key),
        )
        .await;

        self.find_role(actor, role_id).await
    }

    /// Removes the grant of one permission from a custom role.
    pub async fn remove_role_permission(
        &self,
        actor: &ActorIdentity,
        role_id: RoleId,
        permission: Permission,
    ) -> AppResult<Role> {
        self.require(actor, Action::Update, ResourceType::Role)
            .await?;

        let role = self.find_role(actor, role_id).await?;
        ensure_editable(&role)?;
        self.ensure_within_ceiling(actor, role.priority).await?;
        if role.grant_for(permission).is_none() {
            return Err(AppError::NotFound(format!(
                "role '{}' does not grant '{permission}'",
                role.key
            )));
        }

        self.repository
            .remove_role_grant(actor.organization_id(), role_id, permission)
            .await?;
        self.authorization_service
            .invalidate_organization(actor.organization_id())
            .await;

        self.audit(
            actor,
            AuditAction::RolePermissionRemoved,
            ResourceType::Role.as_str(),
            role_id.to_string(),
            format!("removed '{permission}' from role '{}'", role.key),
        )
        .await;

        self.find_role(actor, role_id).await
    }

    async fn ensure_key_available(&self, actor: &ActorIdentity, key: &RoleKey) -> AppResult<()> {
        if self
            .repository
            .find_role_by_key(actor.organization_id(), key)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!("role key '{key}' is already taken")));
        }

        Ok(())
    }
}

fn ensure_editable(role: &Role) -> AppResult<()> {
    if role.is_system || !role.is_editable {
        return Err(AppError::Validation(format!(
            "system role '{}' cannot be modified",
            role.key
        )));
    }

    Ok(())
}

fn build_grants(inputs: Vec<AddRolePermissionInput>) -> AppResult<Vec<RoleGrant>> {
    let mut seen = BTreeSet::new();
    inputs
        .into_iter()
        .map(|input| {
            if !seen.insert(input.permission) {
                return Err(AppError::Validation(format!(
                    "permission '{}' is listed more than once",
                    input.permission
                )));
            }
            RoleGrant::new(input.permission, input.conditions, input.scope)
        })
        .collect()
}
