use super::*;

use chrono::{DateTime, Utc};
use tasklane_domain::{
    DelegatedGrant, DelegationId, NewDelegation, Permission, PermissionDelegation,
    StoredPermission,
};

use crate::security_admin_ports::{CreateDelegationInput, DelegationQuery};

const DELEGATION_RESOURCE: &str = "delegation";

impl SecurityAdminService {
    /// Hands a role or permission subset to another member for a time window.
    pub async fn create_delegation(
        &self,
        actor: &ActorIdentity,
        input: CreateDelegationInput,
    ) -> AppResult<PermissionDelegation> {
        let delegator_priority = self.actor_priority(actor).await?;

        let grant = match (input.role_id, input.permissions.is_empty()) {
            (Some(_), false) => {
                return Err(AppError::Validation(
                    "delegation must carry either a role or permissions, not both".to_owned(),
                ));
            }
            (Some(role_id), true) => {
                let role = self.find_role(actor, role_id).await?;
                DelegatedGrant::Role {
                    role_id,
                    role_priority: role.priority,
                }
            }
            (None, _) => {
                self.ensure_holds_permissions(actor, &input.permissions)
                    .await?;
                DelegatedGrant::Permissions(
                    input
                        .permissions
                        .iter()
                        .copied()
                        .map(StoredPermission::from)
                        .collect(),
                )
            }
        };

        let delegatee_is_member = self
            .repository
            .find_membership(actor.organization_id(), input.delegatee_id)
            .await?
            .is_some_and(|membership| {
                membership.is_active_for(input.delegatee_id, actor.organization_id())
            });
        if !delegatee_is_member {
            return Err(AppError::Validation(format!(
                "user '{}' is not an active member of organization '{}'",
                input.delegatee_id,
                actor.organization_id()
            )));
        }

        let delegation = PermissionDelegation::create(
            NewDelegation {
                organization_id: actor.organization_id(),
                delegator_id: actor.user_id(),
                delegator_priority,
                delegatee_id: input.delegatee_id,
                grant,
                starts_at: input.starts_at,
                ends_at: input.ends_at,
                reason: input.reason,
            },
            self.clock.now(),
        )?;
        self.repository.create_delegation(&delegation).await?;
        self.authorization_service
            .invalidate_actor(actor.organization_id(), delegation.delegatee_id)
            .await;

        tracing::info!(
            organization_id = %delegation.organization_id,
            delegation_id = %delegation.id,
            delegator_id = %delegation.delegator_id,
            delegatee_id = %delegation.delegatee_id,
            "created delegation"
        );
        self.audit(
            actor,
            AuditAction::DelegationCreated,
            DELEGATION_RESOURCE,
            delegation.id.to_string(),
            format!(
                "delegated to '{}' until {}",
                delegation.delegatee_id,
                delegation.ends_at.to_rfc3339()
            ),
        )
        .await;

        Ok(delegation)
    }

    /// Revokes a delegation. Revocation is irreversible.
    pub async fn revoke_delegation(
        &self,
        actor: &ActorIdentity,
        delegation_id: DelegationId,
    ) -> AppResult<PermissionDelegation> {
        let mut delegation = self.find_managed_delegation(actor, delegation_id).await?;
        delegation.revoke(self.clock.now())?;
        self.repository.save_delegation(&delegation).await?;
        self.authorization_service
            .invalidate_actor(actor.organization_id(), delegation.delegatee_id)
            .await;

        self.audit(
            actor,
            AuditAction::DelegationRevoked,
            DELEGATION_RESOURCE,
            delegation.id.to_string(),
            format!("revoked delegation to '{}'", delegation.delegatee_id),
        )
        .await;

        Ok(delegation)
    }

    /// Pushes the end of a scheduled or active delegation later.
    pub async fn extend_delegation(
        &self,
        actor: &ActorIdentity,
        delegation_id: DelegationId,
        new_ends_at: DateTime<Utc>,
    ) -> AppResult<PermissionDelegation> {
        let mut delegation = self.find_managed_delegation(actor, delegation_id).await?;
        delegation.extend(new_ends_at, self.clock.now())?;
        self.repository.save_delegation(&delegation).await?;
        self.authorization_service
            .invalidate_actor(actor.organization_id(), delegation.delegatee_id)
            .await;

        self.audit(
            actor,
            AuditAction::DelegationExtended,
            DELEGATION_RESOURCE,
            delegation.id.to_string(),
            format!("extended delegation until {}", new_ends_at.to_rfc3339()),
        )
        .await;

        Ok(delegation)
    }

    /// Lists organization delegations.
    pub async fn list_delegations(
        &self,
        actor: &ActorIdentity,
        query: DelegationQuery,
    ) -> AppResult<Vec<PermissionDelegation>> {
        self.require(actor, Action::Read, ResourceType::Membership)
            .await?;

        let now = self.clock.now();
        let mut delegations = self
            .repository
            .list_delegations(actor.organization_id(), query.user_id)
            .await?;
        if query.active_only {
            delegations.retain(|delegation| delegation.is_active_at(now));
        }

        Ok(delegations)
    }

    async fn ensure_holds_permissions(
        &self,
        actor: &ActorIdentity,
        permissions: &[Permission],
    ) -> AppResult<()> {
        let rule_set = self
            .authorization_service
            .rule_set(Some(actor.user_id()), actor.organization_id())
            .await?;

        match permissions
            .iter()
            .find(|permission| !rule_set.grants_unconditionally(**permission))
        {
            Some(permission) => Err(AppError::Forbidden(format!(
                "cannot delegate '{permission}' without holding it"
            ))),
            None => Ok(()),
        }
    }

    /// Loads a delegation the actor delegated or may manage on behalf of others.
    async fn find_managed_delegation(
        &self,
        actor: &ActorIdentity,
        delegation_id: DelegationId,
    ) -> AppResult<PermissionDelegation> {
        let delegation = self
            .repository
            .find_delegation(actor.organization_id(), delegation_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("delegation '{delegation_id}' not found"))
            })?;

        if delegation.delegator_id != actor.user_id() {
            self.require(actor, Action::Manage, ResourceType::Membership)
                .await?;
        }

        Ok(delegation)
    }
}
