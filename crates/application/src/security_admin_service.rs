use std::sync::Arc;

use chrono::Duration;
use serde_json::{Map, Value};
use tasklane_core::{ActorIdentity, AppError, AppResult};
use tasklane_domain::{
    Action, AuditAction, AuthorizationTarget, MembershipRole, ResourceType, Role, RoleId,
    RolePriority,
};

use crate::{AuditLogger, AuditRecord, AuthorizationService, Clock, SecurityAdminRepository};

/// Application service for role, delegation and override administration.
#[derive(Clone)]
pub struct SecurityAdminService {
    authorization_service: AuthorizationService,
    repository: Arc<dyn SecurityAdminRepository>,
    audit_logger: AuditLogger,
    clock: Arc<dyn Clock>,
    default_resource_permission_expiry: Option<Duration>,
}

impl SecurityAdminService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        repository: Arc<dyn SecurityAdminRepository>,
        audit_logger: AuditLogger,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            authorization_service,
            repository,
            audit_logger,
            clock,
            default_resource_permission_expiry: None,
        }
    }

    /// Applies an expiry to resource overrides granted without one.
    #[must_use]
    pub fn with_default_resource_permission_expiry(mut self, expiry: Option<Duration>) -> Self {
        self.default_resource_permission_expiry = expiry;
        self
    }

    async fn require(
        &self,
        actor: &ActorIdentity,
        action: Action,
        target: impl Into<AuthorizationTarget>,
    ) -> AppResult<()> {
        self.authorization_service
            .require_permission(actor, action, &target.into())
            .await
    }

    async fn actor_priority(&self, actor: &ActorIdentity) -> AppResult<RolePriority> {
        self.authorization_service
            .effective_priority(actor.user_id(), actor.organization_id())
            .await?
            .ok_or_else(|| {
                AppError::Forbidden(format!(
                    "user '{}' is not an active member of organization '{}'",
                    actor.user_id(),
                    actor.organization_id()
                ))
            })
    }

    async fn ensure_within_ceiling(
        &self,
        actor: &ActorIdentity,
        priority: RolePriority,
    ) -> AppResult<()> {
        let actor_priority = self.actor_priority(actor).await?;
        if priority > actor_priority {
            return Err(AppError::Forbidden(format!(
                "priority {} exceeds own priority {}",
                priority.value(),
                actor_priority.value()
            )));
        }

        Ok(())
    }

    async fn find_role(&self, actor: &ActorIdentity, role_id: RoleId) -> AppResult<Role> {
        self.repository
            .find_role(actor.organization_id(), role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' not found")))
    }

    async fn membership_role_key(
        &self,
        actor: &ActorIdentity,
        role: MembershipRole,
    ) -> AppResult<String> {
        match role {
            MembershipRole::Legacy(legacy_role) => Ok(legacy_role.as_str().to_owned()),
            MembershipRole::Dynamic(role_id) => Ok(self
                .repository
                .find_role(actor.organization_id(), role_id)
                .await?
                .map(|role| role.key.as_str().to_owned())
                .unwrap_or_default()),
        }
    }

    async fn audit(
        &self,
        actor: &ActorIdentity,
        action: AuditAction,
        resource_type: &str,
        resource_id: String,
        detail: String,
    ) {
        let mut context = Map::new();
        context.insert("detail".to_owned(), Value::from(detail));

        self.audit_logger
            .record(AuditRecord {
                organization_id: actor.organization_id(),
                actor: Some(actor.user_id()),
                action: action.as_str().to_owned(),
                resource_type: Some(resource_type.to_owned()),
                resource_id: Some(resource_id),
                permitted: true,
                context,
                ip_address: actor.context().ip_address().map(str::to_owned),
                user_agent: actor.context().user_agent().map(str::to_owned),
            })
            .await;
    }
}

mod audit_log;
mod delegations;
mod resource_permissions;
mod roles;

pub use audit_log::{MAX_AUDIT_EXPORT_ROWS, MAX_AUDIT_PAGE_SIZE};

#[cfg(test)]
mod tests;
