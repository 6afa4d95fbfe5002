use std::sync::Arc;

use serde_json::{Map, Value};
use tasklane_core::{ActorIdentity, AppError, AppResult, OrganizationId, RequestContext, UserId};
use tasklane_domain::{
    Action, AuthorizationTarget, DelegatedAccess, Explanation, GrantSources, Permission,
    RolePriority, RuleSet, guest_rule_set, resolve,
};

use crate::{AuditLogger, AuditRecord, AuthorizationRepository, CapabilityCache, Clock};

/// Default lifetime of a cached rule set.
pub const DEFAULT_CAPABILITY_CACHE_TTL_SECONDS: u32 = 300;
/// Upper bound on the cached rule set lifetime.
pub const MAX_CAPABILITY_CACHE_TTL_SECONDS: u32 = 600;

/// Application service for organization-scoped authorization decisions.
#[derive(Clone)]
pub struct AuthorizationService {
    repository: Arc<dyn AuthorizationRepository>,
    clock: Arc<dyn Clock>,
    audit_logger: Option<AuditLogger>,
    capability_cache: Option<Arc<dyn CapabilityCache>>,
    capability_cache_ttl_seconds: u32,
}

impl AuthorizationService {
    /// Creates a new authorization service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn AuthorizationRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            audit_logger: None,
            capability_cache: None,
            capability_cache_ttl_seconds: 0,
        }
    }

    /// Records audited decisions through the logger.
    #[must_use]
    pub fn with_audit_logger(mut self, audit_logger: AuditLogger) -> Self {
        self.audit_logger = Some(audit_logger);
        self
    }

    /// Caches resolved rule sets; the ttl is clamped to the allowed maximum.
    #[must_use]
    pub fn with_capability_cache(
        mut self,
        capability_cache: Arc<dyn CapabilityCache>,
        ttl_seconds: u32,
    ) -> Self {
        self.capability_cache = Some(capability_cache);
        self.capability_cache_ttl_seconds = ttl_seconds.min(MAX_CAPABILITY_CACHE_TTL_SECONDS);
        self
    }

    /// Returns whether the actor may perform `action` on the target.
    pub async fn authorize(
        &self,
        actor: Option<UserId>,
        organization_id: OrganizationId,
        action: Action,
        target: &AuthorizationTarget,
    ) -> AppResult<bool> {
        Ok(self
            .rule_set(actor, organization_id)
            .await?
            .permits(action, target))
    }

    /// Returns the verdict together with the layer that produced it.
    pub async fn explain(
        &self,
        actor: Option<UserId>,
        organization_id: OrganizationId,
        action: Action,
        target: &AuthorizationTarget,
    ) -> AppResult<Explanation> {
        Ok(self
            .rule_set(actor, organization_id)
            .await?
            .explain(action, target))
    }

    /// Decides like [`Self::explain`] and records the verdict in the audit log.
    pub async fn decide(
        &self,
        actor: Option<UserId>,
        organization_id: OrganizationId,
        action: Action,
        target: &AuthorizationTarget,
        context: &RequestContext,
    ) -> AppResult<Explanation> {
        let explanation = self.explain(actor, organization_id, action, target).await?;
        self.record_decision(actor, organization_id, action, target, explanation, context)
            .await;
        Ok(explanation)
    }

    /// Ensures the actor may perform `action` on the target.
    pub async fn require_permission(
        &self,
        actor: &ActorIdentity,
        action: Action,
        target: &AuthorizationTarget,
    ) -> AppResult<()> {
        let explanation = self
            .explain(
                Some(actor.user_id()),
                actor.organization_id(),
                action,
                target,
            )
            .await?;

        if explanation.permitted {
            return Ok(());
        }

        self.record_decision(
            Some(actor.user_id()),
            actor.organization_id(),
            action,
            target,
            explanation,
            actor.context(),
        )
        .await;

        Err(AppError::Forbidden(format!(
            "user '{}' may not {} {} in organization '{}'",
            actor.user_id(),
            action,
            target.resource_type(),
            actor.organization_id()
        )))
    }

    /// Returns every catalog permission granted at class level.
    pub async fn capabilities(
        &self,
        actor: Option<UserId>,
        organization_id: OrganizationId,
    ) -> AppResult<Vec<Permission>> {
        Ok(self
            .rule_set(actor, organization_id)
            .await?
            .capabilities())
    }

    /// Returns the priority of the actor's own membership role.
    pub async fn effective_priority(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> AppResult<Option<RolePriority>> {
        Ok(self
            .grant_sources(user_id, organization_id)
            .await?
            .effective_priority(user_id, organization_id))
    }

    /// Resolves the rule set, serving it from the capability cache when possible.
    pub async fn rule_set(
        &self,
        actor: Option<UserId>,
        organization_id: OrganizationId,
    ) -> AppResult<RuleSet> {
        let Some(user_id) = actor else {
            return Ok(guest_rule_set(organization_id));
        };

        if let Some(rule_set) = self.cached_rule_set(organization_id, user_id).await {
            return Ok(rule_set);
        }

        let sources = self.grant_sources(user_id, organization_id).await?;
        let rule_set = resolve(Some(user_id), organization_id, &sources, self.clock.now());

        if self.capability_cache_ttl_seconds > 0
            && let Some(cache) = &self.capability_cache
            && let Err(error) = cache
                .set_rule_set(
                    organization_id,
                    user_id,
                    &rule_set,
                    self.capability_cache_ttl_seconds,
                )
                .await
        {
            tracing::warn!(
                organization_id = %organization_id,
                user_id = %user_id,
                error = %error,
                "failed to cache rule set"
            );
        }

        Ok(rule_set)
    }

    /// Drops cached rule sets of one actor.
    pub async fn invalidate_actor(&self, organization_id: OrganizationId, user_id: UserId) {
        if let Some(cache) = &self.capability_cache
            && let Err(error) = cache.invalidate_actor(organization_id, user_id).await
        {
            tracing::warn!(
                organization_id = %organization_id,
                user_id = %user_id,
                error = %error,
                "failed to invalidate cached rule set"
            );
        }
    }

    /// Drops cached rule sets of every actor in the organization.
    pub async fn invalidate_organization(&self, organization_id: OrganizationId) {
        if let Some(cache) = &self.capability_cache
            && let Err(error) = cache.invalidate_organization(organization_id).await
        {
            tracing::warn!(
                organization_id = %organization_id,
                error = %error,
                "failed to invalidate cached rule sets"
            );
        }
    }

    async fn cached_rule_set(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Option<RuleSet> {
        if self.capability_cache_ttl_seconds == 0 {
            return None;
        }
        let cache = self.capability_cache.as_ref()?;

        match cache.get_rule_set(organization_id, user_id).await {
            Ok(rule_set) => rule_set,
            Err(error) => {
                tracing::warn!(
                    organization_id = %organization_id,
                    user_id = %user_id,
                    error = %error,
                    "failed to read cached rule set"
                );
                None
            }
        }
    }

    async fn grant_sources(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> AppResult<GrantSources> {
        let Some(membership) = self
            .repository
            .find_membership(organization_id, user_id)
            .await?
        else {
            return Ok(GrantSources::default());
        };

        let role = match membership.role_id() {
            Some(role_id) => self.repository.find_role(organization_id, role_id).await?,
            None => None,
        };

        let mut delegations = Vec::new();
        for delegation in self
            .repository
            .list_delegations_for_delegatee(organization_id, user_id)
            .await?
        {
            let role = match delegation.role_id {
                Some(role_id) => self.repository.find_role(organization_id, role_id).await?,
                None => None,
            };
            delegations.push(DelegatedAccess { delegation, role });
        }

        Ok(GrantSources {
            membership: Some(membership),
            role,
            team_ids: self
                .repository
                .list_team_ids(organization_id, user_id)
                .await?,
            delegations,
            resource_permissions: self
                .repository
                .list_resource_permissions_for_user(organization_id, user_id)
                .await?,
        })
    }

    async fn record_decision(
        &self,
        actor: Option<UserId>,
        organization_id: OrganizationId,
        action: Action,
        target: &AuthorizationTarget,
        explanation: Explanation,
        context: &RequestContext,
    ) {
        let Some(audit_logger) = &self.audit_logger else {
            return;
        };

        let mut details = Map::new();
        details.insert(
            "matching_rule_source".to_owned(),
            explanation
                .matching_rule_source
                .map_or(Value::Null, |source| Value::from(source.as_str())),
        );

        audit_logger
            .record(AuditRecord {
                organization_id,
                actor,
                action: action.as_str().to_owned(),
                resource_type: Some(target.resource_type().as_str().to_owned()),
                resource_id: target
                    .instance()
                    .map(|instance| instance.resource_id().to_owned()),
                permitted: explanation.permitted,
                context: details,
                ip_address: context.ip_address().map(str::to_owned),
                user_agent: context.user_agent().map(str::to_owned),
            })
            .await;
    }
}
