//! Ability resolution: persisted grant sources in, ordered [`RuleSet`] out.
//!
//! Rules are appended layer by layer (guest, role grants, priority
//! escalation, delegations, instance overrides). Later layers win because
//! [`RuleSet`] evaluation scans most-recent-first.

use std::borrow::Cow;
use std::collections::BTreeSet;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tasklane_core::{OrganizationId, UserId};

use crate::{
    Action, LegacyRole, Membership, MembershipRole, PermissionDelegation, ResourcePermission,
    ResourceType, Role, RoleGrant, RolePriority, Rule, RuleCondition, RuleSet, RuleSource,
    RuleSubject,
};

/// Role key whose memberships are shielded from admin-level mutation.
pub const OWNER_ROLE_KEY: &str = "owner";

/// A delegation paired with the role it references, when it references one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatedAccess {
    /// Delegation record.
    pub delegation: PermissionDelegation,
    /// Delegated role definition, loaded alongside the delegation.
    pub role: Option<Role>,
}

/// Everything persisted about one actor in one organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSources {
    /// Membership of the actor, if any.
    pub membership: Option<Membership>,
    /// Role referenced by a dynamic membership.
    pub role: Option<Role>,
    /// Teams the actor belongs to.
    pub team_ids: BTreeSet<String>,
    /// Delegations where the actor is delegatee.
    pub delegations: Vec<DelegatedAccess>,
    /// Instance overrides issued to the actor.
    pub resource_permissions: Vec<ResourcePermission>,
}

impl GrantSources {
    /// Returns the priority of the actor's own membership role.
    ///
    /// Delegations never raise this value.
    #[must_use]
    pub fn effective_priority(
        &self,
        actor: UserId,
        organization_id: OrganizationId,
    ) -> Option<RolePriority> {
        self.base_role(actor, organization_id)
            .map(|base_role| base_role.priority)
    }

    fn base_role(
        &self,
        actor: UserId,
        organization_id: OrganizationId,
    ) -> Option<BaseRole<'_>> {
        let membership = self
            .membership
            .as_ref()
            .filter(|membership| membership.is_active_for(actor, organization_id))?;

        match membership.role {
            MembershipRole::Legacy(legacy_role) => Some(BaseRole::legacy(legacy_role)),
            MembershipRole::Dynamic(role_id) => {
                let role = self.role.as_ref().filter(|role| {
                    role.id == role_id && role.organization_id == organization_id
                });
                if role.is_none() {
                    tracing::warn!(
                        organization_id = %organization_id,
                        user_id = %actor,
                        role_id = %role_id,
                        "membership references a missing role; resolving as guest"
                    );
                }
                role.map(BaseRole::defined)
            }
        }
    }
}

struct BaseRole<'a> {
    priority: RolePriority,
    grants: Cow<'a, [RoleGrant]>,
}

impl<'a> BaseRole<'a> {
    fn legacy(legacy_role: LegacyRole) -> Self {
        let template = legacy_role.template();
        Self {
            priority: template.priority(),
            grants: Cow::Owned(template.grants()),
        }
    }

    fn defined(role: &'a Role) -> Self {
        Self {
            priority: role.priority,
            grants: Cow::Borrowed(role.grants.as_slice()),
        }
    }
}

/// Builds the rule set for `actor` in `organization_id` at `now`.
///
/// Pure function of its inputs: identical sources and clock yield an
/// identical rule set.
#[must_use]
pub fn resolve(
    actor: Option<UserId>,
    organization_id: OrganizationId,
    sources: &GrantSources,
    now: DateTime<Utc>,
) -> RuleSet {
    let Some(actor) = actor else {
        return guest_rule_set(organization_id);
    };
    let Some(base_role) = sources.base_role(actor, organization_id) else {
        return guest_rule_set(organization_id);
    };

    let mut builder = RuleBuilder {
        actor,
        organization_id,
        team_ids: &sources.team_ids,
        hour: now.hour(),
        rule_set: RuleSet::new(organization_id),
    };

    builder.append_role(&base_role, RuleSource::Role, RuleSource::Escalation);

    let mut delegations: Vec<&DelegatedAccess> = sources
        .delegations
        .iter()
        .filter(|access| {
            let delegation = &access.delegation;
            delegation.delegatee_id == actor
                && delegation.organization_id == organization_id
                && delegation.is_active_at(now)
        })
        .collect();
    delegations.sort_by_key(|access| (access.delegation.created_at, access.delegation.id));
    for access in delegations {
        builder.append_delegation(access);
    }

    let mut overrides: Vec<&ResourcePermission> = sources
        .resource_permissions
        .iter()
        .filter(|grant| {
            grant.user_id == actor
                && grant.organization_id == organization_id
                && grant.is_active_at(now)
        })
        .collect();
    overrides.sort_by_key(|grant| (grant.created_at, grant.id));
    for grant in overrides {
        builder.append_override(grant);
    }

    tracing::debug!(
        organization_id = %organization_id,
        user_id = %actor,
        rule_count = builder.rule_set.rules().len(),
        "resolved rule set"
    );

    builder.rule_set
}

/// Rule set for anonymous actors and non-members.
#[must_use]
pub fn guest_rule_set(organization_id: OrganizationId) -> RuleSet {
    let mut rule_set = RuleSet::new(organization_id);
    rule_set.push(
        Rule::grant(
            Action::Read,
            RuleSubject::Resource(ResourceType::Organization),
            RuleSource::Guest,
        )
        .when(RuleCondition::InOrganization { organization_id })
        .when(RuleCondition::OrganizationActive),
    );
    rule_set
}

struct RuleBuilder<'a> {
    actor: UserId,
    organization_id: OrganizationId,
    team_ids: &'a BTreeSet<String>,
    hour: u32,
    rule_set: RuleSet,
}

impl RuleBuilder<'_> {
    fn append_role(
        &mut self,
        role: &BaseRole<'_>,
        grant_source: RuleSource,
        escalation_source: RuleSource,
    ) {
        for grant in role.grants.iter() {
            self.append_grant(grant, grant_source);
        }
        self.append_escalation(role.priority, escalation_source);
    }

    fn append_grant(&mut self, grant: &RoleGrant, source: RuleSource) {
        let Some(permission) = grant.permission.resolve() else {
            tracing::warn!(
                organization_id = %self.organization_id,
                resource_type = %grant.permission.resource_type,
                action = %grant.permission.action,
                "skipping role grant outside the permission allow-list"
            );
            return;
        };

        let conditions = &grant.conditions;
        if conditions.time_restricted
            && !conditions
                .allowed_hours
                .is_some_and(|window| window.contains(self.hour))
        {
            return;
        }

        let resource_type = permission.resource_type();
        let mut rule = Rule::grant(
            permission.action(),
            RuleSubject::Resource(resource_type),
            source,
        );
        if conditions.own_only {
            rule = rule.when(RuleCondition::OwnedBy {
                fields: resource_type.owner_fields().to_vec(),
                user_id: self.actor,
            });
        }
        if conditions.team_only {
            rule = rule.when(RuleCondition::InTeamSet {
                team_ids: self.team_ids.clone(),
            });
        }
        if let Some(service_ids) = &grant.scope.service_ids {
            rule = rule.when(RuleCondition::InScopeList {
                service_ids: service_ids.iter().cloned().collect(),
            });
        }

        self.rule_set.push(rule);
    }

    fn append_escalation(&mut self, priority: RolePriority, source: RuleSource) {
        if priority.is_admin_level() {
            for action in [Action::ChangeRole, Action::ToggleActive, Action::Manage] {
                self.rule_set.push(
                    Rule::grant(
                        action,
                        RuleSubject::Resource(ResourceType::Membership),
                        source,
                    )
                    .when(RuleCondition::InOrganization {
                        organization_id: self.organization_id,
                    }),
                );
            }
            for action in [Action::Update, Action::Destroy, Action::ChangeRole] {
                self.rule_set.push(
                    Rule::deny(
                        action,
                        RuleSubject::Resource(ResourceType::Membership),
                        source,
                    )
                    .when(RuleCondition::TargetRoleKey {
                        role_key: OWNER_ROLE_KEY.to_owned(),
                    }),
                );
            }
        }

        if priority.is_owner_level() {
            self.rule_set
                .push(Rule::grant(Action::Manage, RuleSubject::All, source));
        }
    }

    fn append_delegation(&mut self, access: &DelegatedAccess) {
        let delegation = &access.delegation;
        match delegation.role_id {
            Some(role_id) => {
                let role = access.role.as_ref().filter(|role| {
                    role.id == role_id && role.organization_id == self.organization_id
                });
                match role {
                    Some(role) => self.append_role(
                        &BaseRole::defined(role),
                        RuleSource::Delegation,
                        RuleSource::Delegation,
                    ),
                    None => tracing::warn!(
                        organization_id = %self.organization_id,
                        delegation_id = %delegation.id,
                        role_id = %role_id,
                        "skipping delegation of a missing role"
                    ),
                }
            }
            None => {
                for stored in &delegation.permissions {
                    match stored.resolve() {
                        Some(permission) => self.rule_set.push(Rule::grant(
                            permission.action(),
                            RuleSubject::Resource(permission.resource_type()),
                            RuleSource::Delegation,
                        )),
                        None => tracing::warn!(
                            organization_id = %self.organization_id,
                            delegation_id = %delegation.id,
                            resource_type = %stored.resource_type,
                            action = %stored.action,
                            "skipping delegated permission outside the allow-list"
                        ),
                    }
                }
            }
        }
    }

    fn append_override(&mut self, grant: &ResourcePermission) {
        let Some((permission, resource_type)) = grant.resolve_target() else {
            tracing::warn!(
                organization_id = %self.organization_id,
                resource_permission_id = %grant.id,
                resource_type = %grant.resource_type,
                "skipping resource override outside the allow-list"
            );
            return;
        };

        let subject = RuleSubject::Resource(resource_type);
        let rule = if grant.granted {
            Rule::grant(permission.action(), subject, RuleSource::Override)
        } else {
            Rule::deny(permission.action(), subject, RuleSource::Override)
        };

        self.rule_set.push(
            rule.when(RuleCondition::InOrganization {
                organization_id: self.organization_id,
            })
            .when(RuleCondition::InstanceIs {
                resource_id: grant.resource_id.clone(),
            }),
        );
    }
}
