//! Serializable grant/deny rules and their evaluation.
//!
//! A [`RuleSet`] is an ordered list. Evaluation scans it from the most
//! recently appended rule backwards and the first matching rule decides; when
//! nothing matches the verdict is deny.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tasklane_core::{OrganizationId, UserId};

use crate::{
    Action, AuthorizationTarget, OwnerField, Permission, ResourceInstance, ResourceType,
};

/// Whether a rule permits or forbids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Permit the action.
    Grant,
    /// Forbid the action.
    Deny,
}

/// Resource types a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "resource_type", rename_all = "snake_case")]
pub enum RuleSubject {
    /// Every resource type.
    All,
    /// One resource type.
    Resource(ResourceType),
}

impl RuleSubject {
    fn matches(&self, resource_type: ResourceType) -> bool {
        match self {
            Self::All => true,
            Self::Resource(subject) => *subject == resource_type,
        }
    }
}

/// Instance predicate attached to a rule. All conditions of a rule must hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCondition {
    /// One of `fields` holds `user_id`.
    OwnedBy {
        /// Ownership fields checked on the instance.
        fields: Vec<OwnerField>,
        /// Expected owner.
        user_id: UserId,
    },
    /// The instance team is one of `team_ids`.
    InTeamSet {
        /// Teams the actor belongs to.
        team_ids: BTreeSet<String>,
    },
    /// The instance service is one of `service_ids`.
    InScopeList {
        /// Allowed service ids.
        service_ids: BTreeSet<String>,
    },
    /// The instance id equals `resource_id`.
    InstanceIs {
        /// Exact instance id.
        resource_id: String,
    },
    /// The instance belongs to `organization_id`.
    InOrganization {
        /// Expected organization.
        organization_id: OrganizationId,
    },
    /// The instance is an active organization.
    OrganizationActive,
    /// The instance is a membership holding `role_key`.
    TargetRoleKey {
        /// Role key held by the membership.
        role_key: String,
    },
}

impl RuleCondition {
    fn matches(&self, instance: &ResourceInstance) -> bool {
        match self {
            Self::OwnedBy { fields, user_id } => fields
                .iter()
                .any(|field| instance.owner(*field) == Some(*user_id)),
            Self::InTeamSet { team_ids } => instance
                .team_id()
                .is_some_and(|team_id| team_ids.contains(team_id)),
            Self::InScopeList { service_ids } => instance
                .service_id()
                .is_some_and(|service_id| service_ids.contains(service_id)),
            Self::InstanceIs { resource_id } => instance.resource_id() == resource_id,
            Self::InOrganization { organization_id } => {
                instance.organization_id() == *organization_id
            }
            Self::OrganizationActive => {
                instance.resource_type() == ResourceType::Organization && instance.is_active()
            }
            Self::TargetRoleKey { role_key } => instance.role_key() == Some(role_key.as_str()),
        }
    }
}

/// Grant source layer that appended a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    /// Guest capability for non-members.
    Guest,
    /// Grants of the member's role.
    Role,
    /// Priority-based escalation of the member's role.
    Escalation,
    /// Grants received through a delegation.
    Delegation,
    /// Per-instance resource override.
    Override,
}

impl RuleSource {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Role => "role",
            Self::Escalation => "escalation",
            Self::Delegation => "delegation",
            Self::Override => "override",
        }
    }
}

/// One grant or deny rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    /// Grant or deny.
    pub effect: Effect,
    /// Action the rule covers; `manage` covers all actions.
    pub action: Action,
    /// Resource types the rule covers.
    pub subject: RuleSubject,
    /// Instance predicates; empty means unconditional.
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    /// Layer that produced the rule.
    pub source: RuleSource,
}

impl Rule {
    /// Creates an unconditional grant.
    #[must_use]
    pub fn grant(action: Action, subject: RuleSubject, source: RuleSource) -> Self {
        Self {
            effect: Effect::Grant,
            action,
            subject,
            conditions: Vec::new(),
            source,
        }
    }

    /// Creates an unconditional denial.
    #[must_use]
    pub fn deny(action: Action, subject: RuleSubject, source: RuleSource) -> Self {
        Self {
            effect: Effect::Deny,
            ..Self::grant(action, subject, source)
        }
    }

    /// Adds a condition.
    #[must_use]
    pub fn when(mut self, condition: RuleCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Returns whether the rule decides `action` on `target`.
    ///
    /// For class-level targets a conditional grant matches (some instance may
    /// be permitted) and a conditional denial does not (it only excludes some
    /// instances).
    #[must_use]
    pub fn matches(&self, action: Action, target: &AuthorizationTarget) -> bool {
        if !self.action.covers(action) || !self.subject.matches(target.resource_type()) {
            return false;
        }

        match target.instance() {
            Some(instance) => self
                .conditions
                .iter()
                .all(|condition| condition.matches(instance)),
            None => self.conditions.is_empty() || self.effect == Effect::Grant,
        }
    }
}

/// Verdict of an explained authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    /// Final verdict.
    pub permitted: bool,
    /// Layer of the deciding rule; `None` when the default deny applied.
    pub matching_rule_source: Option<RuleSource>,
}

impl Explanation {
    fn default_deny() -> Self {
        Self {
            permitted: false,
            matching_rule_source: None,
        }
    }
}

/// Ordered rules resolved for one actor in one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    organization_id: OrganizationId,
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Creates an empty rule set for `organization_id`.
    #[must_use]
    pub fn new(organization_id: OrganizationId) -> Self {
        Self {
            organization_id,
            rules: Vec::new(),
        }
    }

    /// Returns the organization the rules were resolved for.
    #[must_use]
    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    /// Returns the rules in append order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        self.rules.as_slice()
    }

    /// Appends a rule; later rules take precedence.
    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Returns whether `action` on `target` is permitted.
    #[must_use]
    pub fn permits(&self, action: Action, target: &AuthorizationTarget) -> bool {
        self.explain(action, target).permitted
    }

    /// Evaluates `action` on `target` and reports the deciding layer.
    #[must_use]
    pub fn explain(&self, action: Action, target: &AuthorizationTarget) -> Explanation {
        if target
            .instance()
            .is_some_and(|instance| instance.organization_id() != self.organization_id)
        {
            return Explanation::default_deny();
        }

        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matches(action, target))
            .map(|rule| Explanation {
                permitted: rule.effect == Effect::Grant,
                matching_rule_source: Some(rule.source),
            })
            .unwrap_or_else(Explanation::default_deny)
    }

    /// Returns the cataloged permissions granted at class level.
    #[must_use]
    pub fn capabilities(&self) -> Vec<Permission> {
        Permission::catalog()
            .into_iter()
            .filter(|permission| {
                self.permits(
                    permission.action(),
                    &AuthorizationTarget::from(permission.resource_type()),
                )
            })
            .collect()
    }

    /// Returns whether `permission` is held on every instance of its type.
    ///
    /// Conditional grants do not count, and any later denial of a covered
    /// action, conditional or not, withdraws the permission.
    #[must_use]
    pub fn grants_unconditionally(&self, permission: Permission) -> bool {
        let resource_type = permission.resource_type();
        permission.covered_actions().into_iter().all(|action| {
            self.rules
                .iter()
                .rev()
                .filter(|rule| rule.action.covers(action) && rule.subject.matches(resource_type))
                .find(|rule| rule.effect == Effect::Deny || rule.conditions.is_empty())
                .is_some_and(|rule| rule.effect == Effect::Grant)
        })
    }
}
