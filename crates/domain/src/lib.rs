//! Authorization domain: permission catalog, roles, delegations, resource
//! overrides and the rule sets resolved from them.

#![forbid(unsafe_code)]

mod ability;
mod action;
mod audit;
mod default_roles;
mod delegation;
mod membership;
mod permission;
mod resource;
mod resource_permission;
mod role;
mod rule;

pub use ability::{DelegatedAccess, GrantSources, OWNER_ROLE_KEY, guest_rule_set, resolve};
pub use action::Action;
pub use audit::AuditAction;
pub use default_roles::{MEMBER_PRIORITY, RoleTemplate, VIEWER_PRIORITY, system_role_templates};
pub use delegation::{
    DelegatedGrant, DelegationId, DelegationStatus, NewDelegation, PermissionDelegation,
};
pub use membership::{Membership, MembershipRole};
pub use permission::{Permission, StoredPermission};
pub use resource::{AuthorizationTarget, OwnerField, ResourceInstance, ResourceType};
pub use resource_permission::{
    NewResourcePermission, ResourcePermission, ResourcePermissionId, ResourcePermissionStatus,
};
pub use role::{
    GrantConditions, GrantScope, HourWindow, LegacyRole, Role, RoleGrant, RoleId, RoleKey,
    RolePriority,
};
pub use rule::{Effect, Explanation, Rule, RuleCondition, RuleSet, RuleSource, RuleSubject};
