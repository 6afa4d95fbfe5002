use serde::{Deserialize, Serialize};
use tasklane_core::{OrganizationId, UserId};

use crate::{LegacyRole, RoleId};

/// The authoritative role representation of a membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MembershipRole {
    /// Fixed role name stored directly on the membership.
    Legacy(LegacyRole),
    /// Reference to a role definition.
    Dynamic(RoleId),
}

/// An actor's membership in one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Member user.
    pub user_id: UserId,
    /// Organization joined.
    pub organization_id: OrganizationId,
    /// Inactive memberships resolve like non-members.
    pub active: bool,
    /// Role held by the member.
    pub role: MembershipRole,
}

impl Membership {
    /// Returns whether the membership authorizes `user_id` inside `organization_id`.
    #[must_use]
    pub fn is_active_for(&self, user_id: UserId, organization_id: OrganizationId) -> bool {
        self.active && self.user_id == user_id && self.organization_id == organization_id
    }

    /// Returns the referenced role id for dynamic memberships.
    #[must_use]
    pub fn role_id(&self) -> Option<RoleId> {
        match self.role {
            MembershipRole::Dynamic(role_id) => Some(role_id),
            MembershipRole::Legacy(_) => None,
        }
    }
}
