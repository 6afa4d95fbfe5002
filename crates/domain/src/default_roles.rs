//! System role templates seeded into every organization.
//!
//! Legacy memberships resolve through the same templates, so a membership
//! holding the fixed name `admin` and one referencing the seeded `admin` role
//! produce identical rules.

use crate::{
    Action, GrantConditions, GrantScope, LegacyRole, Permission, ResourceType, RoleGrant,
    RolePriority,
};

/// Priority of the seeded member role.
pub const MEMBER_PRIORITY: RolePriority = RolePriority::from_trusted(50);
/// Priority of the seeded viewer role.
pub const VIEWER_PRIORITY: RolePriority = RolePriority::from_trusted(10);

const MEMBER_CREATABLE: &[ResourceType] = &[
    ResourceType::Project,
    ResourceType::Sprint,
    ResourceType::Task,
    ResourceType::PomodoroSession,
    ResourceType::Comment,
    ResourceType::Dashboard,
    ResourceType::Notification,
];

/// Blueprint of a system role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleTemplate {
    legacy_role: LegacyRole,
}

impl RoleTemplate {
    /// Returns the legacy name the template stands for.
    #[must_use]
    pub fn legacy_role(&self) -> LegacyRole {
        self.legacy_role
    }

    /// Returns the role key seeded for the template.
    #[must_use]
    pub fn key(&self) -> &'static str {
        self.legacy_role.as_str()
    }

    /// Returns the display name seeded for the template.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self.legacy_role {
            LegacyRole::Owner => "Owner",
            LegacyRole::Admin => "Administrator",
            LegacyRole::Member => "Member",
            LegacyRole::Viewer => "Viewer",
        }
    }

    /// Returns the template priority.
    #[must_use]
    pub fn priority(&self) -> RolePriority {
        match self.legacy_role {
            LegacyRole::Owner => RolePriority::OWNER,
            LegacyRole::Admin => RolePriority::ADMIN,
            LegacyRole::Member => MEMBER_PRIORITY,
            LegacyRole::Viewer => VIEWER_PRIORITY,
        }
    }

    /// Returns the grants the template holds.
    #[must_use]
    pub fn grants(&self) -> Vec<RoleGrant> {
        match self.legacy_role {
            LegacyRole::Owner => every_type(Action::Manage),
            LegacyRole::Admin => admin_grants(),
            LegacyRole::Member => member_grants(),
            LegacyRole::Viewer => every_type(Action::Read),
        }
    }
}

impl LegacyRole {
    /// Returns the template backing this legacy role name.
    #[must_use]
    pub fn template(&self) -> RoleTemplate {
        RoleTemplate { legacy_role: *self }
    }
}

/// Returns the system role templates in seeding order.
#[must_use]
pub fn system_role_templates() -> Vec<RoleTemplate> {
    LegacyRole::all()
        .iter()
        .map(LegacyRole::template)
        .collect()
}

fn unconditional(resource_type: ResourceType, action: Action) -> RoleGrant {
    RoleGrant::unconditional(Permission::new(resource_type, action))
}

fn own_only(resource_type: ResourceType, action: Action) -> RoleGrant {
    RoleGrant {
        permission: Permission::new(resource_type, action).into(),
        conditions: GrantConditions {
            own_only: true,
            ..GrantConditions::default()
        },
        scope: GrantScope::default(),
    }
}

fn every_type(action: Action) -> Vec<RoleGrant> {
    ResourceType::all()
        .iter()
        .map(|resource_type| unconditional(*resource_type, action))
        .collect()
}

// Organization destroy and role definitions stay with the owner.
fn admin_grants() -> Vec<RoleGrant> {
    let mut grants: Vec<RoleGrant> = ResourceType::all()
        .iter()
        .filter(|resource_type| {
            !matches!(
                resource_type,
                ResourceType::Organization | ResourceType::Role
            )
        })
        .map(|resource_type| unconditional(*resource_type, Action::Manage))
        .collect();
    grants.push(unconditional(ResourceType::Organization, Action::Read));
    grants.push(unconditional(ResourceType::Organization, Action::Update));
    grants.push(unconditional(ResourceType::Role, Action::Read));
    grants
}

fn member_grants() -> Vec<RoleGrant> {
    let mut grants = every_type(Action::Read);
    grants.extend(
        MEMBER_CREATABLE
            .iter()
            .map(|resource_type| unconditional(*resource_type, Action::Create)),
    );
    grants.push(own_only(ResourceType::Task, Action::Update));
    grants.push(own_only(ResourceType::PomodoroSession, Action::Manage));
    grants
}
