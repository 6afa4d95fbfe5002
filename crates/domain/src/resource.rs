//! Resource-type allow-list and authorization targets.
//!
//! Stored grants reference resource types by name. Those names are only ever
//! looked up in [`ResourceType::from_name`]; nothing turns a string into a
//! live type any other way.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use tasklane_core::{AppError, AppResult, OrganizationId, UserId};

use crate::Action;

/// Resource types that roles, delegations and overrides may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// The tenant itself.
    Organization,
    /// A user's membership in an organization.
    Membership,
    /// A role definition.
    Role,
    /// A project grouping sprints and tasks.
    Project,
    /// A time-boxed sprint.
    Sprint,
    /// A task.
    Task,
    /// A tracked pomodoro session.
    PomodoroSession,
    /// A comment on a task.
    Comment,
    /// A dashboard.
    Dashboard,
    /// An in-app notification.
    Notification,
    /// A service offered by the organization.
    Service,
    /// The organization audit trail.
    AuditLog,
}

/// Instance fields that identify who owns a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerField {
    /// Member the resource is assigned to.
    AssigneeId,
    /// Member that created the resource.
    CreatedById,
    /// Member the resource belongs to.
    UserId,
    /// Member that owns the resource.
    OwnerId,
}

impl OwnerField {
    /// Returns the attribute name of the field.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssigneeId => "assignee_id",
            Self::CreatedById => "created_by_id",
            Self::UserId => "user_id",
            Self::OwnerId => "owner_id",
        }
    }
}

const BASE_ACTIONS: &[Action] = &[
    Action::Read,
    Action::Create,
    Action::Update,
    Action::Destroy,
    Action::Manage,
];

impl ResourceType {
    /// Returns all allow-listed resource types.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[ResourceType] = &[
            ResourceType::Organization,
            ResourceType::Membership,
            ResourceType::Role,
            ResourceType::Project,
            ResourceType::Sprint,
            ResourceType::Task,
            ResourceType::PomodoroSession,
            ResourceType::Comment,
            ResourceType::Dashboard,
            ResourceType::Notification,
            ResourceType::Service,
            ResourceType::AuditLog,
        ];

        ALL
    }

    /// Returns the stable storage name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Membership => "membership",
            Self::Role => "role",
            Self::Project => "project",
            Self::Sprint => "sprint",
            Self::Task => "task",
            Self::PomodoroSession => "pomodoro_session",
            Self::Comment => "comment",
            Self::Dashboard => "dashboard",
            Self::Notification => "notification",
            Self::Service => "service",
            Self::AuditLog => "audit_log",
        }
    }

    /// Returns the class-style name used by older stored grants.
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Organization => "Organization",
            Self::Membership => "Membership",
            Self::Role => "Role",
            Self::Project => "Project",
            Self::Sprint => "Sprint",
            Self::Task => "Task",
            Self::PomodoroSession => "PomodoroSession",
            Self::Comment => "Comment",
            Self::Dashboard => "Dashboard",
            Self::Notification => "Notification",
            Self::Service => "Service",
            Self::AuditLog => "AuditLog",
        }
    }

    /// Looks a name up in the allow-list.
    ///
    /// Accepts either the storage name or the class-style name. Anything else
    /// returns `None`.
    #[must_use]
    pub fn from_name(value: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|resource_type| {
                resource_type.as_str() == value || resource_type.class_name() == value
            })
    }

    /// Parses a transport value, failing with a validation error.
    pub fn from_transport(value: &str) -> AppResult<Self> {
        Self::from_name(value).ok_or_else(|| {
            AppError::Validation(format!("resource type '{value}' is not allowed"))
        })
    }

    /// Returns the actions the permission catalog defines for this type.
    #[must_use]
    pub fn supported_actions(&self) -> Vec<Action> {
        let mut actions = BASE_ACTIONS.to_vec();
        match self {
            Self::Membership => {
                actions.extend([Action::ChangeRole, Action::ToggleActive, Action::Invite]);
            }
            Self::Task => actions.push(Action::Assign),
            Self::AuditLog => actions.push(Action::Export),
            _ => {}
        }
        actions
    }

    /// Returns the instance fields that identify the owner of this type.
    #[must_use]
    pub fn owner_fields(&self) -> &'static [OwnerField] {
        match self {
            Self::Task => &[OwnerField::AssigneeId, OwnerField::CreatedById],
            Self::Project | Self::Sprint => &[OwnerField::OwnerId, OwnerField::CreatedById],
            Self::PomodoroSession
            | Self::Comment
            | Self::Dashboard
            | Self::Notification
            | Self::Membership => &[OwnerField::UserId],
            Self::Organization | Self::Role | Self::Service | Self::AuditLog => {
                &[OwnerField::CreatedById]
            }
        }
    }
}

impl Display for ResourceType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Concrete resource instance evaluated by a rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInstance {
    resource_type: ResourceType,
    resource_id: String,
    organization_id: OrganizationId,
    owners: BTreeMap<OwnerField, UserId>,
    team_id: Option<String>,
    service_id: Option<String>,
    role_key: Option<String>,
    active: bool,
}

impl ResourceInstance {
    /// Creates an instance of `resource_type` owned by `organization_id`.
    #[must_use]
    pub fn new(
        resource_type: ResourceType,
        resource_id: impl Into<String>,
        organization_id: OrganizationId,
    ) -> Self {
        Self {
            resource_type,
            resource_id: resource_id.into(),
            organization_id,
            owners: BTreeMap::new(),
            team_id: None,
            service_id: None,
            role_key: None,
            active: true,
        }
    }

    /// Creates the instance representing an organization.
    #[must_use]
    pub fn organization(organization_id: OrganizationId, active: bool) -> Self {
        let mut instance = Self::new(
            ResourceType::Organization,
            organization_id.to_string(),
            organization_id,
        );
        instance.active = active;
        instance
    }

    /// Creates the instance representing a membership holding `role_key`.
    #[must_use]
    pub fn membership(
        organization_id: OrganizationId,
        user_id: UserId,
        role_key: impl Into<String>,
    ) -> Self {
        Self::new(ResourceType::Membership, user_id.to_string(), organization_id)
            .with_owner(OwnerField::UserId, user_id)
            .with_role_key(role_key)
    }

    /// Records an ownership attribute.
    #[must_use]
    pub fn with_owner(mut self, field: OwnerField, user_id: UserId) -> Self {
        self.owners.insert(field, user_id);
        self
    }

    /// Records the team the instance belongs to.
    #[must_use]
    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    /// Records the service the instance belongs to.
    #[must_use]
    pub fn with_service(mut self, service_id: impl Into<String>) -> Self {
        self.service_id = Some(service_id.into());
        self
    }

    /// Records the role key held by a membership instance.
    #[must_use]
    pub fn with_role_key(mut self, role_key: impl Into<String>) -> Self {
        self.role_key = Some(role_key.into());
        self
    }

    /// Returns the resource type.
    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Returns the resource identifier.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        self.resource_id.as_str()
    }

    /// Returns the organization the instance belongs to.
    #[must_use]
    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    /// Returns the user stored in an ownership attribute.
    #[must_use]
    pub fn owner(&self, field: OwnerField) -> Option<UserId> {
        self.owners.get(&field).copied()
    }

    /// Returns the team identifier.
    #[must_use]
    pub fn team_id(&self) -> Option<&str> {
        self.team_id.as_deref()
    }

    /// Returns the service identifier; a service is its own scope.
    #[must_use]
    pub fn service_id(&self) -> Option<&str> {
        match (&self.service_id, self.resource_type) {
            (Some(service_id), _) => Some(service_id.as_str()),
            (None, ResourceType::Service) => Some(self.resource_id.as_str()),
            (None, _) => None,
        }
    }

    /// Returns the role key held by a membership instance.
    #[must_use]
    pub fn role_key(&self) -> Option<&str> {
        self.role_key.as_deref()
    }

    /// Returns whether the instance is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Target of an authorization check: a whole resource class or one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthorizationTarget {
    /// Class-level check ("may the actor update tasks at all?").
    Class {
        /// Resource type being checked.
        resource_type: ResourceType,
    },
    /// Instance-level check.
    Instance(ResourceInstance),
}

impl AuthorizationTarget {
    /// Returns the resource type of the target.
    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Class { resource_type } => *resource_type,
            Self::Instance(instance) => instance.resource_type(),
        }
    }

    /// Returns the instance, when the target is one.
    #[must_use]
    pub fn instance(&self) -> Option<&ResourceInstance> {
        match self {
            Self::Class { .. } => None,
            Self::Instance(instance) => Some(instance),
        }
    }
}

impl From<ResourceType> for AuthorizationTarget {
    fn from(resource_type: ResourceType) -> Self {
        Self::Class { resource_type }
    }
}

impl From<ResourceInstance> for AuthorizationTarget {
    fn from(instance: ResourceInstance) -> Self {
        Self::Instance(instance)
    }
}

#[cfg(test)]
mod tests {
    use tasklane_core::{OrganizationId, UserId};

    use super::{OwnerField, ResourceInstance, ResourceType};

    #[test]
    fn allow_list_accepts_storage_and_class_names() {
        assert_eq!(
            ResourceType::from_name("pomodoro_session"),
            Some(ResourceType::PomodoroSession)
        );
        assert_eq!(
            ResourceType::from_name("PomodoroSession"),
            Some(ResourceType::PomodoroSession)
        );
    }

    #[test]
    fn allow_list_rejects_everything_else() {
        for value in ["", "Kernel", "::Task", "task ", "TASK", "User", "Object.const_get"] {
            assert_eq!(ResourceType::from_name(value), None, "{value}");
        }
        assert!(ResourceType::from_transport("Kernel").is_err());
    }

    #[test]
    fn service_instance_is_its_own_scope() {
        let organization_id = OrganizationId::new();
        let service = ResourceInstance::new(ResourceType::Service, "svc-1", organization_id);
        assert_eq!(service.service_id(), Some("svc-1"));

        let task = ResourceInstance::new(ResourceType::Task, "42", organization_id);
        assert_eq!(task.service_id(), None);
    }

    #[test]
    fn membership_instance_carries_owner_and_role_key() {
        let organization_id = OrganizationId::new();
        let user_id = UserId::new();
        let membership = ResourceInstance::membership(organization_id, user_id, "owner");

        assert_eq!(membership.owner(OwnerField::UserId), Some(user_id));
        assert_eq!(membership.role_key(), Some("owner"));
    }

    #[test]
    fn membership_supports_role_management_actions() {
        let actions = ResourceType::Membership.supported_actions();
        assert!(actions.contains(&crate::Action::ChangeRole));
        assert!(!ResourceType::Project.supported_actions().contains(&crate::Action::ChangeRole));
    }
}
