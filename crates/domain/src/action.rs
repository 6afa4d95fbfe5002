use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tasklane_core::AppError;

/// Actions that can be granted or denied on a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Read a resource.
    Read,
    /// Create a resource.
    Create,
    /// Update a resource.
    Update,
    /// Delete a resource.
    Destroy,
    /// Wildcard action matching every other action.
    Manage,
    /// Change the role held by a membership.
    ChangeRole,
    /// Activate or deactivate a membership.
    ToggleActive,
    /// Invite a new member into the organization.
    Invite,
    /// Assign a task to a member.
    Assign,
    /// Export data out of the organization.
    Export,
}

impl Action {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Destroy => "destroy",
            Self::Manage => "manage",
            Self::ChangeRole => "change_role",
            Self::ToggleActive => "toggle_active",
            Self::Invite => "invite",
            Self::Assign => "assign",
            Self::Export => "export",
        }
    }

    /// Returns all known actions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Action] = &[
            Action::Read,
            Action::Create,
            Action::Update,
            Action::Destroy,
            Action::Manage,
            Action::ChangeRole,
            Action::ToggleActive,
            Action::Invite,
            Action::Assign,
            Action::Export,
        ];

        ALL
    }

    /// Returns whether a rule carrying this action applies to `requested`.
    #[must_use]
    pub fn covers(&self, requested: Action) -> bool {
        *self == Self::Manage || *self == requested
    }
}

impl Display for Action {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown action '{value}'")))
    }
}
