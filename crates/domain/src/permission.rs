use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tasklane_core::{AppError, AppResult};

use crate::{Action, ResourceType};

/// One (resource type, action) pair from the permission catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    resource_type: ResourceType,
    action: Action,
}

impl Permission {
    /// Creates a permission pair.
    #[must_use]
    pub fn new(resource_type: ResourceType, action: Action) -> Self {
        Self {
            resource_type,
            action,
        }
    }

    /// Returns the resource type.
    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Returns the action.
    #[must_use]
    pub fn action(&self) -> Action {
        self.action
    }

    /// Returns the stable storage key, e.g. `task.update`.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Returns whether the pair is part of the catalog.
    #[must_use]
    pub fn is_cataloged(&self) -> bool {
        self.resource_type.supported_actions().contains(&self.action)
    }

    /// Returns the concrete actions a grant of this permission unlocks.
    ///
    /// `manage` expands to every action the resource type supports.
    #[must_use]
    pub fn covered_actions(&self) -> Vec<Action> {
        if self.action == Action::Manage {
            self.resource_type.supported_actions()
        } else {
            vec![self.action]
        }
    }

    /// Returns every permission in the catalog.
    #[must_use]
    pub fn catalog() -> Vec<Self> {
        ResourceType::all()
            .iter()
            .flat_map(|resource_type| {
                resource_type
                    .supported_actions()
                    .into_iter()
                    .map(|action| Self::new(*resource_type, action))
            })
            .collect()
    }

    /// Parses a transport value into a cataloged permission.
    pub fn from_transport(value: &str) -> AppResult<Self> {
        Self::from_str(value)
    }
}

impl Display for Permission {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}.{}",
            self.resource_type.as_str(),
            self.action.as_str()
        )
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (resource_type, action) = value.rsplit_once('.').ok_or_else(|| {
            AppError::Validation(format!(
                "permission '{value}' must use the '<resource_type>.<action>' form"
            ))
        })?;

        let permission = Self::new(
            ResourceType::from_transport(resource_type)?,
            Action::from_str(action)?,
        );
        if !permission.is_cataloged() {
            return Err(AppError::Validation(format!(
                "permission '{value}' is not part of the catalog"
            )));
        }

        Ok(permission)
    }
}

/// Permission as persisted, before the resource-type allow-list check.
///
/// Persisted rows are read back as raw strings; [`StoredPermission::resolve`]
/// is the only way to turn them into a [`Permission`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoredPermission {
    /// Persisted resource type name.
    pub resource_type: String,
    /// Persisted action name.
    pub action: String,
}

impl StoredPermission {
    /// Creates a stored permission from raw persisted values.
    #[must_use]
    pub fn new(resource_type: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            action: action.into(),
        }
    }

    /// Resolves the raw values against the allow-list.
    ///
    /// Returns `None` for unknown resource types or actions.
    #[must_use]
    pub fn resolve(&self) -> Option<Permission> {
        let resource_type = ResourceType::from_name(self.resource_type.as_str())?;
        let action = Action::from_str(self.action.as_str()).ok()?;
        Some(Permission::new(resource_type, action))
    }
}

impl From<Permission> for StoredPermission {
    fn from(permission: Permission) -> Self {
        Self::new(
            permission.resource_type().as_str(),
            permission.action().as_str(),
        )
    }
}
