use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tasklane_core::{AppError, AppResult, NonEmptyString, OrganizationId, uuid_identifier};

use crate::{Permission, StoredPermission};

uuid_identifier!(
    /// Identifier of a role definition.
    RoleId
);

const ROLE_KEY_MAX_LENGTH: usize = 50;

/// Role key, unique per organization.
///
/// Lowercase ASCII letters, digits and underscores, starting with a letter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleKey(String);

impl RoleKey {
    /// Creates a validated role key.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.is_empty() || value.len() > ROLE_KEY_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "role key must be between 1 and {ROLE_KEY_MAX_LENGTH} characters"
            )));
        }

        if !value.starts_with(|character: char| character.is_ascii_lowercase()) {
            return Err(AppError::Validation(format!(
                "role key '{value}' must start with a lowercase letter"
            )));
        }

        if !value.chars().all(|character| {
            character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_'
        }) {
            return Err(AppError::Validation(format!(
                "role key '{value}' may only contain lowercase letters, digits and underscores"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for RoleKey {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoleKey> for String {
    fn from(value: RoleKey) -> Self {
        value.0
    }
}

impl Display for RoleKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Monotonic authority level of a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u16")]
pub struct RolePriority(u16);

impl RolePriority {
    /// Lowest admin-level priority.
    pub const ADMIN: Self = Self(80);
    /// Lowest owner-level priority; full, unconditional authority.
    pub const OWNER: Self = Self(100);
    /// Highest accepted priority.
    pub const MAX: Self = Self(1000);

    /// Creates a validated priority.
    pub fn new(value: i64) -> AppResult<Self> {
        if value < 0 {
            return Err(AppError::Validation(format!(
                "role priority must not be negative, got {value}"
            )));
        }

        u16::try_from(value)
            .ok()
            .filter(|value| *value <= Self::MAX.0)
            .map(Self)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "role priority must not exceed {}, got {value}",
                    Self::MAX.0
                ))
            })
    }

    pub(crate) const fn from_trusted(value: u16) -> Self {
        Self(value)
    }

    /// Returns the raw priority value.
    #[must_use]
    pub fn value(&self) -> u16 {
        self.0
    }

    /// Returns whether the priority grants admin-level escalation.
    #[must_use]
    pub fn is_admin_level(&self) -> bool {
        *self >= Self::ADMIN
    }

    /// Returns whether the priority grants owner-level authority.
    #[must_use]
    pub fn is_owner_level(&self) -> bool {
        *self >= Self::OWNER
    }
}

impl TryFrom<i64> for RolePriority {
    type Error = AppError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RolePriority> for u16 {
    fn from(value: RolePriority) -> Self {
        value.0
    }
}

/// Hours of the day (UTC) during which a time-restricted grant applies.
///
/// `end_hour` is exclusive; a window with `start_hour > end_hour` wraps past
/// midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HourWindow {
    start_hour: u8,
    end_hour: u8,
}

impl HourWindow {
    /// Creates a validated hour window.
    pub fn new(start_hour: u8, end_hour: u8) -> AppResult<Self> {
        if start_hour > 23 || end_hour > 24 {
            return Err(AppError::Validation(format!(
                "allowed_hours must be within 0..=24, got {start_hour}..{end_hour}"
            )));
        }
        if start_hour == end_hour {
            return Err(AppError::Validation(
                "allowed_hours must not be an empty window".to_owned(),
            ));
        }

        Ok(Self {
            start_hour,
            end_hour,
        })
    }

    /// Returns the first allowed hour.
    #[must_use]
    pub fn start_hour(&self) -> u8 {
        self.start_hour
    }

    /// Returns the first hour after the window.
    #[must_use]
    pub fn end_hour(&self) -> u8 {
        self.end_hour
    }

    /// Returns whether `hour` falls inside the window.
    #[must_use]
    pub fn contains(&self, hour: u32) -> bool {
        let start = u32::from(self.start_hour);
        let end = u32::from(self.end_hour);
        if start < end {
            (start..end).contains(&hour)
        } else {
            hour >= start || hour < end
        }
    }
}

/// Predicates narrowing a role grant to matching instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantConditions {
    /// Only instances owned by the actor.
    #[serde(default)]
    pub own_only: bool,
    /// Only instances belonging to one of the actor's teams.
    #[serde(default)]
    pub team_only: bool,
    /// Only during `allowed_hours`.
    #[serde(default)]
    pub time_restricted: bool,
    /// Window used when `time_restricted` is set.
    #[serde(default)]
    pub allowed_hours: Option<HourWindow>,
}

impl GrantConditions {
    /// Returns whether no predicate is set.
    #[must_use]
    pub fn is_unconditional(&self) -> bool {
        !self.own_only && !self.team_only && !self.time_restricted
    }

    /// Validates condition combinations.
    pub fn validate(&self) -> AppResult<()> {
        if self.time_restricted && self.allowed_hours.is_none() {
            return Err(AppError::Validation(
                "time_restricted conditions require allowed_hours".to_owned(),
            ));
        }

        Ok(())
    }
}

/// Explicit id allow-lists intersected with a role grant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantScope {
    /// Service ids the grant is limited to.
    #[serde(default)]
    pub service_ids: Option<Vec<String>>,
}

impl GrantScope {
    /// Returns whether no restriction is set.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.service_ids.is_none()
    }

    /// Validates scope lists.
    pub fn validate(&self) -> AppResult<()> {
        match &self.service_ids {
            Some(service_ids) if service_ids.is_empty() => Err(AppError::Validation(
                "scope.service_ids must not be empty when present".to_owned(),
            )),
            Some(service_ids) if service_ids.iter().any(|id| id.trim().is_empty()) => Err(
                AppError::Validation("scope.service_ids must not contain blank ids".to_owned()),
            ),
            _ => Ok(()),
        }
    }
}

/// A permission held by a role, with optional conditions and scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    /// Granted permission as persisted.
    pub permission: StoredPermission,
    /// Instance predicates.
    #[serde(default)]
    pub conditions: GrantConditions,
    /// Id allow-lists.
    #[serde(default)]
    pub scope: GrantScope,
}

impl RoleGrant {
    /// Creates a validated grant for a cataloged permission.
    pub fn new(
        permission: Permission,
        conditions: GrantConditions,
        scope: GrantScope,
    ) -> AppResult<Self> {
        if !permission.is_cataloged() {
            return Err(AppError::Validation(format!(
                "permission '{permission}' is not part of the catalog"
            )));
        }
        conditions.validate()?;
        scope.validate()?;

        Ok(Self {
            permission: permission.into(),
            conditions,
            scope,
        })
    }

    /// Creates an unconditional grant.
    #[must_use]
    pub fn unconditional(permission: Permission) -> Self {
        Self {
            permission: permission.into(),
            conditions: GrantConditions::default(),
            scope: GrantScope::default(),
        }
    }
}

/// Named, prioritized bundle of grants scoped to one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Stable role identifier.
    pub id: RoleId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Key, unique per organization.
    pub key: RoleKey,
    /// Display name.
    pub name: NonEmptyString,
    /// Authority level.
    pub priority: RolePriority,
    /// System roles are seeded and immutable.
    pub is_system: bool,
    /// Whether grants may be edited.
    pub is_editable: bool,
    /// Grants held by the role, unique per permission.
    pub grants: Vec<RoleGrant>,
}

impl Role {
    /// Returns the grant for `permission`, if the role holds it.
    #[must_use]
    pub fn grant_for(&self, permission: Permission) -> Option<&RoleGrant> {
        self.grants
            .iter()
            .find(|grant| grant.permission.resolve() == Some(permission))
    }
}

/// Fixed role names stored on memberships that predate dynamic roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyRole {
    /// Full authority.
    Owner,
    /// Administration without ownership.
    Admin,
    /// Regular contributor.
    Member,
    /// Read-only access.
    Viewer,
}

impl LegacyRole {
    /// Returns the stored role name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
            Self::Viewer => "viewer",
        }
    }

    /// Returns all legacy role names.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[Self::Owner, Self::Admin, Self::Member, Self::Viewer]
    }
}

impl FromStr for LegacyRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|role| role.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown legacy role '{value}'")))
    }
}
