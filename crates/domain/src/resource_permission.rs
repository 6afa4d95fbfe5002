use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tasklane_core::{AppError, AppResult, OrganizationId, UserId, uuid_identifier};

use crate::{Permission, ResourceType, StoredPermission};

uuid_identifier!(
    /// Identifier of a per-instance resource permission.
    ResourcePermissionId
);

/// Lifecycle state of a resource override at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourcePermissionStatus {
    /// Contributes its grant or denial.
    Active,
    /// Past `expires_at`.
    Expired,
    /// Explicitly revoked.
    Revoked,
}

impl ResourcePermissionStatus {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

/// Validated input for a new resource override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewResourcePermission {
    /// Organization scope.
    pub organization_id: OrganizationId,
    /// Actor receiving the override.
    pub user_id: UserId,
    /// Action granted or denied on the instance.
    pub permission: Permission,
    /// Target instance identifier.
    pub resource_id: String,
    /// `true` grants, `false` denies.
    pub granted: bool,
    /// Optional expiry; `None` is permanent.
    pub expires_at: Option<DateTime<Utc>>,
    /// Administrator that created the override.
    pub granted_by: Option<UserId>,
}

/// Per-instance, per-actor grant or deny exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePermission {
    /// Stable identifier.
    pub id: ResourcePermissionId,
    /// Organization scope.
    pub organization_id: OrganizationId,
    /// Actor the override applies to.
    pub user_id: UserId,
    /// Permission as persisted.
    pub permission: StoredPermission,
    /// Target resource type as persisted.
    pub resource_type: String,
    /// Target instance identifier.
    pub resource_id: String,
    /// `true` grants, `false` denies.
    pub granted: bool,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Revocation timestamp.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Administrator that created the override.
    pub granted_by: Option<UserId>,
    /// Creation timestamp; orders overrides during resolution.
    pub created_at: DateTime<Utc>,
}

impl ResourcePermission {
    /// Validates the input and builds a new active override.
    pub fn create(input: NewResourcePermission, now: DateTime<Utc>) -> AppResult<Self> {
        if !input.permission.is_cataloged() {
            return Err(AppError::Validation(format!(
                "permission '{}' is not part of the catalog",
                input.permission
            )));
        }

        let resource_id = input.resource_id.trim().to_owned();
        if resource_id.is_empty() {
            return Err(AppError::Validation(
                "resource_id must not be empty".to_owned(),
            ));
        }

        if input.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err(AppError::Validation(
                "resource permission expiry must be in the future".to_owned(),
            ));
        }

        Ok(Self {
            id: ResourcePermissionId::new(),
            organization_id: input.organization_id,
            user_id: input.user_id,
            permission: input.permission.into(),
            resource_type: input.permission.resource_type().as_str().to_owned(),
            resource_id,
            granted: input.granted,
            expires_at: input.expires_at,
            revoked_at: None,
            granted_by: input.granted_by,
            created_at: now,
        })
    }

    /// Returns the lifecycle state at `now`.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> ResourcePermissionStatus {
        if self.revoked_at.is_some() {
            ResourcePermissionStatus::Revoked
        } else if self.expires_at.is_some_and(|expires_at| now >= expires_at) {
            ResourcePermissionStatus::Expired
        } else {
            ResourcePermissionStatus::Active
        }
    }

    /// Returns whether the override contributes a rule at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status_at(now) == ResourcePermissionStatus::Active
    }

    /// Resolves the permission and target type against the allow-list.
    ///
    /// Returns `None` when either name is unknown or they disagree.
    #[must_use]
    pub fn resolve_target(&self) -> Option<(Permission, ResourceType)> {
        let permission = self.permission.resolve()?;
        let resource_type = ResourceType::from_name(self.resource_type.as_str())?;
        (permission.resource_type() == resource_type).then_some((permission, resource_type))
    }

    /// Revokes the override: the grant flag is cleared and it expires now.
    pub fn revoke(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        if self.revoked_at.is_some() {
            return Err(AppError::Conflict(format!(
                "resource permission '{}' is already revoked",
                self.id
            )));
        }

        self.granted = false;
        self.expires_at = Some(now);
        self.revoked_at = Some(now);
        Ok(())
    }

    /// Moves the expiry later while the override is active.
    pub fn extend(&mut self, new_expires_at: DateTime<Utc>, now: DateTime<Utc>) -> AppResult<()> {
        let status = self.status_at(now);
        if status != ResourcePermissionStatus::Active {
            return Err(AppError::Validation(format!(
                "resource permission '{}' cannot be extended while {}",
                self.id,
                status.as_str()
            )));
        }

        match self.expires_at {
            None => Err(AppError::Validation(format!(
                "resource permission '{}' is permanent and cannot be extended",
                self.id
            ))),
            Some(current) if new_expires_at <= current => Err(AppError::Validation(
                "extended expiry must be later than the current expiry".to_owned(),
            )),
            Some(_) => {
                self.expires_at = Some(new_expires_at);
                Ok(())
            }
        }
    }
}
