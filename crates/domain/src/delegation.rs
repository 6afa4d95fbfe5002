use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tasklane_core::{AppError, AppResult, OrganizationId, UserId, uuid_identifier};

use crate::{RoleId, RolePriority, StoredPermission};

uuid_identifier!(
    /// Identifier of a permission delegation.
    DelegationId
);

/// Lifecycle state of a delegation at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationStatus {
    /// Window has not started yet.
    Scheduled,
    /// Inside the window and not revoked.
    Active,
    /// Window has ended.
    Expired,
    /// Explicitly revoked.
    Revoked,
}

impl DelegationStatus {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

/// What a delegation hands over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegatedGrant {
    /// An entire role; `role_priority` is the delegated role's priority.
    Role {
        /// Delegated role.
        role_id: RoleId,
        /// Priority of the delegated role.
        role_priority: RolePriority,
    },
    /// An explicit permission subset.
    Permissions(Vec<StoredPermission>),
}

/// Validated input for a new delegation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDelegation {
    /// Organization scope.
    pub organization_id: OrganizationId,
    /// Actor handing over authority.
    pub delegator_id: UserId,
    /// Priority the delegator currently holds.
    pub delegator_priority: RolePriority,
    /// Actor receiving authority.
    pub delegatee_id: UserId,
    /// Delegated role or permissions.
    pub grant: DelegatedGrant,
    /// Window start.
    pub starts_at: DateTime<Utc>,
    /// Window end (exclusive).
    pub ends_at: DateTime<Utc>,
    /// Optional justification.
    pub reason: Option<String>,
}

/// Time-boxed grant of a role or permission subset from one actor to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDelegation {
    /// Stable identifier.
    pub id: DelegationId,
    /// Organization scope.
    pub organization_id: OrganizationId,
    /// Actor handing over authority.
    pub delegator_id: UserId,
    /// Actor receiving authority.
    pub delegatee_id: UserId,
    /// Delegated role, when the whole role is delegated.
    pub role_id: Option<RoleId>,
    /// Explicitly delegated permissions, when no role is delegated.
    pub permissions: Vec<StoredPermission>,
    /// Window start.
    pub starts_at: DateTime<Utc>,
    /// Window end (exclusive).
    pub ends_at: DateTime<Utc>,
    /// Cleared on revocation.
    pub active: bool,
    /// Revocation timestamp.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Optional justification.
    pub reason: Option<String>,
    /// Creation timestamp; orders delegations during resolution.
    pub created_at: DateTime<Utc>,
}

impl PermissionDelegation {
    /// Validates the input and builds a new active delegation.
    pub fn create(input: NewDelegation, now: DateTime<Utc>) -> AppResult<Self> {
        if input.delegator_id == input.delegatee_id {
            return Err(AppError::Validation(
                "a user cannot delegate permissions to themselves".to_owned(),
            ));
        }

        if input.ends_at <= input.starts_at {
            return Err(AppError::Validation(
                "delegation end must be after its start".to_owned(),
            ));
        }

        let (role_id, permissions) = match input.grant {
            DelegatedGrant::Role {
                role_id,
                role_priority,
            } => {
                if role_priority > input.delegator_priority {
                    return Err(AppError::Validation(format!(
                        "cannot delegate a role with priority {} above own priority {}",
                        role_priority.value(),
                        input.delegator_priority.value()
                    )));
                }
                (Some(role_id), Vec::new())
            }
            DelegatedGrant::Permissions(permissions) => {
                if permissions.is_empty() {
                    return Err(AppError::Validation(
                        "delegation must include a role or at least one permission".to_owned(),
                    ));
                }
                if let Some(unknown) = permissions
                    .iter()
                    .find(|permission| permission.resolve().is_none())
                {
                    return Err(AppError::Validation(format!(
                        "cannot delegate unknown permission '{}.{}'",
                        unknown.resource_type, unknown.action
                    )));
                }
                (None, permissions)
            }
        };

        Ok(Self {
            id: DelegationId::new(),
            organization_id: input.organization_id,
            delegator_id: input.delegator_id,
            delegatee_id: input.delegatee_id,
            role_id,
            permissions,
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            active: true,
            revoked_at: None,
            reason: input.reason.filter(|reason| !reason.trim().is_empty()),
            created_at: now,
        })
    }

    /// Returns the lifecycle state at `now`.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> DelegationStatus {
        if !self.active {
            DelegationStatus::Revoked
        } else if now >= self.ends_at {
            DelegationStatus::Expired
        } else if now < self.starts_at {
            DelegationStatus::Scheduled
        } else {
            DelegationStatus::Active
        }
    }

    /// Returns whether the delegation contributes grants at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status_at(now) == DelegationStatus::Active
    }

    /// Revokes the delegation. Revocation cannot be undone.
    pub fn revoke(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        match self.status_at(now) {
            DelegationStatus::Revoked => Err(AppError::Conflict(format!(
                "delegation '{}' is already revoked",
                self.id
            ))),
            DelegationStatus::Expired => Err(AppError::Validation(format!(
                "delegation '{}' has already expired",
                self.id
            ))),
            DelegationStatus::Scheduled | DelegationStatus::Active => {
                self.active = false;
                self.revoked_at = Some(now);
                Ok(())
            }
        }
    }

    /// Pushes the window end later while scheduled or active.
    pub fn extend(&mut self, new_ends_at: DateTime<Utc>, now: DateTime<Utc>) -> AppResult<()> {
        match self.status_at(now) {
            DelegationStatus::Scheduled | DelegationStatus::Active => {}
            status => {
                return Err(AppError::Validation(format!(
                    "delegation '{}' cannot be extended while {}",
                    self.id,
                    status.as_str()
                )));
            }
        }

        if new_ends_at <= self.ends_at {
            return Err(AppError::Validation(
                "extended delegation end must be later than the current end".to_owned(),
            ));
        }

        self.ends_at = new_ends_at;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use tasklane_core::{AppError, OrganizationId, UserId};

    use super::{DelegatedGrant, DelegationStatus, NewDelegation, PermissionDelegation};
    use crate::{RoleId, RolePriority, StoredPermission};

    fn input(delegator_priority: u16, grant: DelegatedGrant) -> NewDelegation {
        let now = Utc::now();
        NewDelegation {
            organization_id: OrganizationId::new(),
            delegator_id: UserId::new(),
            delegator_priority: RolePriority::new(i64::from(delegator_priority))
                .unwrap_or(RolePriority::MAX),
            delegatee_id: UserId::new(),
            grant,
            starts_at: now - Duration::hours(1),
            ends_at: now + Duration::hours(1),
            reason: Some("vacation cover".to_owned()),
        }
    }

    fn task_update() -> DelegatedGrant {
        DelegatedGrant::Permissions(vec![StoredPermission::new("task", "update")])
    }

    #[test]
    fn self_delegation_is_rejected() {
        let mut new_delegation = input(50, task_update());
        new_delegation.delegatee_id = new_delegation.delegator_id;

        let result = PermissionDelegation::create(new_delegation, Utc::now());
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let mut new_delegation = input(50, task_update());
        std::mem::swap(&mut new_delegation.starts_at, &mut new_delegation.ends_at);

        let result = PermissionDelegation::create(new_delegation, Utc::now());
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn role_above_delegator_priority_is_rejected() {
        let grant = DelegatedGrant::Role {
            role_id: RoleId::new(),
            role_priority: RolePriority::OWNER,
        };

        let result = PermissionDelegation::create(input(80, grant), Utc::now());
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn role_at_delegator_priority_is_accepted() {
        let grant = DelegatedGrant::Role {
            role_id: RoleId::new(),
            role_priority: RolePriority::ADMIN,
        };

        let result = PermissionDelegation::create(input(80, grant), Utc::now());
        assert!(result.is_ok());
    }

    #[test]
    fn unknown_or_empty_permissions_are_rejected() {
        let empty = PermissionDelegation::create(
            input(50, DelegatedGrant::Permissions(Vec::new())),
            Utc::now(),
        );
        assert!(empty.is_err());

        let unknown = PermissionDelegation::create(
            input(
                50,
                DelegatedGrant::Permissions(vec![StoredPermission::new("Kernel", "read")]),
            ),
            Utc::now(),
        );
        assert!(unknown.is_err());
    }

    #[test]
    fn lifecycle_moves_from_scheduled_to_expired() {
        let now = Utc::now();
        let mut new_delegation = input(50, task_update());
        new_delegation.starts_at = now + Duration::hours(1);
        new_delegation.ends_at = now + Duration::hours(2);
        let delegation = PermissionDelegation::create(new_delegation, now);
        assert!(delegation.is_ok());
        let delegation = delegation.unwrap_or_else(|_| unreachable!());

        assert_eq!(delegation.status_at(now), DelegationStatus::Scheduled);
        assert_eq!(
            delegation.status_at(now + Duration::minutes(90)),
            DelegationStatus::Active
        );
        assert_eq!(
            delegation.status_at(now + Duration::hours(2)),
            DelegationStatus::Expired
        );
    }

    #[test]
    fn revocation_is_irreversible() {
        let now = Utc::now();
        let delegation = PermissionDelegation::create(input(50, task_update()), now);
        let mut delegation = delegation.unwrap_or_else(|_| unreachable!());

        assert!(delegation.revoke(now).is_ok());
        assert_eq!(delegation.status_at(now), DelegationStatus::Revoked);
        assert!(matches!(delegation.revoke(now), Err(AppError::Conflict(_))));
        assert!(delegation.extend(now + Duration::hours(5), now).is_err());
    }

    #[test]
    fn extension_must_push_end_later() {
        let now = Utc::now();
        let delegation = PermissionDelegation::create(input(50, task_update()), now);
        let mut delegation = delegation.unwrap_or_else(|_| unreachable!());
        let current_end = delegation.ends_at;

        assert!(delegation.extend(current_end - Duration::minutes(5), now).is_err());
        assert!(delegation.extend(current_end + Duration::hours(3), now).is_ok());
        assert_eq!(delegation.ends_at, current_end + Duration::hours(3));
    }

    #[test]
    fn expired_delegation_cannot_be_extended() {
        let now = Utc::now();
        let delegation = PermissionDelegation::create(input(50, task_update()), now);
        let mut delegation = delegation.unwrap_or_else(|_| unreachable!());
        let later = delegation.ends_at + Duration::minutes(1);

        assert!(delegation.extend(later + Duration::hours(1), later).is_err());
    }
}
