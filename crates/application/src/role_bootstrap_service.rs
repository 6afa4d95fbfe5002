use std::sync::Arc;

use tasklane_core::{AppResult, NonEmptyString, OrganizationId};
use tasklane_domain::{Role, RoleId, RoleKey, RoleTemplate, system_role_templates};

use crate::SecurityAdminRepository;

/// Seeds the system roles every organization starts with.
#[derive(Clone)]
pub struct RoleBootstrapService {
    repository: Arc<dyn SecurityAdminRepository>,
}

impl RoleBootstrapService {
    /// Creates a new role bootstrap service.
    #[must_use]
    pub fn new(repository: Arc<dyn SecurityAdminRepository>) -> Self {
        Self { repository }
    }

    /// Creates missing owner, admin, member and viewer roles.
    ///
    /// Roles whose key already exists are left untouched. Returns the roles
    /// created by this call.
    pub async fn ensure_default_roles(
        &self,
        organization_id: OrganizationId,
    ) -> AppResult<Vec<Role>> {
        let mut created = Vec::new();

        for template in system_role_templates() {
            let key = RoleKey::new(template.key())?;
            if self
                .repository
                .find_role_by_key(organization_id, &key)
                .await?
                .is_some()
            {
                continue;
            }

            let role = system_role(organization_id, key, template)?;
            self.repository.create_role(&role).await?;
            created.push(role);
        }

        if !created.is_empty() {
            tracing::info!(
                organization_id = %organization_id,
                created = created.len(),
                "seeded system roles"
            );
        }

        Ok(created)
    }
}

fn system_role(
    organization_id: OrganizationId,
    key: RoleKey,
    template: RoleTemplate,
) -> AppResult<Role> {
    Ok(Role {
        id: RoleId::new(),
        organization_id,
        key,
        name: NonEmptyString::new(template.name())?,
        priority: template.priority(),
        is_system: true,
        is_editable: false,
        grants: template.grants(),
    })
}
