use super::*;

impl PostgresSecurityAdminRepository {
    pub(super) async fn find_role_by_key_impl(
        &self,
        organization_id: OrganizationId,
        key: &RoleKey,
    ) -> AppResult<Option<Role>> {
        let role_id = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            SELECT id
            FROM roles
            WHERE organization_id = $1 AND key = $2
            "#,
        )
        .bind(organization_id.as_uuid())
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role by key: {error}")))?;

        match role_id {
            Some(role_id) => {
                fetch_role(&self.pool, organization_id, RoleId::from_uuid(role_id)).await
            }
            None => Ok(None),
        }
    }

    pub(super) async fn create_role_impl(&self, role: &Role) -> AppResult<()> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        sqlx::query(
            r#"
            INSERT INTO roles (id, organization_id, key, name, priority, is_system, is_editable)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(role.id.as_uuid())
        .bind(role.organization_id.as_uuid())
        .bind(role.key.as_str())
        .bind(role.name.as_str())
        .bind(i32::from(role.priority.value()))
        .bind(role.is_system)
        .bind(role.is_editable)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            map_unique_conflict(
                error,
                || format!("role key '{}' is already taken", role.key),
                "create role",
            )
        })?;

        for grant in &role.grants {
            sqlx::query(
                r#"
                INSERT INTO role_permissions (role_id, resource_type, action, conditions, scope)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(role.id.as_uuid())
            .bind(grant.permission.resource_type.as_str())
            .bind(grant.permission.action.as_str())
            .bind(Json(&grant.conditions))
            .bind(Json(&grant.scope))
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                map_unique_conflict(
                    error,
                    || {
                        format!(
                            "role '{}' lists '{}:{}' twice",
                            role.key, grant.permission.resource_type, grant.permission.action
                        )
                    },
                    "persist role grants",
                )
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(())
    }

    pub(super) async fn update_role_impl(&self, role: &Role) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE roles
            SET name = $3, priority = $4, updated_at = now()
            WHERE organization_id = $1 AND id = $2
            "#,
        )
        .bind(role.organization_id.as_uuid())
        .bind(role.id.as_uuid())
        .bind(role.name.as_str())
        .bind(i32::from(role.priority.value()))
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update role: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("role '{}' not found", role.id)));
        }

        Ok(())
    }

    pub(super) async fn delete_role_impl(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM roles
            WHERE organization_id = $1 AND id = $2
            "#,
        )
        .bind(organization_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            // Memberships and delegations reference roles with ON DELETE RESTRICT.
            if let sqlx::Error::Database(database_error) = &error
                && database_error.code().as_deref() == Some("23503")
            {
                return AppError::Conflict(format!(
                    "role '{role_id}' is still referenced by memberships or delegations"
                ));
            }
            AppError::Internal(format!("failed to delete role: {error}"))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("role '{role_id}' not found")));
        }

        Ok(())
    }

    pub(super) async fn count_role_memberships_impl(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM memberships
            WHERE organization_id = $1 AND role_id = $2
            "#,
        )
        .bind(organization_id.as_uuid())
        .bind(role_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to count role memberships: {error}"))
        })?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    pub(super) async fn count_role_delegations_impl(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM permission_delegations
            WHERE organization_id = $1 AND role_id = $2
            "#,
        )
        .bind(organization_id.as_uuid())
        .bind(role_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to count role delegations: {error}"))
        })?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    pub(super) async fn add_role_grant_impl(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
        grant: &RoleGrant,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, resource_type, action, conditions, scope)
            SELECT roles.id, $3, $4, $5, $6
            FROM roles
            WHERE roles.organization_id = $1 AND roles.id = $2
            "#,
        )
        .bind(organization_id.as_uuid())
        .bind(role_id.as_uuid())
        .bind(grant.permission.resource_type.as_str())
        .bind(grant.permission.action.as_str())
        .bind(Json(&grant.conditions))
        .bind(Json(&grant.scope))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            map_unique_conflict(
                error,
                || {
                    format!(
                        "role '{role_id}' already grants '{}:{}'",
                        grant.permission.resource_type, grant.permission.action
                    )
                },
                "add role permission",
            )
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("role '{role_id}' not found")));
        }

        Ok(())
    }

    pub(super) async fn remove_role_grant_impl(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
        permission: Permission,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM role_permissions
            USING roles
            WHERE role_permissions.role_id = roles.id
                AND roles.organization_id = $1
                AND roles.id = $2
                AND role_permissions.resource_type = $3
                AND role_permissions.action = $4
            "#,
        )
        .bind(organization_id.as_uuid())
        .bind(role_id.as_uuid())
        .bind(permission.resource_type().as_str())
        .bind(permission.action().as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to remove role permission: {error}"))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "role '{role_id}' does not grant '{permission}'"
            )));
        }

        Ok(())
    }

    pub(super) async fn set_membership_role_impl(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role: MembershipRole,
    ) -> AppResult<Membership> {
        let (legacy_role, role_id) = match role {
            MembershipRole::Legacy(legacy_role) => (Some(legacy_role.as_str()), None),
            MembershipRole::Dynamic(role_id) => (None, Some(role_id.as_uuid())),
        };

        let row = sqlx::query_as::<_, MembershipRow>(&format!(
            "UPDATE memberships SET legacy_role = $3, role_id = $4 \
             WHERE organization_id = $1 AND user_id = $2 \
             RETURNING {MEMBERSHIP_COLUMNS}"
        ))
        .bind(organization_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(legacy_role)
        .bind(role_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to update membership role: {error}"))
        })?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "user '{user_id}' is not a member of organization '{organization_id}'"
            ))
        })?;

        decode_membership(row)
    }
}
