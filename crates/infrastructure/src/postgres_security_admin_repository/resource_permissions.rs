use super::*;

impl PostgresSecurityAdminRepository {
    pub(super) async fn create_resource_permission_impl(
        &self,
        grant: &ResourcePermission,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO resource_permissions (
                id, organization_id, user_id, resource_type, permission_resource_type,
                permission_action, resource_id, granted, expires_at, revoked_at, granted_by,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(grant.id.as_uuid())
        .bind(grant.organization_id.as_uuid())
        .bind(grant.user_id.as_uuid())
        .bind(grant.resource_type.as_str())
        .bind(grant.permission.resource_type.as_str())
        .bind(grant.permission.action.as_str())
        .bind(grant.resource_id.as_str())
        .bind(grant.granted)
        .bind(grant.expires_at)
        .bind(grant.revoked_at)
        .bind(grant.granted_by.map(|user_id| user_id.as_uuid()))
        .bind(grant.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            map_unique_conflict(
                error,
                || format!("resource permission '{}' already exists", grant.id),
                "create resource permission",
            )
        })?;

        Ok(())
    }

    pub(super) async fn find_resource_permission_impl(
        &self,
        organization_id: OrganizationId,
        resource_permission_id: ResourcePermissionId,
    ) -> AppResult<Option<ResourcePermission>> {
        let row = sqlx::query_as::<_, ResourcePermissionRow>(&format!(
            "SELECT {RESOURCE_PERMISSION_COLUMNS} FROM resource_permissions \
             WHERE organization_id = $1 AND id = $2"
        ))
        .bind(organization_id.as_uuid())
        .bind(resource_permission_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find resource permission: {error}"))
        })?;

        Ok(row.map(decode_resource_permission))
    }

    pub(super) async fn save_resource_permission_impl(
        &self,
        grant: &ResourcePermission,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE resource_permissions
            SET expires_at = $3, revoked_at = $4
            WHERE organization_id = $1 AND id = $2
            "#,
        )
        .bind(grant.organization_id.as_uuid())
        .bind(grant.id.as_uuid())
        .bind(grant.expires_at)
        .bind(grant.revoked_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to save resource permission: {error}"))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "resource permission '{}' not found",
                grant.id
            )));
        }

        Ok(())
    }

    pub(super) async fn list_resource_permissions_impl(
        &self,
        organization_id: OrganizationId,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<ResourcePermission>> {
        let rows = sqlx::query_as::<_, ResourcePermissionRow>(&format!(
            "SELECT {RESOURCE_PERMISSION_COLUMNS} FROM resource_permissions \
             WHERE organization_id = $1 AND ($2::UUID IS NULL OR user_id = $2) \
             ORDER BY created_at, id"
        ))
        .bind(organization_id.as_uuid())
        .bind(user_id.map(|user_id| user_id.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list resource permissions: {error}"))
        })?;

        Ok(rows.into_iter().map(decode_resource_permission).collect())
    }
}
