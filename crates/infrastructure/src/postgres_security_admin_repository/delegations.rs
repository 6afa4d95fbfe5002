use super::*;

impl PostgresSecurityAdminRepository {
    pub(super) async fn create_delegation_impl(
        &self,
        delegation: &PermissionDelegation,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO permission_delegations (
                id, organization_id, delegator_id, delegatee_id, role_id, permissions,
                starts_at, ends_at, active, revoked_at, reason, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(delegation.id.as_uuid())
        .bind(delegation.organization_id.as_uuid())
        .bind(delegation.delegator_id.as_uuid())
        .bind(delegation.delegatee_id.as_uuid())
        .bind(delegation.role_id.map(|role_id| role_id.as_uuid()))
        .bind(Json(&delegation.permissions))
        .bind(delegation.starts_at)
        .bind(delegation.ends_at)
        .bind(delegation.active)
        .bind(delegation.revoked_at)
        .bind(delegation.reason.as_deref())
        .bind(delegation.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            map_unique_conflict(
                error,
                || format!("delegation '{}' already exists", delegation.id),
                "create delegation",
            )
        })?;

        Ok(())
    }

    pub(super) async fn find_delegation_impl(
        &self,
        organization_id: OrganizationId,
        delegation_id: DelegationId,
    ) -> AppResult<Option<PermissionDelegation>> {
        let row = sqlx::query_as::<_, DelegationRow>(&format!(
            "SELECT {DELEGATION_COLUMNS} FROM permission_delegations \
             WHERE organization_id = $1 AND id = $2"
        ))
        .bind(organization_id.as_uuid())
        .bind(delegation_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find delegation: {error}")))?;

        Ok(row.map(decode_delegation))
    }

    pub(super) async fn save_delegation_impl(
        &self,
        delegation: &PermissionDelegation,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE permission_delegations
            SET ends_at = $3, active = $4, revoked_at = $5, reason = $6
            WHERE organization_id = $1 AND id = $2
            "#,
        )
        .bind(delegation.organization_id.as_uuid())
        .bind(delegation.id.as_uuid())
        .bind(delegation.ends_at)
        .bind(delegation.active)
        .bind(delegation.revoked_at)
        .bind(delegation.reason.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to save delegation: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "delegation '{}' not found",
                delegation.id
            )));
        }

        Ok(())
    }

    pub(super) async fn list_delegations_impl(
        &self,
        organization_id: OrganizationId,
        user_id: Option<UserId>,
    ) -> AppResult<Vec<PermissionDelegation>> {
        let rows = sqlx::query_as::<_, DelegationRow>(&format!(
            "SELECT {DELEGATION_COLUMNS} FROM permission_delegations \
             WHERE organization_id = $1 \
                AND ($2::UUID IS NULL OR delegator_id = $2 OR delegatee_id = $2) \
             ORDER BY created_at, id"
        ))
        .bind(organization_id.as_uuid())
        .bind(user_id.map(|user_id| user_id.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list delegations: {error}")))?;

        Ok(rows.into_iter().map(decode_delegation).collect())
    }
}
