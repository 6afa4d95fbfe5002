use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::PgPool;

use tasklane_application::AuthorizationRepository;
use tasklane_core::{AppError, AppResult, OrganizationId, UserId};
use tasklane_domain::{Membership, PermissionDelegation, ResourcePermission, Role, RoleId};

use crate::postgres_security_rows::{
    DELEGATION_COLUMNS, DelegationRow, RESOURCE_PERMISSION_COLUMNS, ResourcePermissionRow,
    decode_delegation, decode_resource_permission, fetch_membership, fetch_role,
};

/// PostgreSQL-backed repository for the state ability resolution reads.
#[derive(Clone)]
pub struct PostgresAuthorizationRepository {
    pool: PgPool,
}

impl PostgresAuthorizationRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthorizationRepository for PostgresAuthorizationRepository {
    async fn find_membership(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<Option<Membership>> {
        fetch_membership(&self.pool, organization_id, user_id).await
    }

    async fn find_role(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> AppResult<Option<Role>> {
        fetch_role(&self.pool, organization_id, role_id).await
    }

    async fn list_team_ids(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<BTreeSet<String>> {
        let team_ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT team_id
            FROM team_memberships
            WHERE organization_id = $1
                AND user_id = $2
            "#,
        )
        .bind(organization_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load team ids: {error}")))?;

        Ok(team_ids.into_iter().collect())
    }

    async fn list_delegations_for_delegatee(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<Vec<PermissionDelegation>> {
        // Lifecycle filtering happens in the resolver against the injected clock.
        let rows = sqlx::query_as::<_, DelegationRow>(&format!(
            "SELECT {DELEGATION_COLUMNS} FROM permission_delegations \
             WHERE organization_id = $1 AND delegatee_id = $2 AND active \
             ORDER BY created_at, id"
        ))
        .bind(organization_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load delegations: {error}")))?;

        Ok(rows.into_iter().map(decode_delegation).collect())
    }

    async fn list_resource_permissions_for_user(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> AppResult<Vec<ResourcePermission>> {
        let rows = sqlx::query_as::<_, ResourcePermissionRow>(&format!(
            "SELECT {RESOURCE_PERMISSION_COLUMNS} FROM resource_permissions \
             WHERE organization_id = $1 AND user_id = $2 AND revoked_at IS NULL \
             ORDER BY created_at, id"
        ))
        .bind(organization_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load resource permissions: {error}"))
        })?;

        Ok(rows.into_iter().map(decode_resource_permission).collect())
    }
}
