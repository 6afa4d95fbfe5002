use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use tasklane_application::{
    AuditLogEntry, AuditLogEntryId, AuditLogQuery, AuditLogRepository, AuditSummary, AuditWindow,
    denial_rate,
};
use tasklane_core::{AppError, AppResult, OrganizationId, UserId};

/// PostgreSQL-backed append-only audit log.
#[derive(Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditLogRow {
    id: uuid::Uuid,
    organization_id: uuid::Uuid,
    actor_id: Option<uuid::Uuid>,
    action: String,
    resource_type: Option<String>,
    resource_id: Option<String>,
    permitted: bool,
    context: Json<Map<String, Value>>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct AuditTotalsRow {
    total: i64,
    permitted: i64,
    distinct_actors: i64,
}

#[derive(Debug, FromRow)]
struct AuditCountRow {
    label: String,
    count: i64,
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn append_entry(&self, entry: AuditLogEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log_entries (
                id, organization_id, actor_id, action, resource_type, resource_id, permitted,
                context, ip_address, user_agent, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.organization_id.as_uuid())
        .bind(entry.actor.map(|actor| actor.as_uuid()))
        .bind(entry.action)
        .bind(entry.resource_type)
        .bind(entry.resource_id)
        .bind(entry.permitted)
        .bind(Json(entry.context))
        .bind(entry.ip_address)
        .bind(entry.user_agent)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to append audit log entry: {error}"))
        })?;

        Ok(())
    }

    async fn list_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, AuditLogRow>(
            r#"
            SELECT
                id, organization_id, actor_id, action, resource_type, resource_id, permitted,
                context, ip_address, user_agent, created_at
            FROM audit_log_entries
            WHERE ($1::UUID IS NULL OR organization_id = $1)
                AND ($2::UUID IS NULL OR actor_id = $2)
                AND ($3::TEXT IS NULL OR action = $3)
                AND ($4::TEXT IS NULL OR resource_type = $4)
                AND ($5::BOOLEAN IS NULL OR permitted = $5)
                AND ($6::TIMESTAMPTZ IS NULL OR created_at >= $6)
                AND ($7::TIMESTAMPTZ IS NULL OR created_at < $7)
            ORDER BY created_at DESC, id
            LIMIT $8
            OFFSET $9
            "#,
        )
        .bind(query.organization_id.map(|organization_id| organization_id.as_uuid()))
        .bind(query.actor.map(|actor| actor.as_uuid()))
        .bind(query.action)
        .bind(query.resource_type)
        .bind(query.permitted)
        .bind(query.window.from)
        .bind(query.window.to)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list audit log entries: {error}"))
        })?;

        Ok(rows.into_iter().map(decode_entry).collect())
    }

    async fn summarize(
        &self,
        organization_id: Option<OrganizationId>,
        window: AuditWindow,
    ) -> AppResult<AuditSummary> {
        let organization_id = organization_id.map(|organization_id| organization_id.as_uuid());
        let totals = sqlx::query_as::<_, AuditTotalsRow>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE permitted) AS permitted,
                COUNT(DISTINCT actor_id) AS distinct_actors
            FROM audit_log_entries
            WHERE ($1::UUID IS NULL OR organization_id = $1)
                AND ($2::TIMESTAMPTZ IS NULL OR created_at >= $2)
                AND ($3::TIMESTAMPTZ IS NULL OR created_at < $3)
            "#,
        )
        .bind(organization_id)
        .bind(window.from)
        .bind(window.to)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to summarize audit log: {error}")))?;

        let by_action = self
            .count_by(
                r#"
                SELECT action AS label, COUNT(*) AS count
                FROM audit_log_entries
                WHERE ($1::UUID IS NULL OR organization_id = $1)
                    AND ($2::TIMESTAMPTZ IS NULL OR created_at >= $2)
                    AND ($3::TIMESTAMPTZ IS NULL OR created_at < $3)
                GROUP BY action
                "#,
                organization_id,
                window,
            )
            .await?;
        let by_resource_type = self
            .count_by(
                r#"
                SELECT resource_type AS label, COUNT(*) AS count
                FROM audit_log_entries
                WHERE ($1::UUID IS NULL OR organization_id = $1)
                    AND ($2::TIMESTAMPTZ IS NULL OR created_at >= $2)
                    AND ($3::TIMESTAMPTZ IS NULL OR created_at < $3)
                    AND resource_type IS NOT NULL
                GROUP BY resource_type
                "#,
                organization_id,
                window,
            )
            .await?;

        let total = count(totals.total);
        let permitted = count(totals.permitted);
        let denied = total.saturating_sub(permitted);
        Ok(AuditSummary {
            total,
            permitted,
            denied,
            denial_rate: denial_rate(denied, total),
            distinct_actors: count(totals.distinct_actors),
            by_action,
            by_resource_type,
        })
    }

    async fn purge_entries_older_than(
        &self,
        organization_id: OrganizationId,
        retention_days: u16,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM audit_log_entries
            WHERE organization_id = $1
                AND created_at < now() - make_interval(days => $2)
            "#,
        )
        .bind(organization_id.as_uuid())
        .bind(i32::from(retention_days))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to purge audit log entries: {error}"))
        })?;

        Ok(result.rows_affected())
    }
}

impl PostgresAuditLogRepository {
    async fn count_by(
        &self,
        sql: &str,
        organization_id: Option<uuid::Uuid>,
        window: AuditWindow,
    ) -> AppResult<BTreeMap<String, u64>> {
        let rows = sqlx::query_as::<_, AuditCountRow>(sql)
            .bind(organization_id)
            .bind(window.from)
            .bind(window.to)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to group audit log entries: {error}"))
            })?;

        Ok(rows
            .into_iter()
            .map(|row| (row.label, count(row.count)))
            .collect())
    }
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn decode_entry(row: AuditLogRow) -> AuditLogEntry {
    AuditLogEntry {
        id: AuditLogEntryId::from_uuid(row.id),
        organization_id: OrganizationId::from_uuid(row.organization_id),
        actor: row.actor_id.map(UserId::from_uuid),
        action: row.action,
        resource_type: row.resource_type,
        resource_id: row.resource_id,
        permitted: row.permitted,
        context: row.context.0,
        ip_address: row.ip_address,
        user_agent: row.user_agent,
        created_at: row.created_at,
    }
}
