use async_trait::async_trait;
use chrono::{Duration, Utc};
use tasklane_application::{
    AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditSummary, AuditWindow,
};
use tasklane_core::{AppResult, OrganizationId};
use tokio::sync::RwLock;

/// In-memory append-only audit log.
#[derive(Debug, Default)]
pub struct InMemoryAuditLogRepository {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl InMemoryAuditLogRepository {
    /// Creates an empty in-memory audit log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditLogRepository {
    async fn append_entry(&self, entry: AuditLogEntry) -> AppResult<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn list_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
        let entries = self.entries.read().await;
        let mut matching: Vec<&AuditLogEntry> =
            entries.iter().filter(|entry| query.matches(entry)).collect();
        matching.sort_by(|left, right| right.created_at.cmp(&left.created_at));

        Ok(matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn summarize(
        &self,
        organization_id: Option<OrganizationId>,
        window: AuditWindow,
    ) -> AppResult<AuditSummary> {
        let entries = self.entries.read().await;

        Ok(AuditSummary::from_entries(entries.iter().filter(|entry| {
            organization_id.is_none_or(|organization_id| entry.organization_id == organization_id)
                && window.contains(entry.created_at)
        })))
    }

    async fn purge_entries_older_than(
        &self,
        organization_id: OrganizationId,
        retention_days: u16,
    ) -> AppResult<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|entry| {
            entry.organization_id != organization_id || entry.created_at >= cutoff
        });

        Ok((before - entries.len()) as u64)
    }
}
