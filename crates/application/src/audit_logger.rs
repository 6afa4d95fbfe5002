use std::sync::Arc;

use tasklane_core::{AppError, AppResult, OrganizationId};

use crate::{
    AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditRecord, AuditSummary, AuditWindow,
    Clock,
};

/// Longest retention window accepted by a purge.
pub const MAX_AUDIT_RETENTION_DAYS: u16 = 3650;

/// Best-effort writer and read-side aggregator for the audit log.
#[derive(Clone)]
pub struct AuditLogger {
    repository: Arc<dyn AuditLogRepository>,
    clock: Arc<dyn Clock>,
}

impl AuditLogger {
    /// Creates a logger over a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditLogRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Records one entry.
    ///
    /// Persistence failures are logged and swallowed; the caller's decision
    /// never depends on this call.
    pub async fn record(&self, record: AuditRecord) -> Option<AuditLogEntry> {
        let entry = AuditLogEntry::from_record(record, self.clock.now());

        match self.repository.append_entry(entry.clone()).await {
            Ok(()) => Some(entry),
            Err(error) => {
                tracing::warn!(
                    organization_id = %entry.organization_id,
                    action = %entry.action,
                    error = %error,
                    "failed to persist audit log entry"
                );
                None
            }
        }
    }

    /// Lists entries newest first.
    pub async fn list(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
        self.repository.list_entries(query).await
    }

    /// Aggregates entries in a time window.
    pub async fn summary(
        &self,
        organization_id: Option<OrganizationId>,
        window: AuditWindow,
    ) -> AppResult<AuditSummary> {
        if let (Some(from), Some(to)) = (window.from, window.to)
            && to <= from
        {
            return Err(AppError::Validation(
                "audit summary window end must be after its start".to_owned(),
            ));
        }

        self.repository.summarize(organization_id, window).await
    }

    /// Purges entries older than the retention window.
    pub async fn purge(
        &self,
        organization_id: OrganizationId,
        retention_days: u16,
    ) -> AppResult<u64> {
        if !(1..=MAX_AUDIT_RETENTION_DAYS).contains(&retention_days) {
            return Err(AppError::Validation(format!(
                "audit retention must be between 1 and {MAX_AUDIT_RETENTION_DAYS} days"
            )));
        }

        let purged = self
            .repository
            .purge_entries_older_than(organization_id, retention_days)
            .await?;

        tracing::info!(
            organization_id = %organization_id,
            retention_days,
            purged,
            "purged audit log entries"
        );

        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Map;
    use tasklane_core::{AppError, AppResult, OrganizationId, UserId};

    use crate::test_support::{FixedClock, InMemoryAuditLog};
    use crate::{
        AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditRecord, AuditSummary, AuditWindow,
    };

    use super::AuditLogger;

    struct FailingAuditLogRepository;

    #[async_trait]
    impl AuditLogRepository for FailingAuditLogRepository {
        async fn append_entry(&self, _entry: AuditLogEntry) -> AppResult<()> {
            Err(AppError::Internal("database unavailable".to_owned()))
        }

        async fn list_entries(&self, _query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
            Err(AppError::Internal("database unavailable".to_owned()))
        }

        async fn summarize(
            &self,
            _organization_id: Option<OrganizationId>,
            _window: AuditWindow,
        ) -> AppResult<AuditSummary> {
            Err(AppError::Internal("database unavailable".to_owned()))
        }

        async fn purge_entries_older_than(
            &self,
            _organization_id: OrganizationId,
            _retention_days: u16,
        ) -> AppResult<u64> {
            Err(AppError::Internal("database unavailable".to_owned()))
        }
    }

    fn record(organization_id: OrganizationId, permitted: bool) -> AuditRecord {
        AuditRecord {
            organization_id,
            actor: Some(UserId::new()),
            action: "destroy".to_owned(),
            resource_type: Some("task".to_owned()),
            resource_id: Some("42".to_owned()),
            permitted,
            context: Map::new(),
            ip_address: None,
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn record_swallows_persistence_failures() {
        let logger = AuditLogger::new(
            Arc::new(FailingAuditLogRepository),
            Arc::new(FixedClock::default()),
        );

        let entry = logger.record(record(OrganizationId::new(), false)).await;
        assert!(entry.is_none());
    }

    #[tokio::test]
    async fn recorded_entries_are_listed_and_summarized() {
        let repository = Arc::new(InMemoryAuditLog::default());
        let clock = Arc::new(FixedClock::default());
        let logger = AuditLogger::new(repository.clone(), clock.clone());
        let organization_id = OrganizationId::new();

        assert!(logger.record(record(organization_id, true)).await.is_some());
        assert!(logger.record(record(organization_id, false)).await.is_some());
        assert!(
            logger
                .record(record(OrganizationId::new(), false))
                .await
                .is_some()
        );

        let summary = logger
            .summary(Some(organization_id), AuditWindow::default())
            .await
            .unwrap_or_default();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.denied, 1);

        let everywhere = logger
            .summary(None, AuditWindow::default())
            .await
            .unwrap_or_default();
        assert_eq!(everywhere.total, 3);

        let listed = logger
            .list(AuditLogQuery {
                organization_id: Some(organization_id),
                actor: None,
                action: Some("destroy".to_owned()),
                resource_type: None,
                permitted: None,
                window: AuditWindow::default(),
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap_or_default();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn purge_rejects_out_of_range_retention() {
        let logger = AuditLogger::new(
            Arc::new(InMemoryAuditLog::default()),
            Arc::new(FixedClock::default()),
        );

        for retention_days in [0, 3651] {
            let result = logger.purge(OrganizationId::new(), retention_days).await;
            assert!(matches!(result, Err(AppError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn inverted_summary_window_is_rejected() {
        let logger = AuditLogger::new(
            Arc::new(InMemoryAuditLog::default()),
            Arc::new(FixedClock::default()),
        );
        let now = chrono::Utc::now();

        let result = logger
            .summary(
                None,
                AuditWindow {
                    from: Some(now),
                    to: Some(now - chrono::Duration::hours(1)),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
