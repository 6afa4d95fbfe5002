//! Audit log adapter that defers writes to a background task.

use std::sync::Arc;

use async_trait::async_trait;
use tasklane_application::{
    AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditSummary, AuditWindow,
};
use tasklane_core::{AppError, AppResult, OrganizationId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default number of entries buffered before appends are rejected.
pub const DEFAULT_AUDIT_QUEUE_CAPACITY: usize = 1024;

/// Audit log repository that queues appends and persists them in order on a
/// background task.
///
/// Reads go straight to the wrapped repository and may miss entries that are
/// still queued. The writer task stops once every clone of the repository is
/// dropped and the queue has drained.
#[derive(Clone)]
pub struct QueuedAuditLogRepository {
    inner: Arc<dyn AuditLogRepository>,
    sender: mpsc::Sender<AuditLogEntry>,
}

impl QueuedAuditLogRepository {
    /// Starts the writer task and returns the repository with its handle.
    #[must_use]
    pub fn spawn(inner: Arc<dyn AuditLogRepository>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<AuditLogEntry>(capacity.max(1));
        let writer = inner.clone();
        let handle = tokio::spawn(async move {
            while let Some(entry) = receiver.recv().await {
                let organization_id = entry.organization_id;
                let action = entry.action.clone();
                if let Err(error) = writer.append_entry(entry).await {
                    tracing::warn!(
                        organization_id = %organization_id,
                        action = %action,
                        error = %error,
                        "failed to persist queued audit log entry"
                    );
                }
            }
            tracing::debug!("audit queue writer stopped");
        });

        (Self { inner, sender }, handle)
    }
}

#[async_trait]
impl AuditLogRepository for QueuedAuditLogRepository {
    async fn append_entry(&self, entry: AuditLogEntry) -> AppResult<()> {
        self.sender.try_send(entry).map_err(|error| match error {
            mpsc::error::TrySendError::Full(_) => {
                AppError::Internal("audit queue is full".to_owned())
            }
            mpsc::error::TrySendError::Closed(_) => {
                AppError::Internal("audit queue writer has stopped".to_owned())
            }
        })
    }

    async fn list_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
        self.inner.list_entries(query).await
    }

    async fn summarize(
        &self,
        organization_id: Option<OrganizationId>,
        window: AuditWindow,
    ) -> AppResult<AuditSummary> {
        self.inner.summarize(organization_id, window).await
    }

    async fn purge_entries_older_than(
        &self,
        organization_id: OrganizationId,
        retention_days: u16,
    ) -> AppResult<u64> {
        self.inner
            .purge_entries_older_than(organization_id, retention_days)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use serde_json::Map;
    use tasklane_application::{AuditLogEntry, AuditLogRepository, AuditRecord, AuditWindow};
    use tasklane_core::{AppError, OrganizationId};

    use super::QueuedAuditLogRepository;
    use crate::InMemoryAuditLogRepository;

    fn entry(organization_id: OrganizationId, action: &str) -> AuditLogEntry {
        AuditLogEntry::from_record(
            AuditRecord {
                organization_id,
                actor: None,
                action: action.to_owned(),
                resource_type: None,
                resource_id: None,
                permitted: false,
                context: Map::new(),
                ip_address: None,
                user_agent: None,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn queued_entries_reach_the_inner_repository_in_order() {
        let inner = Arc::new(InMemoryAuditLogRepository::new());
        let (queue, handle) = QueuedAuditLogRepository::spawn(inner.clone(), 8);
        let organization_id = OrganizationId::new();

        for action in ["first", "second", "third"] {
            assert!(queue.append_entry(entry(organization_id, action)).await.is_ok());
        }
        drop(queue);
        assert!(handle.await.is_ok());

        let summary = inner
            .summarize(Some(organization_id), AuditWindow::default())
            .await
            .unwrap_or_default();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.denied, 3);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn full_queue_rejects_appends() {
        let inner = Arc::new(InMemoryAuditLogRepository::new());
        let (queue, _handle) = QueuedAuditLogRepository::spawn(inner, 1);
        let organization_id = OrganizationId::new();

        // The writer task cannot run until this test yields.
        let first = queue.append_entry(entry(organization_id, "first")).await;
        let second = queue.append_entry(entry(organization_id, "second")).await;

        assert!(first.is_ok());
        assert!(matches!(second, Err(AppError::Internal(_))));
    }
}
