use super::*;

use tasklane_core::OrganizationId;

use crate::{AuditLogEntry, AuditLogQuery, AuditSummary, AuditWindow};

/// Largest page returned by audit listing.
pub const MAX_AUDIT_PAGE_SIZE: usize = 500;
/// Largest number of entries returned by one export.
pub const MAX_AUDIT_EXPORT_ROWS: usize = 10_000;

impl SecurityAdminService {
    /// Lists audit entries of the actor's organization, newest first.
    pub async fn list_audit_entries(
        &self,
        actor: &ActorIdentity,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>> {
        self.require(actor, Action::Read, ResourceType::AuditLog)
            .await?;

        self.audit_logger
            .list(AuditLogQuery {
                organization_id: Some(actor.organization_id()),
                limit: query.limit.clamp(1, MAX_AUDIT_PAGE_SIZE),
                ..query
            })
            .await
    }

    /// Aggregates the actor's organization audit entries in a window.
    pub async fn audit_summary(
        &self,
        actor: &ActorIdentity,
        window: AuditWindow,
    ) -> AppResult<AuditSummary> {
        self.require(actor, Action::Read, ResourceType::AuditLog)
            .await?;

        self.audit_logger
            .summary(Some(actor.organization_id()), window)
            .await
    }

    /// Returns every entry in the window for offline analysis.
    pub async fn export_audit_entries(
        &self,
        actor: &ActorIdentity,
        window: AuditWindow,
    ) -> AppResult<Vec<AuditLogEntry>> {
        self.require(actor, Action::Export, ResourceType::AuditLog)
            .await?;

        let entries = self
            .audit_logger
            .list(export_query(actor.organization_id(), window))
            .await?;
        tracing::info!(
            organization_id = %actor.organization_id(),
            exported = entries.len(),
            "exported audit log entries"
        );

        Ok(entries)
    }

    /// Deletes the actor's organization entries older than `retention_days`.
    pub async fn purge_audit_entries(
        &self,
        actor: &ActorIdentity,
        retention_days: u16,
    ) -> AppResult<u64> {
        self.require(actor, Action::Destroy, ResourceType::AuditLog)
            .await?;

        let purged = self
            .audit_logger
            .purge(actor.organization_id(), retention_days)
            .await?;

        self.audit(
            actor,
            AuditAction::AuditEntriesPurged,
            ResourceType::AuditLog.as_str(),
            actor.organization_id().to_string(),
            format!("purged {purged} entries older than {retention_days} days"),
        )
        .await;

        Ok(purged)
    }
}

fn export_query(organization_id: OrganizationId, window: AuditWindow) -> AuditLogQuery {
    AuditLogQuery {
        organization_id: Some(organization_id),
        actor: None,
        action: None,
        resource_type: None,
        permitted: None,
        window,
        limit: MAX_AUDIT_EXPORT_ROWS,
        offset: 0,
    }
}
