use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tasklane_core::{AppResult, OrganizationId, UserId, uuid_identifier};

uuid_identifier!(
    /// Identifier of one audit log entry.
    AuditLogEntryId
);

/// Audit payload handed to the logger by callers.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    /// Organization scope.
    pub organization_id: OrganizationId,
    /// Acting user; `None` for anonymous checks.
    pub actor: Option<UserId>,
    /// Stable action identifier.
    pub action: String,
    /// Optional resource type of the subject resource.
    pub resource_type: Option<String>,
    /// Optional resource identifier of the subject resource.
    pub resource_id: Option<String>,
    /// Verdict recorded for the action.
    pub permitted: bool,
    /// Free-form context map.
    pub context: Map<String, Value>,
    /// Caller IP address.
    pub ip_address: Option<String>,
    /// Caller user agent.
    pub user_agent: Option<String>,
}

/// Append-only audit log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Stable entry identifier.
    pub id: AuditLogEntryId,
    /// Organization scope.
    pub organization_id: OrganizationId,
    /// Acting user.
    pub actor: Option<UserId>,
    /// Stable action identifier.
    pub action: String,
    /// Resource type of the subject resource.
    pub resource_type: Option<String>,
    /// Resource identifier of the subject resource.
    pub resource_id: Option<String>,
    /// Recorded verdict.
    pub permitted: bool,
    /// Free-form context map.
    pub context: Map<String, Value>,
    /// Caller IP address.
    pub ip_address: Option<String>,
    /// Caller user agent.
    pub user_agent: Option<String>,
    /// Entry timestamp.
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Stamps a record into an entry.
    #[must_use]
    pub fn from_record(record: AuditRecord, created_at: DateTime<Utc>) -> Self {
        Self {
            id: AuditLogEntryId::new(),
            organization_id: record.organization_id,
            actor: record.actor,
            action: record.action,
            resource_type: record.resource_type,
            resource_id: record.resource_id,
            permitted: record.permitted,
            context: record.context,
            ip_address: record.ip_address,
            user_agent: record.user_agent,
            created_at,
        }
    }
}

/// Half-open time window `[from, to)`; missing bounds are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditWindow {
    /// Inclusive lower bound.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub to: Option<DateTime<Utc>>,
}

impl AuditWindow {
    /// Returns whether the timestamp falls inside the window.
    #[must_use]
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| timestamp >= from) && self.to.is_none_or(|to| timestamp < to)
    }
}

/// Query parameters for audit log listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogQuery {
    /// Optional organization scope; `None` spans every organization.
    pub organization_id: Option<OrganizationId>,
    /// Optional actor filter.
    pub actor: Option<UserId>,
    /// Optional action filter.
    pub action: Option<String>,
    /// Optional resource type filter.
    pub resource_type: Option<String>,
    /// Optional verdict filter.
    pub permitted: Option<bool>,
    /// Time window.
    pub window: AuditWindow,
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
}

impl AuditLogQuery {
    /// Returns whether an entry passes every filter except pagination.
    #[must_use]
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.organization_id
            .is_none_or(|organization_id| entry.organization_id == organization_id)
            && self.actor.is_none_or(|actor| entry.actor == Some(actor))
            && self
                .action
                .as_deref()
                .is_none_or(|action| entry.action == action)
            && self
                .resource_type
                .as_deref()
                .is_none_or(|resource_type| entry.resource_type.as_deref() == Some(resource_type))
            && self
                .permitted
                .is_none_or(|permitted| entry.permitted == permitted)
            && self.window.contains(entry.created_at)
    }
}

/// Aggregate view over a set of audit entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditSummary {
    /// Number of entries.
    pub total: u64,
    /// Entries recorded as permitted.
    pub permitted: u64,
    /// Entries recorded as denied.
    pub denied: u64,
    /// `denied / total`, zero for an empty window.
    pub denial_rate: f64,
    /// Number of distinct non-anonymous actors.
    pub distinct_actors: u64,
    /// Entry count per action.
    pub by_action: BTreeMap<String, u64>,
    /// Entry count per resource type.
    pub by_resource_type: BTreeMap<String, u64>,
}

impl AuditSummary {
    /// Aggregates entries in memory.
    #[must_use]
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a AuditLogEntry>) -> Self {
        let mut summary = Self::default();
        let mut actors = BTreeSet::new();

        for entry in entries {
            summary.total += 1;
            if entry.permitted {
                summary.permitted += 1;
            } else {
                summary.denied += 1;
            }
            if let Some(actor) = entry.actor {
                actors.insert(actor);
            }
            *summary.by_action.entry(entry.action.clone()).or_default() += 1;
            if let Some(resource_type) = &entry.resource_type {
                *summary
                    .by_resource_type
                    .entry(resource_type.clone())
                    .or_default() += 1;
            }
        }

        summary.distinct_actors = actors.len() as u64;
        summary.denial_rate = denial_rate(summary.denied, summary.total);
        summary
    }
}

/// Returns `denied / total`, zero when `total` is zero.
#[must_use]
pub fn denial_rate(denied: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        denied as f64 / total as f64
    }
}

/// Repository port for the append-only audit log.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Persists one entry.
    async fn append_entry(&self, entry: AuditLogEntry) -> AppResult<()>;

    /// Lists entries newest first.
    async fn list_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>>;

    /// Aggregates entries in a window, optionally scoped to one organization.
    async fn summarize(
        &self,
        organization_id: Option<OrganizationId>,
        window: AuditWindow,
    ) -> AppResult<AuditSummary>;

    /// Purges organization entries older than the retention window.
    async fn purge_entries_older_than(
        &self,
        organization_id: OrganizationId,
        retention_days: u16,
    ) -> AppResult<u64>;
}
