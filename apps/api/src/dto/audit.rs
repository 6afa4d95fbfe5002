use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tasklane_application::{AuditLogQuery, AuditWindow, MAX_AUDIT_PAGE_SIZE};
use tasklane_core::UserId;

const DEFAULT_AUDIT_PAGE_SIZE: usize = 50;

/// Query string of the audit listing endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLogQueryParams {
    #[serde(default)]
    pub actor: Option<UserId>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub permitted: Option<bool>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

impl From<AuditLogQueryParams> for AuditLogQuery {
    fn from(value: AuditLogQueryParams) -> Self {
        Self {
            // Scoped to the caller's organization by the service.
            organization_id: None,
            actor: value.actor,
            action: value.action.filter(|action| !action.trim().is_empty()),
            resource_type: value
                .resource_type
                .filter(|resource_type| !resource_type.trim().is_empty()),
            permitted: value.permitted,
            window: AuditWindow {
                from: value.from,
                to: value.to,
            },
            limit: value
                .limit
                .unwrap_or(DEFAULT_AUDIT_PAGE_SIZE)
                .min(MAX_AUDIT_PAGE_SIZE),
            offset: value.offset.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AuditWindowParams {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

impl From<AuditWindowParams> for AuditWindow {
    fn from(value: AuditWindowParams) -> Self {
        Self {
            from: value.from,
            to: value.to,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AuditPurgeRequest {
    pub retention_days: u16,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AuditPurgeResponse {
    pub purged: u64,
}

#[cfg(test)]
mod tests {
    use tasklane_application::AuditLogQuery;

    use super::AuditLogQueryParams;

    #[test]
    fn page_size_defaults_and_is_capped() {
        let defaulted = AuditLogQuery::from(AuditLogQueryParams::default());
        let capped = AuditLogQuery::from(AuditLogQueryParams {
            limit: Some(5_000),
            ..AuditLogQueryParams::default()
        });

        assert_eq!(defaulted.limit, 50);
        assert_eq!(capped.limit, 500);
        assert_eq!(defaulted.offset, 0);
    }

    #[test]
    fn blank_filters_are_dropped() {
        let query = AuditLogQuery::from(AuditLogQueryParams {
            action: Some("  ".to_owned()),
            resource_type: Some("task".to_owned()),
            ..AuditLogQueryParams::default()
        });

        assert_eq!(query.action, None);
        assert_eq!(query.resource_type.as_deref(), Some("task"));
    }
}
