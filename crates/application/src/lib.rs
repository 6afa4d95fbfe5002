//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_logger;
mod audit_ports;
mod authorization_ports;
mod authorization_service;
mod clock;
mod role_bootstrap_service;
mod security_admin_ports;
mod security_admin_service;

#[cfg(test)]
mod test_support;

pub use audit_logger::{AuditLogger, MAX_AUDIT_RETENTION_DAYS};
pub use audit_ports::{
    AuditLogEntry, AuditLogEntryId, AuditLogQuery, AuditLogRepository, AuditRecord, AuditSummary,
    AuditWindow, denial_rate,
};
pub use authorization_ports::{AuthorizationRepository, CapabilityCache};
pub use authorization_service::{
    AuthorizationService, DEFAULT_CAPABILITY_CACHE_TTL_SECONDS, MAX_CAPABILITY_CACHE_TTL_SECONDS,
};
pub use clock::{Clock, SystemClock};
pub use role_bootstrap_service::RoleBootstrapService;
pub use security_admin_ports::{
    AddRolePermissionInput, CreateDelegationInput, CreateRoleInput, DelegationQuery,
    DuplicateRoleInput, GrantResourcePermissionInput, ResourcePermissionQuery,
    SecurityAdminRepository, UpdateRoleInput,
};
pub use security_admin_service::{MAX_AUDIT_EXPORT_ROWS, MAX_AUDIT_PAGE_SIZE, SecurityAdminService};
