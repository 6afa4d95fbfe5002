//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_audit_log_repository;
mod in_memory_capability_cache;
mod in_memory_security_store;
mod postgres_audit_log_repository;
mod postgres_authorization_repository;
mod postgres_security_admin_repository;
mod postgres_security_rows;
mod queued_audit_log_repository;
mod redis_capability_cache;

pub use in_memory_audit_log_repository::InMemoryAuditLogRepository;
pub use in_memory_capability_cache::InMemoryCapabilityCache;
pub use in_memory_security_store::InMemorySecurityStore;
pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_authorization_repository::PostgresAuthorizationRepository;
pub use postgres_security_admin_repository::PostgresSecurityAdminRepository;
pub use queued_audit_log_repository::{DEFAULT_AUDIT_QUEUE_CAPACITY, QueuedAuditLogRepository};
pub use redis_capability_cache::RedisCapabilityCache;
