use std::sync::Arc;

use sqlx::PgPool;
use tasklane_application::{
    AuditLogger, AuthorizationService, Clock, RoleBootstrapService, SecurityAdminService,
    SystemClock,
};
use tasklane_core::AppError;
use tasklane_infrastructure::{
    PostgresAuditLogRepository, PostgresAuthorizationRepository, PostgresSecurityAdminRepository,
    QueuedAuditLogRepository,
};

use crate::api_config::ApiConfig;
use crate::state::AppState;

mod caches;

/// Wires PostgreSQL adapters, the audit queue and the capability cache into services.
///
/// Must run inside the tokio runtime; the audit writer task is spawned here.
pub fn build_app_state(pool: PgPool, config: &ApiConfig) -> Result<AppState, AppError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let capability_cache = caches::build_capability_cache(config)?;

    let (audit_log_repository, _audit_writer) = QueuedAuditLogRepository::spawn(
        Arc::new(PostgresAuditLogRepository::new(pool.clone())),
        config.audit_queue_capacity,
    );
    let audit_logger = AuditLogger::new(Arc::new(audit_log_repository), clock.clone());

    let authorization_service = AuthorizationService::new(
        Arc::new(PostgresAuthorizationRepository::new(pool.clone())),
        clock.clone(),
    )
    .with_audit_logger(audit_logger.clone())
    .with_capability_cache(capability_cache, config.capability_cache_ttl_seconds);

    let security_admin_repository = Arc::new(PostgresSecurityAdminRepository::new(pool));
    let security_admin_service = SecurityAdminService::new(
        authorization_service.clone(),
        security_admin_repository.clone(),
        audit_logger,
        clock,
    )
    .with_default_resource_permission_expiry(config.resource_permission_default_expiry);

    Ok(AppState {
        authorization_service,
        security_admin_service,
        role_bootstrap_service: RoleBootstrapService::new(security_admin_repository),
    })
}
