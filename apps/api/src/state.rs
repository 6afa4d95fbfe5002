use tasklane_application::{AuthorizationService, RoleBootstrapService, SecurityAdminService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub authorization_service: AuthorizationService,
    pub security_admin_service: SecurityAdminService,
    pub role_bootstrap_service: RoleBootstrapService,
}
