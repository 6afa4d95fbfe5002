use axum::Router;
use axum::middleware::from_fn;
use axum::routing::{delete, get, post, put};
use tower_http::trace::TraceLayer;

use crate::handlers::{authorization, health, security};
use crate::middleware;
use crate::state::AppState;

const ORGANIZATION_ROUTES: &str = "/api/organizations/{organization_id}";

pub fn build_router(app_state: AppState) -> Router {
    let organization_routes = Router::new()
        .route("/authorize", post(authorization::authorize_handler))
        .route("/explain", post(authorization::explain_handler))
        .route("/capabilities", get(authorization::capabilities_handler))
        .route(
            "/roles",
            get(security::list_roles_handler).post(security::create_role_handler),
        )
        .route("/roles/bootstrap", post(security::bootstrap_roles_handler))
        .route(
            "/roles/{role_id}",
            put(security::update_role_handler).delete(security::delete_role_handler),
        )
        .route(
            "/roles/{role_id}/duplicate",
            post(security::duplicate_role_handler),
        )
        .route(
            "/roles/{role_id}/permissions",
            post(security::add_role_permission_handler),
        )
        .route(
            "/roles/{role_id}/permissions/{permission}",
            delete(security::remove_role_permission_handler),
        )
        .route(
            "/memberships/{user_id}/role",
            put(security::assign_role_handler),
        )
        .route(
            "/delegations",
            get(security::list_delegations_handler).post(security::create_delegation_handler),
        )
        .route(
            "/delegations/{delegation_id}/revoke",
            post(security::revoke_delegation_handler),
        )
        .route(
            "/delegations/{delegation_id}/extend",
            post(security::extend_delegation_handler),
        )
        .route(
            "/resource-permissions",
            get(security::list_resource_permissions_handler)
                .post(security::grant_resource_permission_handler),
        )
        .route(
            "/resource-permissions/{resource_permission_id}/revoke",
            post(security::revoke_resource_permission_handler),
        )
        .route(
            "/resource-permissions/{resource_permission_id}/extend",
            post(security::extend_resource_permission_handler),
        )
        .route("/audit-log", get(security::list_audit_log_handler))
        .route(
            "/audit-log/summary",
            get(security::audit_summary_handler),
        )
        .route(
            "/audit-log/export",
            get(security::export_audit_log_handler),
        )
        .route("/audit-log/purge", post(security::purge_audit_log_handler))
        .route_layer(from_fn(middleware::capture_actor));

    Router::new()
        .route("/health", get(health::health_handler))
        .nest(ORGANIZATION_ROUTES, organization_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
