use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;

use tasklane_application::{DelegationQuery, ResourcePermissionQuery};
use tasklane_core::{OrganizationId, UserId};
use tasklane_domain::{
    Action, DelegationId, Permission, ResourceInstance, ResourcePermissionId, RoleId,
};

use crate::dto::{
    AssignRoleRequest, AuditLogQueryParams, AuditPurgeRequest, AuditPurgeResponse,
    AuditWindowParams, CreateDelegationRequest, CreateRoleRequest, DelegationListParams,
    DelegationResponse, DuplicateRoleRequest, ExtendDelegationRequest,
    ExtendResourcePermissionRequest, GrantResourcePermissionRequest, MembershipResponse,
    ResourcePermissionListParams, ResourcePermissionResponse, RoleGrantRequest, RoleResponse,
    UpdateRoleRequest,
};
use crate::error::ApiResult;
use crate::middleware::RequestActor;
use crate::state::AppState;

mod audit;
mod delegations;
mod resource_permissions;
mod roles;

pub use audit::{
    audit_summary_handler, export_audit_log_handler, list_audit_log_handler,
    purge_audit_log_handler,
};
pub use delegations::{
    create_delegation_handler, extend_delegation_handler, list_delegations_handler,
    revoke_delegation_handler,
};
pub use resource_permissions::{
    extend_resource_permission_handler, grant_resource_permission_handler,
    list_resource_permissions_handler, revoke_resource_permission_handler,
};
pub use roles::{
    add_role_permission_handler, assign_role_handler, bootstrap_roles_handler,
    create_role_handler, delete_role_handler, duplicate_role_handler, list_roles_handler,
    remove_role_permission_handler, update_role_handler,
};
