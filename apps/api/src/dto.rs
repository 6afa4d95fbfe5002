mod audit;
mod authorization;
mod security;

use serde::Serialize;

pub use audit::{AuditLogQueryParams, AuditPurgeRequest, AuditPurgeResponse, AuditWindowParams};
pub use authorization::{AuthorizationRequest, CapabilitiesResponse, DecisionResponse};
pub use security::{
    AssignRoleRequest, CreateDelegationRequest, CreateRoleRequest, DelegationListParams,
    DelegationResponse, DuplicateRoleRequest, ExtendDelegationRequest,
    ExtendResourcePermissionRequest, GrantResourcePermissionRequest, MembershipResponse,
    ResourcePermissionListParams, ResourcePermissionResponse, RoleGrantRequest, RoleResponse,
    UpdateRoleRequest,
};

/// Liveness payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
