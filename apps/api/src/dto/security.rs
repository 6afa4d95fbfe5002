mod conversions;
mod types;

pub use types::{
    AssignRoleRequest, CreateDelegationRequest, CreateRoleRequest, DelegationListParams,
    DelegationResponse, DuplicateRoleRequest, ExtendDelegationRequest,
    ExtendResourcePermissionRequest, GrantResourcePermissionRequest, MembershipResponse,
    ResourcePermissionListParams, ResourcePermissionResponse, RoleGrantRequest, RoleResponse,
    UpdateRoleRequest,
};
