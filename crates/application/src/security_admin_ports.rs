mod inputs;
mod repository;

pub use inputs::{
    AddRolePermissionInput, CreateDelegationInput, CreateRoleInput, DelegationQuery,
    DuplicateRoleInput, GrantResourcePermissionInput, ResourcePermissionQuery, UpdateRoleInput,
};
pub use repository::SecurityAdminRepository;
