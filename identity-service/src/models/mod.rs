//! Data model for the identity engine.

pub mod assignment;
pub mod audit_event;
pub mod role;
pub mod tenant;
pub mod user;
pub mod verification_token;

pub use assignment::{RoleAssignment, RoleGrant};
pub use audit_event::{AuditEvent, AuditEventResponse, AuditEventType};
pub use role::{CreateRoleRequest, Role, RoleResponse, ADMIN_ROLE, DEFAULT_ROLE};
pub use tenant::{
    derive_client_id, AdminSeed, ProvisionTenantRequest, Tenant, TenantResponse,
    UpdateTenantRequest,
};
pub use user::{NameOverrides, User, UserResponse};
pub use verification_token::{TokenType, VerificationToken};
