//! Role model - global, tenant-independent permission bundles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Name of the role assigned to invitees when none is requested.
pub const DEFAULT_ROLE: &str = "USER";

/// Name of the role added for tenant-admin invitees and first administrators.
pub const ADMIN_ROLE: &str = "ADMIN";

/// Role entity. Roles are shared across all tenants.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub role_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Permission strings in `resource:action` form, e.g. `documents:read`.
    pub permissions: Vec<String>,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Role {
    pub fn new(name: String, description: Option<String>, permissions: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            role_id: Uuid::new_v4(),
            name,
            description,
            permissions,
            active: true,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// A role with no permissions or an inactive role cannot be newly assigned.
    pub fn can_be_assigned(&self) -> bool {
        self.active && !self.permissions.is_empty()
    }
}

/// Request to create a role.
#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
}

/// Role response for API.
#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub role_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

impl From<Role> for RoleResponse {
    fn from(r: Role) -> Self {
        Self {
            role_id: r.role_id,
            name: r.name,
            description: r.description,
            permissions: r.permissions,
            active: r.active,
            created_utc: r.created_utc,
        }
    }
}
