//! Role assignment model - time-bounded user→role edges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Role assignment entity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoleAssignment {
    pub assignment_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub assigned_utc: DateTime<Utc>,
    /// Null means system-assigned (e.g. tenant provisioning).
    pub assigned_by: Option<Uuid>,
    pub expires_utc: Option<DateTime<Utc>>,
    pub active: bool,
}

impl RoleAssignment {
    /// Create an assignment starting now with no expiry.
    pub fn new(user_id: Uuid, role_id: Uuid, assigned_by: Option<Uuid>) -> Self {
        Self {
            assignment_id: Uuid::new_v4(),
            user_id,
            role_id,
            assigned_utc: Utc::now(),
            assigned_by,
            expires_utc: None,
            active: true,
        }
    }

    /// An assignment counts iff its flag is set and it has not expired.
    pub fn is_currently_active(&self) -> bool {
        self.active && self.expires_utc.is_none_or(|expiry| expiry > Utc::now())
    }
}

/// Flattened assignment+role join row, as read back for authority aggregation.
#[derive(Debug, Clone, FromRow)]
pub struct RoleGrant {
    pub assignment_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub role_name: String,
    pub permissions: Vec<String>,
    pub role_active: bool,
    pub assignment_active: bool,
    pub expires_utc: Option<DateTime<Utc>>,
}

impl RoleGrant {
    pub fn is_currently_active(&self) -> bool {
        self.assignment_active && self.expires_utc.is_none_or(|expiry| expiry > Utc::now())
    }
}
