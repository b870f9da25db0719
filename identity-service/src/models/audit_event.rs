//! Audit event model - security and compliance logging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Audit event types. Closed vocabulary; new members require a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    LoginSuccess,
    LoginFailed,
    AccountLocked,
    UserCreated,
    InvitationAccepted,
    InvitationResent,
    InvitationCancelled,
    RoleAssigned,
    TenantCreated,
    TenantUpdated,
    TenantDeactivated,
    PermissionDenied,
    OauthTokenIssued,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::LoginSuccess => "LOGIN_SUCCESS",
            AuditEventType::LoginFailed => "LOGIN_FAILED",
            AuditEventType::AccountLocked => "ACCOUNT_LOCKED",
            AuditEventType::UserCreated => "USER_CREATED",
            AuditEventType::InvitationAccepted => "INVITATION_ACCEPTED",
            AuditEventType::InvitationResent => "INVITATION_RESENT",
            AuditEventType::InvitationCancelled => "INVITATION_CANCELLED",
            AuditEventType::RoleAssigned => "ROLE_ASSIGNED",
            AuditEventType::TenantCreated => "TENANT_CREATED",
            AuditEventType::TenantUpdated => "TENANT_UPDATED",
            AuditEventType::TenantDeactivated => "TENANT_DEACTIVATED",
            AuditEventType::PermissionDenied => "PERMISSION_DENIED",
            AuditEventType::OauthTokenIssued => "OAUTH_TOKEN_ISSUED",
        }
    }
}

/// Audit event entity. Written once, never mutated.
#[derive(Debug, Clone, FromRow)]
pub struct AuditEvent {
    pub event_id: Uuid,
    /// Null means a system-level event.
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub event_type_code: String,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
}

impl AuditEvent {
    /// Create an event attributed to a tenant (and optionally a user).
    pub fn tenant_event(
        tenant_id: Uuid,
        user_id: Option<Uuid>,
        event_type: AuditEventType,
        description: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            tenant_id: Some(tenant_id),
            user_id,
            event_type_code: event_type.as_str().to_string(),
            description: description.into(),
            ip_address: None,
            user_agent: None,
            metadata,
            created_utc: Utc::now(),
        }
    }

    /// Create a system-level event (no tenant).
    pub fn system_event(
        event_type: AuditEventType,
        description: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            tenant_id: None,
            user_id: None,
            event_type_code: event_type.as_str().to_string(),
            description: description.into(),
            ip_address: None,
            user_agent: None,
            metadata,
            created_utc: Utc::now(),
        }
    }

    /// Attach request context (source address and user agent).
    pub fn with_request_context(
        mut self,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

/// Audit event response for reporting surfaces.
#[derive(Debug, Serialize)]
pub struct AuditEventResponse {
    pub event_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub event_type_code: String,
    pub description: String,
    pub ip_address: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
}

impl From<AuditEvent> for AuditEventResponse {
    fn from(e: AuditEvent) -> Self {
        Self {
            event_id: e.event_id,
            tenant_id: e.tenant_id,
            user_id: e.user_id,
            event_type_code: e.event_type_code,
            description: e.description,
            ip_address: e.ip_address,
            metadata: e.metadata,
            created_utc: e.created_utc,
        }
    }
}
