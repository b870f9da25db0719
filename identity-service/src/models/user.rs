//! User model - tenant-scoped principals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User entity (tenant-scoped).
///
/// A user created through an invitation starts in the pending state: no
/// password hash, invitation token set. Accepting the invitation sets the
/// credential and clears the token; the two are never both present.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub email: String,
    /// Null while an invitation is pending.
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub active: bool,
    pub tenant_admin: bool,
    pub email_verified: bool,
    pub locked: bool,
    pub password_expires_utc: Option<DateTime<Utc>>,
    /// Digest of the outstanding invitation token, if any.
    pub invitation_token_hash: Option<String>,
    pub invitation_expires_utc: Option<DateTime<Utc>>,
    pub invited_by: Option<Uuid>,
    pub last_login_utc: Option<DateTime<Utc>>,
    pub failed_login_count: i32,
    pub last_failed_login_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl User {
    /// Create an active, credentialed user (administrator flow).
    pub fn new(
        tenant_id: Uuid,
        username: String,
        email: String,
        password_hash: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            tenant_id,
            username,
            email,
            password_hash: Some(password_hash),
            first_name: None,
            last_name: None,
            active: true,
            tenant_admin: false,
            email_verified: false,
            locked: false,
            password_expires_utc: None,
            invitation_token_hash: None,
            invitation_expires_utc: None,
            invited_by: None,
            last_login_utc: None,
            failed_login_count: 0,
            last_failed_login_utc: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// Create a pending user from an invitation.
    pub fn new_invited(
        tenant_id: Uuid,
        username: String,
        email: String,
        invitation_token_hash: String,
        invitation_expires_utc: DateTime<Utc>,
        invited_by: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            tenant_id,
            username,
            email,
            password_hash: None,
            first_name: None,
            last_name: None,
            active: true,
            tenant_admin: false,
            email_verified: false,
            locked: false,
            password_expires_utc: None,
            invitation_token_hash: Some(invitation_token_hash),
            invitation_expires_utc: Some(invitation_expires_utc),
            invited_by: Some(invited_by),
            last_login_utc: None,
            failed_login_count: 0,
            last_failed_login_utc: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// A pending account has an outstanding invitation token and no credential.
    pub fn is_pending(&self) -> bool {
        self.active && self.password_hash.is_none() && self.invitation_token_hash.is_some()
    }

    /// Whether the outstanding invitation, if any, is still redeemable.
    pub fn invitation_is_valid(&self) -> bool {
        self.is_pending()
            && self
                .invitation_expires_utc
                .is_some_and(|expiry| expiry > Utc::now())
    }

    /// Convert to a sanitized response (no credential or token material).
    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self.clone())
    }
}

/// User response for API surfaces (without sensitive fields).
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub active: bool,
    pub tenant_admin: bool,
    pub email_verified: bool,
    pub locked: bool,
    pub last_login_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            tenant_id: u.tenant_id,
            username: u.username,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            active: u.active,
            tenant_admin: u.tenant_admin,
            email_verified: u.email_verified,
            locked: u.locked,
            last_login_utc: u.last_login_utc,
            created_utc: u.created_utc,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NameOverrides {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn invited_user_is_pending_until_credentialed() {
        let user = User::new_invited(
            Uuid::new_v4(),
            "alice".to_string(),
            "a@acme.test".to_string(),
            "digest".to_string(),
            Utc::now() + Duration::days(7),
            Uuid::new_v4(),
        );
        assert!(user.is_pending());
        assert!(user.invitation_is_valid());

        let mut accepted = user.clone();
        accepted.password_hash = Some("hash".to_string());
        accepted.invitation_token_hash = None;
        assert!(!accepted.is_pending());
    }

    #[test]
    fn expired_invitation_is_not_valid() {
        let user = User::new_invited(
            Uuid::new_v4(),
            "bob".to_string(),
            "b@acme.test".to_string(),
            "digest".to_string(),
            Utc::now() - Duration::hours(1),
            Uuid::new_v4(),
        );
        assert!(user.is_pending());
        assert!(!user.invitation_is_valid());
    }
}
