//! Invitation lifecycle with global uniqueness deconfliction.
//!
//! State machine per invited user: Pending → Accepted, Pending → Cancelled,
//! or Pending → Expired (lazily detected through the validity checks; bulk
//! cleanup belongs to a janitor collaborator).

use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    AuditEvent, AuditEventType, NameOverrides, RoleAssignment, User, ADMIN_ROLE, DEFAULT_ROLE,
};
use crate::services::notifier::{InvitationNotice, InvitationNotifier};
use crate::services::{AuditRecorder, ServiceError};
use crate::store::{RoleStore, StoreError, TenantStore, UserStore};
use crate::utils::{hash_password, hash_token, generate_token, Password};

/// Minimum accepted password length, matching the platform policy.
const MIN_PASSWORD_LEN: usize = 8;

/// Bound on deconfliction variants tried before giving up.
const DECONFLICT_ATTEMPTS: u32 = 5;

/// Request to invite a user into a tenant.
#[derive(Debug, Deserialize, Validate)]
pub struct InviteUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub tenant_admin: bool,
    /// Explicit role ids; unknown ids are skipped, not rejected.
    pub role_ids: Vec<Uuid>,
    pub validity_days: Option<i64>,
    pub custom_message: Option<String>,
}

/// Result of a successful invitation.
#[derive(Debug)]
pub struct InvitationOutcome {
    pub user: User,
    /// The address the notification went to, as requested by the caller.
    pub requested_email: String,
    /// Opaque acceptance token; also delivered through the notifier.
    pub token: String,
    /// Whether the stored email differs from the requested one.
    pub email_deconflicted: bool,
}

#[derive(Clone)]
pub struct InvitationService {
    tenants: Arc<dyn TenantStore>,
    users: Arc<dyn UserStore>,
    roles: Arc<dyn RoleStore>,
    audit: AuditRecorder,
    notifier: Arc<dyn InvitationNotifier>,
    default_validity_days: i64,
}

impl InvitationService {
    pub fn new(
        tenants: Arc<dyn TenantStore>,
        users: Arc<dyn UserStore>,
        roles: Arc<dyn RoleStore>,
        audit: AuditRecorder,
        notifier: Arc<dyn InvitationNotifier>,
        default_validity_days: i64,
    ) -> Self {
        Self {
            tenants,
            users,
            roles,
            audit,
            notifier,
            default_validity_days,
        }
    }

    /// Create a pending account with deconflicted identifiers and hand the
    /// invitation to the delivery channel.
    pub async fn invite(
        &self,
        tenant_id: Uuid,
        invited_by: Uuid,
        request: InviteUserRequest,
    ) -> Result<InvitationOutcome, ServiceError> {
        request.validate()?;

        let tenant = self
            .tenants
            .find_by_id(tenant_id)
            .await?
            .ok_or(ServiceError::TenantNotFound)?;
        if !tenant.is_active() {
            return Err(ServiceError::TenantInactive);
        }

        let domain_slug = domain_slug(&tenant.domain);
        let (stored_email, mut email_deconflicted) =
            self.deconflicted_email(&request.email, &domain_slug).await?;
        let (stored_username, _) = self
            .deconflicted_username(&request.username, &domain_slug)
            .await?;

        let validity_days = request.validity_days.unwrap_or(self.default_validity_days);
        let token = generate_token();
        let expires_utc = Utc::now() + Duration::days(validity_days);

        let mut user = User::new_invited(
            tenant_id,
            stored_username,
            stored_email,
            hash_token(&token),
            expires_utc,
            invited_by,
        );
        user.first_name = request.first_name.clone();
        user.last_name = request.last_name.clone();
        user.tenant_admin = request.tenant_admin;

        // The exists-then-insert sequence is not atomic against a racing
        // invitation; the store's unique indexes arbitrate. One optimistic
        // retry with the next deconfliction variant, then give up.
        if let Err(e) = self.users.insert(&user).await {
            match e {
                StoreError::UniqueViolation(_) => {
                    let (email, deconflicted) =
                        self.deconflicted_email(&request.email, &domain_slug).await?;
                    let (username, _) = self
                        .deconflicted_username(&request.username, &domain_slug)
                        .await?;
                    user.email = email;
                    user.username = username;
                    email_deconflicted = deconflicted;
                    if deconflicted {
                        tracing::warn!(
                            tenant_id = %tenant_id,
                            "Invitation lost a uniqueness race, retrying with deconflicted identifiers"
                        );
                    }
                    self.users.insert(&user).await?;
                }
                other => return Err(other.into()),
            }
        }

        let (assigned_roles, skipped_role_ids) = self.assign_roles(&user, invited_by, &request).await?;

        self.audit
            .record(AuditEvent::tenant_event(
                tenant_id,
                Some(user.user_id),
                AuditEventType::UserCreated,
                format!("User {} invited by {}", user.username, invited_by),
                Some(json!({
                    "via_invitation": true,
                    "roles": assigned_roles,
                    "skipped_role_ids": skipped_role_ids,
                    "email_deconflicted": email_deconflicted,
                })),
            ))
            .await;

        // Fire-and-forget: a delivery failure does not roll back the
        // invitation, the account stays redeemable through the token.
        let notifier = self.notifier.clone();
        let notice = InvitationNotice {
            email: request.email.clone(),
            username: user.username.clone(),
            tenant_name: tenant.display_name.clone(),
            invited_by,
            token: token.clone(),
            expires_days: validity_days,
            custom_message: request.custom_message.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&notice).await {
                tracing::warn!(error = %e, "Failed to deliver invitation notification");
            }
        });

        Ok(InvitationOutcome {
            user,
            requested_email: request.email,
            token,
            email_deconflicted,
        })
    }

    /// Redeem an invitation token: set the credential, clear the pending
    /// state, mark the email verified.
    pub async fn accept_invitation(
        &self,
        token: &str,
        password: &str,
        confirm_password: &str,
        overrides: Option<NameOverrides>,
    ) -> Result<User, ServiceError> {
        if password != confirm_password {
            return Err(ServiceError::PasswordMismatch);
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(ServiceError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let user = self
            .users
            .find_by_invitation_token_hash(&hash_token(token))
            .await?;
        let Some(mut user) = user.filter(User::invitation_is_valid) else {
            return Err(ServiceError::InvalidOrExpiredToken);
        };

        let password_hash =
            hash_password(&Password::new(password.to_string())).map_err(ServiceError::Infrastructure)?;

        user.password_hash = Some(password_hash.into_string());
        user.invitation_token_hash = None;
        user.invitation_expires_utc = None;
        user.email_verified = true;
        if let Some(overrides) = overrides {
            if overrides.first_name.is_some() {
                user.first_name = overrides.first_name;
            }
            if overrides.last_name.is_some() {
                user.last_name = overrides.last_name;
            }
        }
        user.updated_utc = Utc::now();
        self.users.update(&user).await?;

        self.audit
            .record(AuditEvent::tenant_event(
                user.tenant_id,
                Some(user.user_id),
                AuditEventType::InvitationAccepted,
                format!("User {} accepted their invitation", user.username),
                None,
            ))
            .await;

        tracing::info!(user_id = %user.user_id, "Invitation accepted");
        Ok(user)
    }

    /// Extend the invitation and re-trigger delivery. Tokens are stored as
    /// digests, so resending issues a fresh token; the superseded one stops
    /// working. Returns false when the target is not pending.
    pub async fn resend_invitation(&self, user_id: Uuid) -> Result<bool, ServiceError> {
        let Some(mut user) = self.users.find_by_id(user_id).await? else {
            return Ok(false);
        };
        if !user.is_pending() {
            return Ok(false);
        }
        let Some(tenant) = self.tenants.find_by_id(user.tenant_id).await? else {
            return Ok(false);
        };
        if !tenant.is_active() {
            return Ok(false);
        }

        let token = generate_token();
        user.invitation_token_hash = Some(hash_token(&token));
        user.invitation_expires_utc = Some(Utc::now() + Duration::days(self.default_validity_days));
        user.updated_utc = Utc::now();
        self.users.update(&user).await?;

        self.audit
            .record(AuditEvent::tenant_event(
                user.tenant_id,
                Some(user.user_id),
                AuditEventType::InvitationResent,
                format!("Invitation for {} resent", user.username),
                None,
            ))
            .await;

        let notifier = self.notifier.clone();
        let notice = InvitationNotice {
            email: user.email.clone(),
            username: user.username.clone(),
            tenant_name: tenant.display_name.clone(),
            invited_by: user.invited_by.unwrap_or(user.user_id),
            token,
            expires_days: self.default_validity_days,
            custom_message: None,
        };
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&notice).await {
                tracing::warn!(error = %e, "Failed to deliver invitation notification");
            }
        });

        Ok(true)
    }

    /// Soft-delete a pending invitation. Returns false when the target is not
    /// pending; that is a benign idempotent outcome, not an error.
    pub async fn cancel_invitation(&self, user_id: Uuid) -> Result<bool, ServiceError> {
        let Some(mut user) = self.users.find_by_id(user_id).await? else {
            return Ok(false);
        };
        if !user.is_pending() {
            return Ok(false);
        }

        user.active = false;
        user.updated_utc = Utc::now();
        self.users.update(&user).await?;

        self.audit
            .record(AuditEvent::tenant_event(
                user.tenant_id,
                Some(user.user_id),
                AuditEventType::InvitationCancelled,
                format!("Invitation for {} cancelled", user.username),
                None,
            ))
            .await;

        Ok(true)
    }

    /// Assign requested roles, the default role, and the admin role for
    /// tenant-admin invitees.
    ///
    /// Unknown or unassignable role ids are skipped, not rejected; the
    /// skipped ids land in the audit metadata.
    async fn assign_roles(
        &self,
        user: &User,
        invited_by: Uuid,
        request: &InviteUserRequest,
    ) -> Result<(Vec<String>, Vec<Uuid>), ServiceError> {
        let mut assigned = Vec::new();
        let mut assigned_ids = Vec::new();
        let mut skipped = Vec::new();

        if request.role_ids.is_empty() {
            if let Some(role) = self.roles.find_by_name(DEFAULT_ROLE).await? {
                self.roles
                    .insert_assignment(&RoleAssignment::new(
                        user.user_id,
                        role.role_id,
                        Some(invited_by),
                    ))
                    .await?;
                assigned_ids.push(role.role_id);
                assigned.push(role.name);
            } else {
                tracing::warn!(role = DEFAULT_ROLE, "Default role missing, invitee has no role");
            }
        } else {
            for role_id in &request.role_ids {
                match self.roles.find_by_id(*role_id).await? {
                    Some(role) if role.can_be_assigned() => {
                        self.roles
                            .insert_assignment(&RoleAssignment::new(
                                user.user_id,
                                role.role_id,
                                Some(invited_by),
                            ))
                            .await?;
                        assigned_ids.push(role.role_id);
                        assigned.push(role.name);
                    }
                    Some(role) => {
                        tracing::warn!(role_id = %role_id, role = %role.name, "Skipping unassignable role");
                        skipped.push(*role_id);
                    }
                    None => {
                        tracing::warn!(role_id = %role_id, "Skipping unknown role id");
                        skipped.push(*role_id);
                    }
                }
            }
        }

        if request.tenant_admin {
            if let Some(role) = self.roles.find_by_name(ADMIN_ROLE).await? {
                if !assigned_ids.contains(&role.role_id) {
                    self.roles
                        .insert_assignment(&RoleAssignment::new(
                            user.user_id,
                            role.role_id,
                            Some(invited_by),
                        ))
                        .await?;
                    assigned.push(role.name);
                }
            } else {
                tracing::warn!(role = ADMIN_ROLE, "Admin role missing for tenant-admin invitee");
            }
        }

        Ok((assigned, skipped))
    }

    /// Find a stored email that does not collide globally. The variant keeps
    /// the mailbox recognizable for display; the notification always goes to
    /// the requested address.
    async fn deconflicted_email(
        &self,
        requested: &str,
        domain_slug: &str,
    ) -> Result<(String, bool), ServiceError> {
        if !self.users.exists_by_email(requested).await? {
            return Ok((requested.to_string(), false));
        }
        for attempt in 0..DECONFLICT_ATTEMPTS {
            let candidate = deconflict_email(requested, domain_slug, attempt);
            if !self.users.exists_by_email(&candidate).await? {
                return Ok((candidate, true));
            }
        }
        Err(ServiceError::Conflict(format!(
            "unable to deconflict email {requested}"
        )))
    }

    async fn deconflicted_username(
        &self,
        requested: &str,
        domain_slug: &str,
    ) -> Result<(String, bool), ServiceError> {
        if !self.users.exists_by_username(requested).await? {
            return Ok((requested.to_string(), false));
        }
        for attempt in 0..DECONFLICT_ATTEMPTS {
            let candidate = deconflict_username(requested, domain_slug, attempt);
            if !self.users.exists_by_username(&candidate).await? {
                return Ok((candidate, true));
            }
        }
        Err(ServiceError::Conflict(format!(
            "unable to deconflict username {requested}"
        )))
    }
}

fn domain_slug(domain: &str) -> String {
    domain
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// Deterministic collision-avoidance transform seeded by the tenant domain:
/// a plus-tag on the local part, with a numeric suffix on later attempts.
fn deconflict_email(email: &str, domain_slug: &str, attempt: u32) -> String {
    let (local, domain) = match email.split_once('@') {
        Some(parts) => parts,
        None => (email, ""),
    };
    let tagged = if attempt == 0 {
        format!("{local}+{domain_slug}")
    } else {
        format!("{local}+{domain_slug}-{}", attempt + 1)
    };
    if domain.is_empty() {
        tagged
    } else {
        format!("{tagged}@{domain}")
    }
}

fn deconflict_username(username: &str, domain_slug: &str, attempt: u32) -> String {
    if attempt == 0 {
        format!("{username}.{domain_slug}")
    } else {
        format!("{username}.{domain_slug}-{}", attempt + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_deconfliction_is_deterministic_and_distinct() {
        let first = deconflict_email("a@acme.test", "globex-test", 0);
        assert_eq!(first, "a+globex-test@acme.test");
        assert_eq!(first, deconflict_email("a@acme.test", "globex-test", 0));

        let second = deconflict_email("a@acme.test", "globex-test", 1);
        assert_ne!(first, second);
        assert!(second.ends_with("@acme.test"));
    }

    #[test]
    fn username_deconfliction_appends_domain_slug() {
        assert_eq!(
            deconflict_username("alice", "globex-test", 0),
            "alice.globex-test"
        );
        assert_eq!(
            deconflict_username("alice", "globex-test", 2),
            "alice.globex-test-3"
        );
    }

    #[test]
    fn domain_slug_flattens_separators() {
        assert_eq!(domain_slug("acme.test"), "acme-test");
        assert_eq!(domain_slug("sub.acme.co"), "sub-acme-co");
    }
}
