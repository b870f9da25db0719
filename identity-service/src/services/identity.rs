//! Identity resolution.
//!
//! Answers "is this principal authenticatable, and what is their resolved
//! identity" under the strict (explicit tenant context) and loose (global
//! lookup, tenant derived from the match) multi-tenancy models.
//!
//! Every failure on the strict and loose paths writes exactly one
//! `LOGIN_FAILED` audit event. Infrastructure failures are logged in full and
//! surfaced as a generic unavailable outcome so internals never reach the
//! caller.

use chrono::Utc;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{AuditEvent, AuditEventType, Tenant, User};
use crate::services::authority::aggregate_authorities;
use crate::services::{AccountUnavailableReason, AuditRecorder, ServiceError};
use crate::store::{RoleStore, StoreError, TenantStore, UserStore};

/// Request context carried into resolution for audit attribution.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn new(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            ip_address,
            user_agent,
        }
    }
}

/// Authenticated, authorization-ready identity.
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub user: User,
    pub tenant: Tenant,
    pub authorities: BTreeSet<String>,
}

#[derive(Clone)]
pub struct IdentityResolver {
    tenants: Arc<dyn TenantStore>,
    users: Arc<dyn UserStore>,
    roles: Arc<dyn RoleStore>,
    audit: AuditRecorder,
    max_failed_logins: i32,
}

impl IdentityResolver {
    pub fn new(
        tenants: Arc<dyn TenantStore>,
        users: Arc<dyn UserStore>,
        roles: Arc<dyn RoleStore>,
        audit: AuditRecorder,
        max_failed_logins: i32,
    ) -> Self {
        Self {
            tenants,
            users,
            roles,
            audit,
            max_failed_logins,
        }
    }

    /// Evaluate whether a found account can authenticate.
    ///
    /// Short-circuit AND in a fixed order; the first failing check names the
    /// reason. The order is stable across releases.
    pub fn evaluate_authenticatability(user: &User) -> Result<(), AccountUnavailableReason> {
        if !user.active {
            return Err(AccountUnavailableReason::Deactivated);
        }
        if !user.email_verified {
            return Err(AccountUnavailableReason::Unverified);
        }
        if user.locked {
            return Err(AccountUnavailableReason::Locked);
        }
        if user
            .password_expires_utc
            .is_some_and(|expiry| expiry <= Utc::now())
        {
            return Err(AccountUnavailableReason::CredentialExpired);
        }
        if user
            .password_hash
            .as_deref()
            .is_none_or(|hash| hash.trim().is_empty())
        {
            return Err(AccountUnavailableReason::NoCredential);
        }
        Ok(())
    }

    /// Strict mode: resolve inside an explicit tenant context.
    pub async fn resolve_by_tenant_and_username(
        &self,
        tenant_id: Uuid,
        username: &str,
        ctx: &RequestContext,
    ) -> Result<ResolvedIdentity, ServiceError> {
        let tenant = match self.tenants.find_by_id(tenant_id).await {
            Ok(tenant) => tenant,
            Err(e) => return self.fail_unavailable(username, Some(tenant_id), None, e, ctx).await,
        };

        let Some(tenant) = tenant else {
            self.audit_login_failure(username, Some(tenant_id), None, "tenant not found", ctx)
                .await;
            return Err(ServiceError::TenantNotFound);
        };
        if !tenant.is_active() {
            self.audit_login_failure(username, Some(tenant_id), None, "tenant is inactive", ctx)
                .await;
            return Err(ServiceError::TenantInactive);
        }

        let user = match self
            .users
            .find_by_username_in_tenant(tenant_id, username)
            .await
        {
            Ok(user) => user,
            Err(e) => return self.fail_unavailable(username, Some(tenant_id), None, e, ctx).await,
        };
        let Some(user) = user else {
            self.audit_login_failure(username, Some(tenant_id), None, "user not found", ctx)
                .await;
            return Err(ServiceError::UserNotFound);
        };

        self.finish_resolution(user, tenant, username, ctx).await
    }

    /// Loose mode: resolve globally by email (input contains `@`) or
    /// username, deriving the tenant from the match.
    ///
    /// Email is expected globally unique, maintained procedurally by the
    /// invitation deconfliction; if pre-deconfliction data still holds
    /// duplicates this fails closed with `AmbiguousIdentity`.
    pub async fn resolve_globally(
        &self,
        identifier: &str,
        ctx: &RequestContext,
    ) -> Result<ResolvedIdentity, ServiceError> {
        let lookup = if identifier.contains('@') {
            self.users.find_all_by_email(identifier).await
        } else {
            self.users.find_all_by_username(identifier).await
        };

        let mut matches = match lookup {
            Ok(matches) => matches,
            Err(e) => return self.fail_unavailable(identifier, None, None, e, ctx).await,
        };

        if matches.len() > 1 {
            self.audit_login_failure(identifier, None, None, "ambiguous identity", ctx)
                .await;
            return Err(ServiceError::AmbiguousIdentity(format!(
                "{} accounts match the identifier",
                matches.len()
            )));
        }
        let Some(user) = matches.pop() else {
            self.audit_login_failure(identifier, None, None, "user not found", ctx)
                .await;
            return Err(ServiceError::UserNotFound);
        };

        let tenant = match self.tenants.find_by_id(user.tenant_id).await {
            Ok(tenant) => tenant,
            Err(e) => {
                return self
                    .fail_unavailable(identifier, Some(user.tenant_id), Some(user.user_id), e, ctx)
                    .await
            }
        };
        let Some(tenant) = tenant else {
            self.audit_login_failure(
                identifier,
                Some(user.tenant_id),
                Some(user.user_id),
                "tenant not found",
                ctx,
            )
            .await;
            return Err(ServiceError::TenantNotFound);
        };
        if !tenant.is_active() {
            self.audit_login_failure(
                identifier,
                Some(tenant.tenant_id),
                Some(user.user_id),
                "tenant is inactive",
                ctx,
            )
            .await;
            return Err(ServiceError::TenantInactive);
        }

        self.finish_resolution(user, tenant, identifier, ctx).await
    }

    /// Token-to-identity revalidation. Any domain failure, including
    /// authentication-ineligibility, is `Ok(None)`; callers typically need a
    /// boolean.
    pub async fn resolve_by_id(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<ResolvedIdentity>, ServiceError> {
        let Some(user) = self.users.find_by_id_in_tenant(user_id, tenant_id).await? else {
            return Ok(None);
        };
        let Some(tenant) = self.tenants.find_by_id(tenant_id).await? else {
            return Ok(None);
        };
        if !tenant.is_active() || Self::evaluate_authenticatability(&user).is_err() {
            return Ok(None);
        }

        let grants = self.roles.grants_for_user(user.user_id).await?;
        let authorities = aggregate_authorities(&grants, user.tenant_admin);
        Ok(Some(ResolvedIdentity {
            user,
            tenant,
            authorities,
        }))
    }

    /// Resolve the acting principal for machine-to-machine flows: the tenant
    /// behind a derived client identifier, acting as its first tenant admin.
    pub async fn resolve_for_service_credentials(
        &self,
        client_id: &str,
    ) -> Result<ResolvedIdentity, ServiceError> {
        let tenant = self
            .tenants
            .find_by_client_id(client_id)
            .await?
            .ok_or(ServiceError::TenantNotFound)?;
        if !tenant.is_active() {
            return Err(ServiceError::TenantInactive);
        }

        let admins = self.users.find_tenant_admins(tenant.tenant_id).await?;
        let user = admins.into_iter().next().ok_or(ServiceError::UserNotFound)?;

        let grants = self.roles.grants_for_user(user.user_id).await?;
        let authorities = aggregate_authorities(&grants, user.tenant_admin);
        Ok(ResolvedIdentity {
            user,
            tenant,
            authorities,
        })
    }

    /// Post-verification bookkeeping: reset the failure counter and stamp the
    /// last login. Called by the protocol layer once the credential checked
    /// out.
    pub async fn record_login_success(
        &self,
        user: &User,
        ctx: &RequestContext,
    ) -> Result<(), ServiceError> {
        self.users
            .record_login_success(user.user_id, Utc::now())
            .await?;
        self.audit
            .record(
                AuditEvent::tenant_event(
                    user.tenant_id,
                    Some(user.user_id),
                    AuditEventType::LoginSuccess,
                    format!("User {} logged in", user.username),
                    None,
                )
                .with_request_context(ctx.ip_address.clone(), ctx.user_agent.clone()),
            )
            .await;
        Ok(())
    }

    /// Post-verification bookkeeping for a rejected credential: increment the
    /// failure counter, lock the account at the configured threshold, and
    /// write the attempt's `LOGIN_FAILED` event. Returns whether the account
    /// is now locked.
    pub async fn record_login_failure(
        &self,
        user: &User,
        ctx: &RequestContext,
    ) -> Result<bool, ServiceError> {
        let count = self
            .users
            .record_login_failure(user.user_id, Utc::now())
            .await?;

        self.audit_login_failure(
            &user.username,
            Some(user.tenant_id),
            Some(user.user_id),
            "invalid credentials",
            ctx,
        )
        .await;

        let should_lock = count >= self.max_failed_logins && !user.locked;
        if should_lock {
            self.users.set_locked(user.user_id, true).await?;
            self.audit
                .record(
                    AuditEvent::tenant_event(
                        user.tenant_id,
                        Some(user.user_id),
                        AuditEventType::AccountLocked,
                        format!(
                            "Account {} locked after {} failed login attempts",
                            user.username, count
                        ),
                        Some(json!({ "failed_login_count": count })),
                    )
                    .with_request_context(ctx.ip_address.clone(), ctx.user_agent.clone()),
                )
                .await;
            tracing::warn!(user_id = %user.user_id, count, "Account locked");
        }

        Ok(should_lock || user.locked)
    }

    async fn finish_resolution(
        &self,
        user: User,
        tenant: Tenant,
        identifier: &str,
        ctx: &RequestContext,
    ) -> Result<ResolvedIdentity, ServiceError> {
        if let Err(reason) = Self::evaluate_authenticatability(&user) {
            self.audit_login_failure(
                identifier,
                Some(tenant.tenant_id),
                Some(user.user_id),
                reason.as_str(),
                ctx,
            )
            .await;
            return Err(ServiceError::AccountUnavailable(reason));
        }

        let grants = match self.roles.grants_for_user(user.user_id).await {
            Ok(grants) => grants,
            Err(e) => {
                return self
                    .fail_unavailable(
                        identifier,
                        Some(tenant.tenant_id),
                        Some(user.user_id),
                        e,
                        ctx,
                    )
                    .await
            }
        };
        let authorities = aggregate_authorities(&grants, user.tenant_admin);

        Ok(ResolvedIdentity {
            user,
            tenant,
            authorities,
        })
    }

    /// Infrastructure failure on a login path: audit, log, downgrade.
    async fn fail_unavailable<T>(
        &self,
        identifier: &str,
        tenant_id: Option<Uuid>,
        user_id: Option<Uuid>,
        err: StoreError,
        ctx: &RequestContext,
    ) -> Result<T, ServiceError> {
        let reason = AccountUnavailableReason::Unavailable;
        self.audit_login_failure(identifier, tenant_id, user_id, reason.as_str(), ctx)
            .await;
        Err(ServiceError::downgrade_infrastructure(
            anyhow::Error::new(err),
            "identity resolution",
        ))
    }

    async fn audit_login_failure(
        &self,
        identifier: &str,
        tenant_id: Option<Uuid>,
        user_id: Option<Uuid>,
        reason: &str,
        ctx: &RequestContext,
    ) {
        let metadata = json!({ "identifier": identifier, "reason": reason });
        let event = match tenant_id {
            Some(tenant_id) => AuditEvent::tenant_event(
                tenant_id,
                user_id,
                AuditEventType::LoginFailed,
                format!("Login failed for {identifier}: {reason}"),
                Some(metadata),
            ),
            None => AuditEvent::system_event(
                AuditEventType::LoginFailed,
                format!("Login failed for {identifier}: {reason}"),
                Some(metadata),
            ),
        };
        self.audit
            .record(event.with_request_context(ctx.ip_address.clone(), ctx.user_agent.clone()))
            .await;
    }
}
