//! Tenant administration surface: provisioning, settings, deactivation.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    AuditEvent, AuditEventType, ProvisionTenantRequest, RoleAssignment, Tenant, UpdateTenantRequest,
    User, ADMIN_ROLE,
};
use crate::services::{AuditRecorder, ServiceError};
use crate::store::{RoleStore, TenantStore, UserStore};
use crate::utils::{generate_token, hash_password, hash_token, Password};

/// Result of provisioning: the tenant, its first administrator, and the
/// client secret plaintext — returned exactly once, only a digest is stored.
#[derive(Debug)]
pub struct ProvisionOutcome {
    pub tenant: Tenant,
    pub admin: User,
    pub client_secret: String,
}

#[derive(Clone)]
pub struct TenantService {
    tenants: Arc<dyn TenantStore>,
    users: Arc<dyn UserStore>,
    roles: Arc<dyn RoleStore>,
    audit: AuditRecorder,
}

impl TenantService {
    pub fn new(
        tenants: Arc<dyn TenantStore>,
        users: Arc<dyn UserStore>,
        roles: Arc<dyn RoleStore>,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            tenants,
            users,
            roles,
            audit,
        }
    }

    /// Create a tenant together with its first administrator and the admin's
    /// system-attributed role assignment.
    pub async fn provision(
        &self,
        request: ProvisionTenantRequest,
    ) -> Result<ProvisionOutcome, ServiceError> {
        request.validate()?;

        let client_secret = generate_token();
        let mut tenant = Tenant::new(
            request.display_name,
            request.domain,
            hash_token(&client_secret),
            request.redirect_uris,
            request.plan_code,
        );
        if let Some(scopes) = request.allowed_scopes {
            tenant.allowed_scopes = scopes;
        }
        self.tenants.insert(&tenant).await?;

        let password_hash = hash_password(&Password::new(request.admin.password))
            .map_err(ServiceError::Infrastructure)?;
        let mut admin = User::new(
            tenant.tenant_id,
            request.admin.username,
            request.admin.email,
            password_hash.into_string(),
        );
        admin.first_name = request.admin.first_name;
        admin.last_name = request.admin.last_name;
        admin.tenant_admin = true;
        admin.email_verified = true;
        self.users.insert(&admin).await?;

        if let Some(role) = self.roles.find_by_name(ADMIN_ROLE).await? {
            self.roles
                .insert_assignment(&RoleAssignment::new(admin.user_id, role.role_id, None))
                .await?;
            self.audit
                .record(AuditEvent::tenant_event(
                    tenant.tenant_id,
                    Some(admin.user_id),
                    AuditEventType::RoleAssigned,
                    format!("Role {} assigned to {}", role.name, admin.username),
                    None,
                ))
                .await;
        } else {
            tracing::warn!(role = ADMIN_ROLE, "Admin role missing, first administrator has no role");
        }

        self.audit
            .record(AuditEvent::tenant_event(
                tenant.tenant_id,
                Some(admin.user_id),
                AuditEventType::TenantCreated,
                format!("Tenant {} provisioned", tenant.display_name),
                Some(json!({ "domain": tenant.domain, "client_id": tenant.client_id })),
            ))
            .await;

        tracing::info!(tenant_id = %tenant.tenant_id, domain = %tenant.domain, "Tenant provisioned");
        Ok(ProvisionOutcome {
            tenant,
            admin,
            client_secret,
        })
    }

    pub async fn get(&self, tenant_id: Uuid) -> Result<Option<Tenant>, ServiceError> {
        Ok(self.tenants.find_by_id(tenant_id).await?)
    }

    /// Apply settings updates. Callers holding materialized client
    /// descriptors must invalidate them afterwards.
    pub async fn update_settings(
        &self,
        tenant_id: Uuid,
        request: UpdateTenantRequest,
    ) -> Result<Tenant, ServiceError> {
        let mut tenant = self
            .tenants
            .find_by_id(tenant_id)
            .await?
            .ok_or(ServiceError::TenantNotFound)?;

        if let Some(display_name) = request.display_name {
            tenant.display_name = display_name;
        }
        if let Some(redirect_uris) = request.redirect_uris {
            tenant.redirect_uris = redirect_uris;
        }
        if let Some(allowed_scopes) = request.allowed_scopes {
            tenant.allowed_scopes = allowed_scopes;
        }
        if let Some(require_pkce) = request.require_pkce {
            tenant.require_pkce = require_pkce;
        }
        if let Some(plan_code) = request.plan_code {
            tenant.plan_code = Some(plan_code);
        }
        tenant.updated_utc = Utc::now();
        self.tenants.update(&tenant).await?;

        self.audit.record_async(AuditEvent::tenant_event(
            tenant.tenant_id,
            None,
            AuditEventType::TenantUpdated,
            format!("Tenant {} settings updated", tenant.display_name),
            None,
        ));

        Ok(tenant)
    }

    /// Flag flip, never a physical delete. All identity resolution for the
    /// tenant's users fails closed afterwards.
    pub async fn deactivate(&self, tenant_id: Uuid) -> Result<bool, ServiceError> {
        let deactivated = self.tenants.deactivate(tenant_id).await?;
        if deactivated {
            self.audit
                .record(AuditEvent::tenant_event(
                    tenant_id,
                    None,
                    AuditEventType::TenantDeactivated,
                    "Tenant deactivated",
                    None,
                ))
                .await;
            tracing::info!(tenant_id = %tenant_id, "Tenant deactivated");
        }
        Ok(deactivated)
    }

    pub async fn list_active(&self) -> Result<Vec<Tenant>, ServiceError> {
        Ok(self.tenants.list_active().await?)
    }
}
