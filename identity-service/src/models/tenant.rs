//! Tenant model - root of the multi-tenancy hierarchy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Tenant entity.
///
/// A tenant is never physically deleted; `active = false` makes every
/// identity resolution for its users fail closed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub tenant_id: Uuid,
    pub display_name: String,
    /// Unique domain slug, e.g. `acme.test`.
    pub domain: String,
    /// OAuth2 client identifier, derived deterministically from `tenant_id`.
    pub client_id: String,
    /// Client secret digest; the plaintext is returned once at provisioning.
    pub client_secret_hash: String,
    pub redirect_uris: Vec<String>,
    /// Allowed OAuth2 scopes; empty means "use the platform defaults".
    pub allowed_scopes: Vec<String>,
    pub require_pkce: bool,
    pub active: bool,
    pub plan_code: Option<String>,
    /// Legacy API key, being phased out.
    pub api_key: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Derive the OAuth2 client identifier for a tenant.
///
/// Deterministic: the same tenant id always yields the same client id, so the
/// value can be recomputed instead of independently assigned.
pub fn derive_client_id(tenant_id: Uuid) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tenant_id.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("tnt-{}", &digest[..20])
}

impl Tenant {
    /// Create a new active tenant with a derived client identifier.
    pub fn new(
        display_name: String,
        domain: String,
        client_secret_hash: String,
        redirect_uris: Vec<String>,
        plan_code: Option<String>,
    ) -> Self {
        let tenant_id = Uuid::new_v4();
        let now = Utc::now();
        Self {
            tenant_id,
            display_name,
            domain,
            client_id: derive_client_id(tenant_id),
            client_secret_hash,
            redirect_uris,
            allowed_scopes: Vec::new(),
            require_pkce: false,
            active: true,
            plan_code,
            api_key: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Request to provision a tenant together with its first administrator.
#[derive(Debug, Deserialize, Validate)]
pub struct ProvisionTenantRequest {
    #[validate(length(min = 1, max = 128))]
    pub display_name: String,
    #[validate(length(min = 1, max = 128))]
    pub domain: String,
    pub redirect_uris: Vec<String>,
    pub allowed_scopes: Option<Vec<String>>,
    pub plan_code: Option<String>,
    #[validate(nested)]
    pub admin: AdminSeed,
}

/// First administrator created as part of tenant provisioning.
#[derive(Debug, Deserialize, Validate)]
pub struct AdminSeed {
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Request to update tenant settings. `None` fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTenantRequest {
    pub display_name: Option<String>,
    pub redirect_uris: Option<Vec<String>>,
    pub allowed_scopes: Option<Vec<String>>,
    pub require_pkce: Option<bool>,
    pub plan_code: Option<String>,
}

/// Tenant response for administration surfaces (no secret material).
#[derive(Debug, Serialize)]
pub struct TenantResponse {
    pub tenant_id: Uuid,
    pub display_name: String,
    pub domain: String,
    pub client_id: String,
    pub redirect_uris: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub require_pkce: bool,
    pub active: bool,
    pub plan_code: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl From<Tenant> for TenantResponse {
    fn from(t: Tenant) -> Self {
        Self {
            tenant_id: t.tenant_id,
            display_name: t.display_name,
            domain: t.domain,
            client_id: t.client_id,
            redirect_uris: t.redirect_uris,
            allowed_scopes: t.allowed_scopes,
            require_pkce: t.require_pkce,
            active: t.active,
            plan_code: t.plan_code,
            created_utc: t.created_utc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_client_id_is_deterministic() {
        let id = Uuid::new_v4();
        assert_eq!(derive_client_id(id), derive_client_id(id));
    }

    #[test]
    fn derived_client_id_differs_per_tenant() {
        assert_ne!(
            derive_client_id(Uuid::new_v4()),
            derive_client_id(Uuid::new_v4())
        );
    }

    #[test]
    fn derived_client_id_has_fixed_shape() {
        let client_id = derive_client_id(Uuid::new_v4());
        assert!(client_id.starts_with("tnt-"));
        assert_eq!(client_id.len(), 24);
    }
}
