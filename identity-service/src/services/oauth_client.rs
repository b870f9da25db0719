//! OAuth2 client materialization.
//!
//! Read-only derivation of a ready-to-use client descriptor from a tenant
//! record. No writes; callable at high frequency. Callers cache the result
//! and call [`ClientMaterializer::invalidate`] on tenant update.

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::Tenant;
use crate::services::ServiceError;
use crate::store::TenantStore;

/// Scopes granted when a tenant has none configured.
pub const DEFAULT_SCOPES: [&str; 4] = ["openid", "profile", "documents:read", "chat:access"];

/// Grant types supported for every tenant client.
pub const GRANT_TYPES: [&str; 3] = ["authorization_code", "refresh_token", "client_credentials"];

/// Client authentication methods supported at the token endpoint.
pub const TOKEN_ENDPOINT_AUTH_METHODS: [&str; 2] = ["client_secret_basic", "client_secret_post"];

pub const ACCESS_TOKEN_TTL_SECS: i64 = 3_600;
pub const REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 3_600;
pub const AUTHORIZATION_CODE_TTL_SECS: i64 = 600;

/// Derived OAuth2 client descriptor for one tenant.
#[derive(Debug, Clone, Serialize)]
pub struct ClientDescriptor {
    pub client_id: String,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub post_logout_redirect_uris: Vec<String>,
    pub scopes: Vec<String>,
    pub grant_types: Vec<String>,
    pub token_endpoint_auth_methods: Vec<String>,
    pub require_consent: bool,
    pub require_pkce: bool,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub refresh_token_reuse_allowed: bool,
    pub authorization_code_ttl_secs: i64,
}

#[derive(Clone)]
pub struct ClientMaterializer {
    tenants: Arc<dyn TenantStore>,
}

impl ClientMaterializer {
    pub fn new(tenants: Arc<dyn TenantStore>) -> Self {
        Self { tenants }
    }

    /// Materialize the client descriptor for a tenant. `Ok(None)` when the
    /// tenant is missing or inactive.
    pub async fn materialize(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<ClientDescriptor>, ServiceError> {
        let tenant = self.tenants.find_by_id(tenant_id).await?;
        Ok(tenant.as_ref().and_then(Self::describe))
    }

    /// Materialize by derived client identifier; the lookup path the protocol
    /// layer uses during client authentication.
    pub async fn materialize_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<ClientDescriptor>, ServiceError> {
        let tenant = self.tenants.find_by_client_id(client_id).await?;
        Ok(tenant.as_ref().and_then(Self::describe))
    }

    /// Cache-invalidation hook. This core holds no cache; the hook exists so
    /// a caching collaborator has a single place to subscribe.
    pub fn invalidate(&self, tenant_id: Uuid) {
        tracing::debug!(tenant_id = %tenant_id, "Client descriptor invalidated");
    }

    fn describe(tenant: &Tenant) -> Option<ClientDescriptor> {
        if !tenant.is_active() {
            return None;
        }

        let scopes = if tenant.allowed_scopes.is_empty() {
            DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
        } else {
            tenant.allowed_scopes.clone()
        };

        Some(ClientDescriptor {
            client_id: tenant.client_id.clone(),
            client_name: tenant.display_name.clone(),
            redirect_uris: tenant.redirect_uris.clone(),
            // Post-logout targets reuse the callback list
            post_logout_redirect_uris: tenant.redirect_uris.clone(),
            scopes,
            grant_types: GRANT_TYPES.iter().map(|s| s.to_string()).collect(),
            token_endpoint_auth_methods: TOKEN_ENDPOINT_AUTH_METHODS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            require_consent: true,
            require_pkce: tenant.require_pkce,
            access_token_ttl_secs: ACCESS_TOKEN_TTL_SECS,
            refresh_token_ttl_secs: REFRESH_TOKEN_TTL_SECS,
            refresh_token_reuse_allowed: true,
            authorization_code_ttl_secs: AUTHORIZATION_CODE_TTL_SECS,
        })
    }
}
