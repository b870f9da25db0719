//! Storage boundary: one repository trait per entity.
//!
//! All lookups return `Ok(None)` for absent rows; only infrastructure
//! failures are errors. Inserts surface uniqueness violations as
//! [`StoreError::UniqueViolation`], which services translate to `Conflict`.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AuditEvent, Role, RoleAssignment, RoleGrant, Tenant, User, VerificationToken};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Storage backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn find_by_id(&self, tenant_id: Uuid) -> StoreResult<Option<Tenant>>;
    async fn find_by_domain(&self, domain: &str) -> StoreResult<Option<Tenant>>;
    async fn find_by_client_id(&self, client_id: &str) -> StoreResult<Option<Tenant>>;
    async fn find_by_api_key(&self, api_key: &str) -> StoreResult<Option<Tenant>>;
    async fn exists_by_domain(&self, domain: &str) -> StoreResult<bool>;
    async fn exists_by_client_id(&self, client_id: &str) -> StoreResult<bool>;
    async fn insert(&self, tenant: &Tenant) -> StoreResult<()>;
    async fn update(&self, tenant: &Tenant) -> StoreResult<()>;
    /// Flag flip; returns false if the tenant does not exist.
    async fn deactivate(&self, tenant_id: Uuid) -> StoreResult<bool>;
    async fn list_active(&self) -> StoreResult<Vec<Tenant>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, user_id: Uuid) -> StoreResult<Option<User>>;
    async fn find_by_id_in_tenant(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> StoreResult<Option<User>>;
    async fn find_by_username_in_tenant(
        &self,
        tenant_id: Uuid,
        username: &str,
    ) -> StoreResult<Option<User>>;
    async fn find_by_email_in_tenant(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> StoreResult<Option<User>>;
    /// Global lookups for loose-mode resolution; may return several rows when
    /// migrated data predates deconfliction.
    async fn find_all_by_email(&self, email: &str) -> StoreResult<Vec<User>>;
    async fn find_all_by_username(&self, username: &str) -> StoreResult<Vec<User>>;
    async fn exists_by_email(&self, email: &str) -> StoreResult<bool>;
    async fn exists_by_username(&self, username: &str) -> StoreResult<bool>;
    async fn find_by_invitation_token_hash(&self, token_hash: &str) -> StoreResult<Option<User>>;
    /// Tenant admins ordered by creation time.
    async fn find_tenant_admins(&self, tenant_id: Uuid) -> StoreResult<Vec<User>>;
    async fn insert(&self, user: &User) -> StoreResult<()>;
    async fn update(&self, user: &User) -> StoreResult<()>;
    /// Reset the failure counter and stamp the last login.
    async fn record_login_success(&self, user_id: Uuid, when: DateTime<Utc>) -> StoreResult<()>;
    /// Increment the failure counter, stamp it, and return the new count.
    async fn record_login_failure(&self, user_id: Uuid, when: DateTime<Utc>) -> StoreResult<i32>;
    async fn set_locked(&self, user_id: Uuid, locked: bool) -> StoreResult<()>;

    // Verification tokens are user-scoped; they live here rather than in a
    // store of their own.
    async fn insert_verification_token(&self, token: &VerificationToken) -> StoreResult<()>;
    async fn find_verification_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<VerificationToken>>;
    /// Terminal consumption; returns false if already used or absent.
    async fn mark_verification_token_used(
        &self,
        token_id: Uuid,
        when: DateTime<Utc>,
    ) -> StoreResult<bool>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn find_by_id(&self, role_id: Uuid) -> StoreResult<Option<Role>>;
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Role>>;
    async fn insert_role(&self, role: &Role) -> StoreResult<()>;
    /// Assignment rows joined with their roles, for authority aggregation.
    async fn grants_for_user(&self, user_id: Uuid) -> StoreResult<Vec<RoleGrant>>;
    async fn insert_assignment(&self, assignment: &RoleAssignment) -> StoreResult<()>;
    /// Flag flip; returns false if the assignment does not exist.
    async fn deactivate_assignment(&self, assignment_id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, event: &AuditEvent) -> StoreResult<()>;
    async fn list_for_tenant(&self, tenant_id: Uuid, limit: i64) -> StoreResult<Vec<AuditEvent>>;
}

/// Shared handles to the four repositories; the construction seam for the
/// engine and its services.
#[derive(Clone)]
pub struct StoreHandles {
    pub tenants: Arc<dyn TenantStore>,
    pub users: Arc<dyn UserStore>,
    pub roles: Arc<dyn RoleStore>,
    pub audit: Arc<dyn AuditStore>,
}

impl StoreHandles {
    pub fn from_postgres(store: PgStore) -> Self {
        let store = Arc::new(store);
        Self {
            tenants: store.clone(),
            users: store.clone(),
            roles: store.clone(),
            audit: store,
        }
    }

    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            tenants: store.clone(),
            users: store.clone(),
            roles: store.clone(),
            audit: store,
        }
    }
}
