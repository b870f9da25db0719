//! In-memory store.
//!
//! Reference implementation of the store traits over hash maps; used by the
//! test suites and as an executable description of the uniqueness rules the
//! SQL schema enforces with indexes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AuditStore, RoleStore, StoreError, StoreResult, TenantStore, UserStore};
use crate::models::{AuditEvent, Role, RoleAssignment, RoleGrant, Tenant, User, VerificationToken};

#[derive(Default)]
struct Tables {
    tenants: HashMap<Uuid, Tenant>,
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, Role>,
    assignments: HashMap<Uuid, RoleAssignment>,
    audit_events: Vec<AuditEvent>,
    verification_tokens: HashMap<Uuid, VerificationToken>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded audit events, oldest first. Test observation hook.
    pub async fn audit_events(&self) -> Vec<AuditEvent> {
        self.tables.read().await.audit_events.clone()
    }
}

fn conflict(constraint: &str) -> StoreError {
    StoreError::UniqueViolation(constraint.to_string())
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn find_by_id(&self, tenant_id: Uuid) -> StoreResult<Option<Tenant>> {
        Ok(self.tables.read().await.tenants.get(&tenant_id).cloned())
    }

    async fn find_by_domain(&self, domain: &str) -> StoreResult<Option<Tenant>> {
        let tables = self.tables.read().await;
        Ok(tables
            .tenants
            .values()
            .find(|t| t.domain.eq_ignore_ascii_case(domain))
            .cloned())
    }

    async fn find_by_client_id(&self, client_id: &str) -> StoreResult<Option<Tenant>> {
        let tables = self.tables.read().await;
        Ok(tables
            .tenants
            .values()
            .find(|t| t.client_id == client_id)
            .cloned())
    }

    async fn find_by_api_key(&self, api_key: &str) -> StoreResult<Option<Tenant>> {
        let tables = self.tables.read().await;
        Ok(tables
            .tenants
            .values()
            .find(|t| t.api_key.as_deref() == Some(api_key))
            .cloned())
    }

    async fn exists_by_domain(&self, domain: &str) -> StoreResult<bool> {
        Ok(self.find_by_domain(domain).await?.is_some())
    }

    async fn exists_by_client_id(&self, client_id: &str) -> StoreResult<bool> {
        Ok(self.find_by_client_id(client_id).await?.is_some())
    }

    async fn insert(&self, tenant: &Tenant) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables
            .tenants
            .values()
            .any(|t| t.domain.eq_ignore_ascii_case(&tenant.domain))
        {
            return Err(conflict("tenants_domain_key"));
        }
        if tables
            .tenants
            .values()
            .any(|t| t.client_id == tenant.client_id)
        {
            return Err(conflict("tenants_client_id_key"));
        }
        tables.tenants.insert(tenant.tenant_id, tenant.clone());
        Ok(())
    }

    async fn update(&self, tenant: &Tenant) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.tenants.insert(tenant.tenant_id, tenant.clone());
        Ok(())
    }

    async fn deactivate(&self, tenant_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.tenants.get_mut(&tenant_id) {
            Some(tenant) => {
                tenant.active = false;
                tenant.updated_utc = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_active(&self) -> StoreResult<Vec<Tenant>> {
        let tables = self.tables.read().await;
        let mut active: Vec<Tenant> = tables
            .tenants
            .values()
            .filter(|t| t.active)
            .cloned()
            .collect();
        active.sort_by_key(|t| t.created_utc);
        Ok(active)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn find_by_id_in_tenant(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .get(&user_id)
            .filter(|u| u.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_by_username_in_tenant(
        &self,
        tenant_id: Uuid,
        username: &str,
    ) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.tenant_id == tenant_id && u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn find_by_email_in_tenant(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.tenant_id == tenant_id && u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_all_by_email(&self, email: &str) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
            .collect();
        users.sort_by_key(|u| u.created_utc);
        Ok(users)
    }

    async fn find_all_by_username(&self, username: &str) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| u.username.eq_ignore_ascii_case(username))
            .cloned()
            .collect();
        users.sort_by_key(|u| u.created_utc);
        Ok(users)
    }

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        Ok(!self.find_all_by_email(email).await?.is_empty())
    }

    async fn exists_by_username(&self, username: &str) -> StoreResult<bool> {
        Ok(!self.find_all_by_username(username).await?.is_empty())
    }

    async fn find_by_invitation_token_hash(&self, token_hash: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.invitation_token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn find_tenant_admins(&self, tenant_id: Uuid) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut admins: Vec<User> = tables
            .users
            .values()
            .filter(|u| u.tenant_id == tenant_id && u.tenant_admin && u.active)
            .cloned()
            .collect();
        admins.sort_by_key(|u| u.created_utc);
        Ok(admins)
    }

    async fn insert(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| {
            u.tenant_id == user.tenant_id && u.username.eq_ignore_ascii_case(&user.username)
        }) {
            return Err(conflict("users_tenant_id_username_key"));
        }
        if tables
            .users
            .values()
            .any(|u| u.tenant_id == user.tenant_id && u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(conflict("users_tenant_id_email_key"));
        }
        tables.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn record_login_success(&self, user_id: Uuid, when: DateTime<Utc>) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.get_mut(&user_id) {
            user.last_login_utc = Some(when);
            user.failed_login_count = 0;
            user.last_failed_login_utc = None;
            user.updated_utc = when;
        }
        Ok(())
    }

    async fn record_login_failure(&self, user_id: Uuid, when: DateTime<Utc>) -> StoreResult<i32> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::Backend(anyhow::anyhow!("no such user: {user_id}")))?;
        user.failed_login_count += 1;
        user.last_failed_login_utc = Some(when);
        user.updated_utc = when;
        Ok(user.failed_login_count)
    }

    async fn set_locked(&self, user_id: Uuid, locked: bool) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.get_mut(&user_id) {
            user.locked = locked;
            user.updated_utc = Utc::now();
        }
        Ok(())
    }

    async fn insert_verification_token(&self, token: &VerificationToken) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables
            .verification_tokens
            .values()
            .any(|t| t.token_hash == token.token_hash)
        {
            return Err(conflict("verification_tokens_token_hash_key"));
        }
        tables
            .verification_tokens
            .insert(token.token_id, token.clone());
        Ok(())
    }

    async fn find_verification_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<VerificationToken>> {
        let tables = self.tables.read().await;
        Ok(tables
            .verification_tokens
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn mark_verification_token_used(
        &self,
        token_id: Uuid,
        when: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.verification_tokens.get_mut(&token_id) {
            Some(token) if token.used_utc.is_none() => {
                token.used_utc = Some(when);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn find_by_id(&self, role_id: Uuid) -> StoreResult<Option<Role>> {
        Ok(self.tables.read().await.roles.get(&role_id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let tables = self.tables.read().await;
        Ok(tables.roles.values().find(|r| r.name == name).cloned())
    }

    async fn insert_role(&self, role: &Role) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.roles.values().any(|r| r.name == role.name) {
            return Err(conflict("roles_name_key"));
        }
        tables.roles.insert(role.role_id, role.clone());
        Ok(())
    }

    async fn grants_for_user(&self, user_id: Uuid) -> StoreResult<Vec<RoleGrant>> {
        let tables = self.tables.read().await;
        let grants = tables
            .assignments
            .values()
            .filter(|a| a.user_id == user_id)
            .filter_map(|a| {
                tables.roles.get(&a.role_id).map(|role| RoleGrant {
                    assignment_id: a.assignment_id,
                    user_id: a.user_id,
                    role_id: a.role_id,
                    role_name: role.name.clone(),
                    permissions: role.permissions.clone(),
                    role_active: role.active,
                    assignment_active: a.active,
                    expires_utc: a.expires_utc,
                })
            })
            .collect();
        Ok(grants)
    }

    async fn insert_assignment(&self, assignment: &RoleAssignment) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .assignments
            .insert(assignment.assignment_id, assignment.clone());
        Ok(())
    }

    async fn deactivate_assignment(&self, assignment_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.assignments.get_mut(&assignment_id) {
            Some(assignment) => {
                assignment.active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append(&self, event: &AuditEvent) -> StoreResult<()> {
        self.tables.write().await.audit_events.push(event.clone());
        Ok(())
    }

    async fn list_for_tenant(&self, tenant_id: Uuid, limit: i64) -> StoreResult<Vec<AuditEvent>> {
        let tables = self.tables.read().await;
        let mut events: Vec<AuditEvent> = tables
            .audit_events
            .iter()
            .filter(|e| e.tenant_id == Some(tenant_id))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        events.truncate(limit.max(0) as usize);
        Ok(events)
    }
}
