//! PostgreSQL store.
//!
//! Statically typed sqlx queries; one section per entity. Every query here is
//! a fixed, enumerable operation from the store traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use super::{AuditStore, RoleStore, StoreError, StoreResult, TenantStore, UserStore};
use crate::models::{AuditEvent, Role, RoleAssignment, RoleGrant, Tenant, User, VerificationToken};

/// PostgreSQL-backed implementation of all four store traits.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_db_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::UniqueViolation(
            db.constraint().unwrap_or("unique constraint").to_string(),
        ),
        _ => StoreError::Backend(anyhow::anyhow!(e)),
    }
}

#[async_trait]
impl TenantStore for PgStore {
    async fn find_by_id(&self, tenant_id: Uuid) -> StoreResult<Option<Tenant>> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn find_by_domain(&self, domain: &str) -> StoreResult<Option<Tenant>> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE LOWER(domain) = LOWER($1)")
            .bind(domain)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn find_by_client_id(&self, client_id: &str) -> StoreResult<Option<Tenant>> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE client_id = $1")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn find_by_api_key(&self, api_key: &str) -> StoreResult<Option<Tenant>> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE api_key = $1")
            .bind(api_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn exists_by_domain(&self, domain: &str) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM tenants WHERE LOWER(domain) = LOWER($1))",
        )
        .bind(domain)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn exists_by_client_id(&self, client_id: &str) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM tenants WHERE client_id = $1)")
            .bind(client_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn insert(&self, tenant: &Tenant) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tenants (
                tenant_id, display_name, domain, client_id, client_secret_hash,
                redirect_uris, allowed_scopes, require_pkce, active, plan_code,
                api_key, created_utc, updated_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(tenant.tenant_id)
        .bind(&tenant.display_name)
        .bind(&tenant.domain)
        .bind(&tenant.client_id)
        .bind(&tenant.client_secret_hash)
        .bind(&tenant.redirect_uris)
        .bind(&tenant.allowed_scopes)
        .bind(tenant.require_pkce)
        .bind(tenant.active)
        .bind(&tenant.plan_code)
        .bind(&tenant.api_key)
        .bind(tenant.created_utc)
        .bind(tenant.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn update(&self, tenant: &Tenant) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE tenants SET
                display_name = $2, redirect_uris = $3, allowed_scopes = $4,
                require_pkce = $5, active = $6, plan_code = $7, api_key = $8,
                updated_utc = $9
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant.tenant_id)
        .bind(&tenant.display_name)
        .bind(&tenant.redirect_uris)
        .bind(&tenant.allowed_scopes)
        .bind(tenant.require_pkce)
        .bind(tenant.active)
        .bind(&tenant.plan_code)
        .bind(&tenant.api_key)
        .bind(tenant.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn deactivate(&self, tenant_id: Uuid) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE tenants SET active = FALSE, updated_utc = $2 WHERE tenant_id = $1")
                .bind(tenant_id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await
                .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_active(&self) -> StoreResult<Vec<Tenant>> {
        sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE active ORDER BY created_utc")
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_id(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn find_by_id_in_tenant(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1 AND tenant_id = $2")
            .bind(user_id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn find_by_username_in_tenant(
        &self,
        tenant_id: Uuid,
        username: &str,
    ) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE tenant_id = $1 AND LOWER(username) = LOWER($2)",
        )
        .bind(tenant_id)
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn find_by_email_in_tenant(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE tenant_id = $1 AND LOWER(email) = LOWER($2)",
        )
        .bind(tenant_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn find_all_by_email(&self, email: &str) -> StoreResult<Vec<User>> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE LOWER(email) = LOWER($1) ORDER BY created_utc",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn find_all_by_username(&self, username: &str) -> StoreResult<Vec<User>> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE LOWER(username) = LOWER($1) ORDER BY created_utc",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn exists_by_username(&self, username: &str) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1))",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn find_by_invitation_token_hash(&self, token_hash: &str) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE invitation_token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn find_tenant_admins(&self, tenant_id: Uuid) -> StoreResult<Vec<User>> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE tenant_id = $1 AND tenant_admin AND active ORDER BY created_utc",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn insert(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                user_id, tenant_id, username, email, password_hash, first_name,
                last_name, active, tenant_admin, email_verified, locked,
                password_expires_utc, invitation_token_hash, invitation_expires_utc,
                invited_by, last_login_utc, failed_login_count,
                last_failed_login_utc, created_utc, updated_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20)
            "#,
        )
        .bind(user.user_id)
        .bind(user.tenant_id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.active)
        .bind(user.tenant_admin)
        .bind(user.email_verified)
        .bind(user.locked)
        .bind(user.password_expires_utc)
        .bind(&user.invitation_token_hash)
        .bind(user.invitation_expires_utc)
        .bind(user.invited_by)
        .bind(user.last_login_utc)
        .bind(user.failed_login_count)
        .bind(user.last_failed_login_utc)
        .bind(user.created_utc)
        .bind(user.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn update(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                username = $2, email = $3, password_hash = $4, first_name = $5,
                last_name = $6, active = $7, tenant_admin = $8,
                email_verified = $9, locked = $10, password_expires_utc = $11,
                invitation_token_hash = $12, invitation_expires_utc = $13,
                updated_utc = $14
            WHERE user_id = $1
            "#,
        )
        .bind(user.user_id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.active)
        .bind(user.tenant_admin)
        .bind(user.email_verified)
        .bind(user.locked)
        .bind(user.password_expires_utc)
        .bind(&user.invitation_token_hash)
        .bind(user.invitation_expires_utc)
        .bind(user.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn record_login_success(&self, user_id: Uuid, when: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                last_login_utc = $2, failed_login_count = 0,
                last_failed_login_utc = NULL, updated_utc = $2
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(when)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn record_login_failure(&self, user_id: Uuid, when: DateTime<Utc>) -> StoreResult<i32> {
        sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE users SET
                failed_login_count = failed_login_count + 1,
                last_failed_login_utc = $2, updated_utc = $2
            WHERE user_id = $1
            RETURNING failed_login_count
            "#,
        )
        .bind(user_id)
        .bind(when)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn set_locked(&self, user_id: Uuid, locked: bool) -> StoreResult<()> {
        sqlx::query("UPDATE users SET locked = $2, updated_utc = $3 WHERE user_id = $1")
            .bind(user_id)
            .bind(locked)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    async fn insert_verification_token(&self, token: &VerificationToken) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO verification_tokens (
                token_id, token_hash, user_id, email, token_type_code,
                expires_utc, used_utc, created_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(token.token_id)
        .bind(&token.token_hash)
        .bind(token.user_id)
        .bind(&token.email)
        .bind(&token.token_type_code)
        .bind(token.expires_utc)
        .bind(token.used_utc)
        .bind(token.created_utc)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn find_verification_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StoreResult<Option<VerificationToken>> {
        sqlx::query_as::<_, VerificationToken>(
            "SELECT * FROM verification_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn mark_verification_token_used(
        &self,
        token_id: Uuid,
        when: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE verification_tokens SET used_utc = $2 WHERE token_id = $1 AND used_utc IS NULL",
        )
        .bind(token_id)
        .bind(when)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RoleStore for PgStore {
    async fn find_by_id(&self, role_id: Uuid) -> StoreResult<Option<Role>> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE role_id = $1")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn insert_role(&self, role: &Role) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO roles (
                role_id, name, description, permissions, active, created_utc,
                updated_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(role.role_id)
        .bind(&role.name)
        .bind(&role.description)
        .bind(&role.permissions)
        .bind(role.active)
        .bind(role.created_utc)
        .bind(role.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn grants_for_user(&self, user_id: Uuid) -> StoreResult<Vec<RoleGrant>> {
        sqlx::query_as::<_, RoleGrant>(
            r#"
            SELECT a.assignment_id, a.user_id, a.role_id, r.name AS role_name,
                   r.permissions, r.active AS role_active,
                   a.active AS assignment_active, a.expires_utc
            FROM user_role_assignments a
            JOIN roles r ON a.role_id = r.role_id
            WHERE a.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn insert_assignment(&self, assignment: &RoleAssignment) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_role_assignments (
                assignment_id, user_id, role_id, assigned_utc, assigned_by,
                expires_utc, active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(assignment.assignment_id)
        .bind(assignment.user_id)
        .bind(assignment.role_id)
        .bind(assignment.assigned_utc)
        .bind(assignment.assigned_by)
        .bind(assignment.expires_utc)
        .bind(assignment.active)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn deactivate_assignment(&self, assignment_id: Uuid) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE user_role_assignments SET active = FALSE WHERE assignment_id = $1")
                .bind(assignment_id)
                .execute(&self.pool)
                .await
                .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn append(&self, event: &AuditEvent) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (
                event_id, tenant_id, user_id, event_type_code, description,
                ip_address, user_agent, metadata, created_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(event.event_id)
        .bind(event.tenant_id)
        .bind(event.user_id)
        .bind(&event.event_type_code)
        .bind(&event.description)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(&event.metadata)
        .bind(event.created_utc)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn list_for_tenant(&self, tenant_id: Uuid, limit: i64) -> StoreResult<Vec<AuditEvent>> {
        sqlx::query_as::<_, AuditEvent>(
            r#"
            SELECT * FROM audit_events
            WHERE tenant_id = $1
            ORDER BY created_utc DESC
            LIMIT $2
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)
    }
}
