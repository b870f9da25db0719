//! Shared test harness: the engine wired to the in-memory store and a
//! recording notifier.

#![allow(dead_code)]

use std::sync::Arc;

use identity_service::config::{
    DatabaseConfig, EngineConfig, Environment, InvitationConfig, SecurityConfig, SmtpConfig,
};
use identity_service::models::{AdminSeed, ProvisionTenantRequest, Role};
use identity_service::services::{MockNotifier, ProvisionOutcome};
use identity_service::store::{MemoryStore, RoleStore, StoreHandles};
use identity_service::IdentityEngine;

pub struct TestEngine {
    pub engine: IdentityEngine,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<MockNotifier>,
    pub config: EngineConfig,
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        environment: Environment::Dev,
        service_name: "identity-service".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        database: DatabaseConfig {
            url: "postgres://localhost/identity_test".to_string(),
            max_connections: 5,
            min_connections: 1,
        },
        smtp: SmtpConfig {
            relay: "localhost".to_string(),
            port: 587,
            username: "test".to_string(),
            password: "test".to_string(),
            from_email: "noreply@platform.test".to_string(),
        },
        invitation: InvitationConfig {
            validity_days: 7,
            accept_base_url: "http://localhost:3000".to_string(),
        },
        security: SecurityConfig {
            max_failed_logins: 5,
        },
    }
}

/// Build an engine over a fresh in-memory store with the platform roles
/// seeded, as the migrations would.
pub async fn spawn_engine() -> TestEngine {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(MockNotifier::new());
    let config = test_config();

    seed_roles(store.as_ref()).await;

    let engine = IdentityEngine::new(
        &config,
        StoreHandles::from_memory(store.clone()),
        notifier.clone(),
    );

    TestEngine {
        engine,
        store,
        notifier,
        config,
    }
}

pub async fn seed_roles(store: &MemoryStore) {
    store
        .insert_role(&Role::new(
            "USER".to_string(),
            Some("Default role for invited users".to_string()),
            vec!["documents:read".to_string(), "chat:access".to_string()],
        ))
        .await
        .expect("Failed to seed USER role");
    store
        .insert_role(&Role::new(
            "ADMIN".to_string(),
            Some("Tenant administration role".to_string()),
            vec![
                "documents:read".to_string(),
                "documents:write".to_string(),
                "chat:access".to_string(),
                "users:manage".to_string(),
                "tenant:settings".to_string(),
            ],
        ))
        .await
        .expect("Failed to seed ADMIN role");
}

pub fn provision_request(domain: &str) -> ProvisionTenantRequest {
    let name = domain
        .split('.')
        .next()
        .unwrap_or(domain)
        .to_ascii_uppercase();
    ProvisionTenantRequest {
        display_name: name,
        domain: domain.to_string(),
        redirect_uris: vec![format!("https://{}/oauth/callback", domain)],
        allowed_scopes: None,
        plan_code: Some("standard".to_string()),
        admin: AdminSeed {
            username: "admin".to_string(),
            email: format!("admin@{}", domain),
            password: "AdminSecret123".to_string(),
            first_name: Some("Admin".to_string()),
            last_name: None,
        },
    }
}

pub async fn provision_tenant(harness: &TestEngine, domain: &str) -> ProvisionOutcome {
    harness
        .engine
        .tenants
        .provision(provision_request(domain))
        .await
        .expect("Failed to provision tenant")
}

/// Let spawned fire-and-forget tasks (notifications) run.
pub async fn drain_background_tasks() {
    tokio::time::sleep(std::time::Duration::from_millis(25)).await;
}
