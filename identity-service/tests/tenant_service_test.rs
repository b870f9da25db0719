//! Tenant provisioning and lifecycle integration tests.

mod common;

use common::{provision_request, provision_tenant, spawn_engine};
use identity_service::models::{derive_client_id, UpdateTenantRequest};
use identity_service::services::{RequestContext, ServiceError};
use identity_service::utils::hash_token;

#[tokio::test]
async fn provisioning_creates_tenant_admin_and_assignment() {
    // Arrange
    let harness = spawn_engine().await;

    // Act
    let outcome = provision_tenant(&harness, "acme.test").await;

    // Assert - derived client id and hashed secret
    assert_eq!(
        outcome.tenant.client_id,
        derive_client_id(outcome.tenant.tenant_id)
    );
    assert_eq!(
        outcome.tenant.client_secret_hash,
        hash_token(&outcome.client_secret)
    );

    // First administrator is immediately authenticatable with admin authority
    let identity = harness
        .engine
        .identity
        .resolve_by_tenant_and_username(
            outcome.tenant.tenant_id,
            &outcome.admin.username,
            &RequestContext::default(),
        )
        .await
        .expect("Admin should resolve");
    assert!(identity.user.tenant_admin);
    assert!(identity.authorities.contains("role:ADMIN"));
    assert!(identity.authorities.contains("users:manage"));

    // Audit trail records provisioning and the system role assignment
    let events = harness.store.audit_events().await;
    assert!(events.iter().any(|e| e.event_type_code == "TENANT_CREATED"));
    assert!(events.iter().any(|e| e.event_type_code == "ROLE_ASSIGNED"));
}

#[tokio::test]
async fn duplicate_domain_is_a_conflict() {
    // Arrange
    let harness = spawn_engine().await;
    provision_tenant(&harness, "acme.test").await;

    // Act
    let mut request = provision_request("acme.test");
    request.admin.email = "other@acme.test".to_string();
    request.admin.username = "other".to_string();
    let result = harness.engine.tenants.provision(request).await;

    // Assert
    assert!(matches!(result, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn settings_update_applies_only_provided_fields() {
    // Arrange
    let harness = spawn_engine().await;
    let outcome = provision_tenant(&harness, "acme.test").await;

    // Act
    let updated = harness
        .engine
        .tenants
        .update_settings(
            outcome.tenant.tenant_id,
            UpdateTenantRequest {
                display_name: Some("Acme Corp".to_string()),
                allowed_scopes: Some(vec!["openid".to_string()]),
                ..Default::default()
            },
        )
        .await
        .expect("Update should succeed");

    // Assert
    assert_eq!(updated.display_name, "Acme Corp");
    assert_eq!(updated.allowed_scopes, vec!["openid"]);
    assert_eq!(updated.domain, outcome.tenant.domain);
    assert_eq!(updated.redirect_uris, outcome.tenant.redirect_uris);
}

#[tokio::test]
async fn deactivation_fails_everything_closed() {
    // Arrange
    let harness = spawn_engine().await;
    let outcome = provision_tenant(&harness, "acme.test").await;

    // Act
    let deactivated = harness
        .engine
        .tenants
        .deactivate(outcome.tenant.tenant_id)
        .await
        .expect("Deactivation should succeed");
    assert!(deactivated);

    // Assert - tenant row survives, resolution and materialization fail closed
    let tenant = harness
        .engine
        .tenants
        .get(outcome.tenant.tenant_id)
        .await
        .expect("Lookup should succeed")
        .expect("Tenant row should remain");
    assert!(!tenant.active);

    let resolve = harness
        .engine
        .identity
        .resolve_by_tenant_and_username(
            outcome.tenant.tenant_id,
            &outcome.admin.username,
            &RequestContext::default(),
        )
        .await;
    assert!(matches!(resolve, Err(ServiceError::TenantInactive)));

    let descriptor = harness
        .engine
        .clients
        .materialize(outcome.tenant.tenant_id)
        .await
        .expect("Materialization should not error");
    assert!(descriptor.is_none());

    assert!(!harness
        .engine
        .tenants
        .list_active()
        .await
        .expect("Listing should succeed")
        .iter()
        .any(|t| t.tenant_id == outcome.tenant.tenant_id));
}

#[tokio::test]
async fn audit_reporting_returns_recent_events_for_the_tenant() {
    // Arrange
    let harness = spawn_engine().await;
    let outcome = provision_tenant(&harness, "acme.test").await;

    // Act
    let events = harness
        .engine
        .audit
        .list_for_tenant(outcome.tenant.tenant_id, 10)
        .await
        .expect("Reporting read should succeed");

    // Assert
    assert!(!events.is_empty());
    assert!(events
        .iter()
        .all(|e| e.tenant_id == Some(outcome.tenant.tenant_id)));
}
