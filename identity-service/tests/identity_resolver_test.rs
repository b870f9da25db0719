//! Identity resolver integration tests: strict and loose resolution,
//! authenticatability ordering, failure auditing, lockout bookkeeping.

mod common;

use common::{provision_tenant, spawn_engine};
use identity_service::models::User;
use identity_service::services::{
    AccountUnavailableReason, IdentityResolver, RequestContext, ServiceError,
};
use identity_service::store::UserStore;
use uuid::Uuid;

fn ctx() -> RequestContext {
    RequestContext::new(Some("198.51.100.7".to_string()), Some("tests/1.0".to_string()))
}

#[tokio::test]
async fn strict_resolution_succeeds_for_provisioned_admin() {
    // Arrange
    let harness = spawn_engine().await;
    let outcome = provision_tenant(&harness, "acme.test").await;

    // Act
    let identity = harness
        .engine
        .identity
        .resolve_by_tenant_and_username(outcome.tenant.tenant_id, "admin", &ctx())
        .await
        .expect("Resolution should succeed");

    // Assert
    assert_eq!(identity.user.user_id, outcome.admin.user_id);
    assert_eq!(identity.tenant.tenant_id, outcome.tenant.tenant_id);
    assert!(identity.authorities.contains("role:ADMIN"));
    assert!(identity.authorities.contains("role:tenant-admin"));
    assert!(identity.authorities.contains("tenant:admin"));
    assert!(identity.authorities.contains("documents:write"));
}

#[tokio::test]
async fn strict_resolution_fails_closed_for_inactive_tenant() {
    // Arrange
    let harness = spawn_engine().await;
    let outcome = provision_tenant(&harness, "acme.test").await;
    harness
        .engine
        .tenants
        .deactivate(outcome.tenant.tenant_id)
        .await
        .expect("Deactivation should succeed");

    // Act
    let result = harness
        .engine
        .identity
        .resolve_by_tenant_and_username(outcome.tenant.tenant_id, "admin", &ctx())
        .await;

    // Assert - the user underneath is authenticatable, the tenant gates it
    assert!(matches!(result, Err(ServiceError::TenantInactive)));
}

#[tokio::test]
async fn unknown_user_fails_with_exactly_one_login_failed_event() {
    // Arrange
    let harness = spawn_engine().await;
    let outcome = provision_tenant(&harness, "acme.test").await;

    // Act
    let result = harness
        .engine
        .identity
        .resolve_by_tenant_and_username(outcome.tenant.tenant_id, "ghost", &ctx())
        .await;

    // Assert
    assert!(matches!(result, Err(ServiceError::UserNotFound)));
    let failures: Vec<_> = harness
        .store
        .audit_events()
        .await
        .into_iter()
        .filter(|e| e.event_type_code == "LOGIN_FAILED")
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].ip_address.as_deref(), Some("198.51.100.7"));
    assert_eq!(failures[0].user_agent.as_deref(), Some("tests/1.0"));
}

#[tokio::test]
async fn authenticatability_reasons_follow_the_fixed_check_order() {
    let base = {
        let mut user = User::new(
            Uuid::new_v4(),
            "carol".to_string(),
            "carol@acme.test".to_string(),
            "$argon2id$stub".to_string(),
        );
        user.email_verified = true;
        user
    };
    assert!(IdentityResolver::evaluate_authenticatability(&base).is_ok());

    // Flip every condition at once; checks unwind one at a time in order.
    let mut user = base.clone();
    user.active = false;
    user.email_verified = false;
    user.locked = true;
    user.password_expires_utc = Some(chrono::Utc::now() - chrono::Duration::days(1));
    user.password_hash = None;

    assert_eq!(
        IdentityResolver::evaluate_authenticatability(&user),
        Err(AccountUnavailableReason::Deactivated)
    );
    user.active = true;
    assert_eq!(
        IdentityResolver::evaluate_authenticatability(&user),
        Err(AccountUnavailableReason::Unverified)
    );
    user.email_verified = true;
    assert_eq!(
        IdentityResolver::evaluate_authenticatability(&user),
        Err(AccountUnavailableReason::Locked)
    );
    user.locked = false;
    assert_eq!(
        IdentityResolver::evaluate_authenticatability(&user),
        Err(AccountUnavailableReason::CredentialExpired)
    );
    user.password_expires_utc = None;
    assert_eq!(
        IdentityResolver::evaluate_authenticatability(&user),
        Err(AccountUnavailableReason::NoCredential)
    );
    user.password_hash = Some("$argon2id$stub".to_string());
    assert!(IdentityResolver::evaluate_authenticatability(&user).is_ok());
}

#[tokio::test]
async fn blank_credential_is_treated_as_missing() {
    let mut user = User::new(
        Uuid::new_v4(),
        "dave".to_string(),
        "dave@acme.test".to_string(),
        "   ".to_string(),
    );
    user.email_verified = true;
    assert_eq!(
        IdentityResolver::evaluate_authenticatability(&user),
        Err(AccountUnavailableReason::NoCredential)
    );
}

#[tokio::test]
async fn loose_resolution_by_email_derives_the_tenant() {
    // Arrange
    let harness = spawn_engine().await;
    let outcome = provision_tenant(&harness, "acme.test").await;

    // Act
    let identity = harness
        .engine
        .identity
        .resolve_globally("admin@acme.test", &ctx())
        .await
        .expect("Loose resolution should succeed");

    // Assert
    assert_eq!(identity.tenant.tenant_id, outcome.tenant.tenant_id);
    assert_eq!(identity.user.username, "admin");
}

#[tokio::test]
async fn loose_resolution_without_at_sign_looks_up_by_username() {
    // Arrange
    let harness = spawn_engine().await;
    provision_tenant(&harness, "acme.test").await;

    // Act
    let identity = harness
        .engine
        .identity
        .resolve_globally("admin", &ctx())
        .await
        .expect("Loose resolution should succeed");

    // Assert
    assert_eq!(identity.user.email, "admin@acme.test");
}

#[tokio::test]
async fn loose_resolution_fails_closed_on_duplicate_email() {
    // Arrange - two tenants holding the same email, as migrated data might
    let harness = spawn_engine().await;
    let t1 = provision_tenant(&harness, "acme.test").await;
    let t2 = provision_tenant(&harness, "globex.test").await;

    for (tenant, username) in [(&t1, "erin1"), (&t2, "erin2")] {
        let mut user = User::new(
            tenant.tenant.tenant_id,
            username.to_string(),
            "erin@shared.test".to_string(),
            "$argon2id$stub".to_string(),
        );
        user.email_verified = true;
        harness.store.insert(&user).await.expect("Insert should succeed");
    }

    // Act
    let result = harness
        .engine
        .identity
        .resolve_globally("erin@shared.test", &ctx())
        .await;

    // Assert
    assert!(matches!(result, Err(ServiceError::AmbiguousIdentity(_))));
    let failures: Vec<_> = harness
        .store
        .audit_events()
        .await
        .into_iter()
        .filter(|e| e.event_type_code == "LOGIN_FAILED")
        .collect();
    assert_eq!(failures.len(), 1);
}

#[tokio::test]
async fn resolve_by_id_is_option_shaped() {
    // Arrange
    let harness = spawn_engine().await;
    let outcome = provision_tenant(&harness, "acme.test").await;

    // Act / Assert - happy path
    let found = harness
        .engine
        .identity
        .resolve_by_id(outcome.admin.user_id, outcome.tenant.tenant_id)
        .await
        .expect("Lookup should not error");
    assert!(found.is_some());

    // Wrong tenant context: not found, not an error
    let wrong_tenant = harness
        .engine
        .identity
        .resolve_by_id(outcome.admin.user_id, Uuid::new_v4())
        .await
        .expect("Lookup should not error");
    assert!(wrong_tenant.is_none());

    // Ineligible account: not found, not an error
    harness
        .store
        .set_locked(outcome.admin.user_id, true)
        .await
        .expect("Lock should succeed");
    let locked = harness
        .engine
        .identity
        .resolve_by_id(outcome.admin.user_id, outcome.tenant.tenant_id)
        .await
        .expect("Lookup should not error");
    assert!(locked.is_none());
}

#[tokio::test]
async fn service_credentials_resolve_to_the_first_tenant_admin() {
    // Arrange
    let harness = spawn_engine().await;
    let outcome = provision_tenant(&harness, "acme.test").await;

    // Act
    let identity = harness
        .engine
        .identity
        .resolve_for_service_credentials(&outcome.tenant.client_id)
        .await
        .expect("Service credential resolution should succeed");

    // Assert
    assert_eq!(identity.user.user_id, outcome.admin.user_id);
    assert!(identity.authorities.contains("tenant:admin"));

    // Unknown client id
    let missing = harness
        .engine
        .identity
        .resolve_for_service_credentials("tnt-0000000000000000dead")
        .await;
    assert!(matches!(missing, Err(ServiceError::TenantNotFound)));
}

#[tokio::test]
async fn repeated_failures_lock_the_account_at_the_threshold() {
    // Arrange
    let harness = spawn_engine().await;
    let outcome = provision_tenant(&harness, "acme.test").await;

    // Act - one failure short of the threshold
    for _ in 0..4 {
        let locked = harness
            .engine
            .identity
            .record_login_failure(&outcome.admin, &ctx())
            .await
            .expect("Bookkeeping should succeed");
        assert!(!locked);
    }
    let locked = harness
        .engine
        .identity
        .record_login_failure(&outcome.admin, &ctx())
        .await
        .expect("Bookkeeping should succeed");

    // Assert
    assert!(locked);
    let result = harness
        .engine
        .identity
        .resolve_by_tenant_and_username(outcome.tenant.tenant_id, "admin", &ctx())
        .await;
    assert!(matches!(
        result,
        Err(ServiceError::AccountUnavailable(
            AccountUnavailableReason::Locked
        ))
    ));

    let events = harness.store.audit_events().await;
    assert_eq!(
        events
            .iter()
            .filter(|e| e.event_type_code == "ACCOUNT_LOCKED")
            .count(),
        1
    );
    assert_eq!(
        events
            .iter()
            .filter(|e| e.event_type_code == "LOGIN_FAILED")
            .count(),
        6 // five credential failures plus the post-lock resolution attempt
    );
}

#[tokio::test]
async fn login_success_resets_the_failure_counter() {
    // Arrange
    let harness = spawn_engine().await;
    let outcome = provision_tenant(&harness, "acme.test").await;
    harness
        .engine
        .identity
        .record_login_failure(&outcome.admin, &ctx())
        .await
        .expect("Bookkeeping should succeed");

    // Act
    harness
        .engine
        .identity
        .record_login_success(&outcome.admin, &ctx())
        .await
        .expect("Bookkeeping should succeed");

    // Assert
    let user = harness
        .store
        .find_by_id(outcome.admin.user_id)
        .await
        .expect("Lookup should succeed")
        .expect("User should exist");
    assert_eq!(user.failed_login_count, 0);
    assert!(user.last_login_utc.is_some());
    assert!(user.last_failed_login_utc.is_none());
}
