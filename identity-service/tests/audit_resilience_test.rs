//! Audit writes are mandatory attempts but best-effort outcomes: a broken
//! audit sink must never fail resolution or invitations.

mod common;

use async_trait::async_trait;
use common::{provision_request, seed_roles, test_config};
use identity_service::models::AuditEvent;
use identity_service::services::{InviteUserRequest, MockNotifier, RequestContext, ServiceError};
use identity_service::store::{AuditStore, MemoryStore, StoreError, StoreHandles, StoreResult};
use identity_service::IdentityEngine;
use std::sync::Arc;
use uuid::Uuid;

struct FailingAuditStore;

#[async_trait]
impl AuditStore for FailingAuditStore {
    async fn append(&self, _event: &AuditEvent) -> StoreResult<()> {
        Err(StoreError::Backend(anyhow::anyhow!("audit sink is down")))
    }

    async fn list_for_tenant(
        &self,
        _tenant_id: Uuid,
        _limit: i64,
    ) -> StoreResult<Vec<AuditEvent>> {
        Err(StoreError::Backend(anyhow::anyhow!("audit sink is down")))
    }
}

#[tokio::test]
async fn operations_succeed_when_the_audit_sink_is_down() {
    // Arrange - memory store for entities, broken sink for audit
    let store = Arc::new(MemoryStore::new());
    seed_roles(store.as_ref()).await;
    let stores = StoreHandles {
        tenants: store.clone(),
        users: store.clone(),
        roles: store.clone(),
        audit: Arc::new(FailingAuditStore),
    };
    let engine = IdentityEngine::new(&test_config(), stores, Arc::new(MockNotifier::new()));

    // Act - provisioning, invitation, acceptance, and resolution all write
    // audit events; none of them may surface the sink failure
    let outcome = engine
        .tenants
        .provision(provision_request("acme.test"))
        .await
        .expect("Provisioning should tolerate a broken audit sink");

    let invitation = engine
        .invitations
        .invite(
            outcome.tenant.tenant_id,
            outcome.admin.user_id,
            InviteUserRequest {
                email: "a@acme.test".to_string(),
                username: "alice".to_string(),
                first_name: None,
                last_name: None,
                tenant_admin: false,
                role_ids: Vec::new(),
                validity_days: None,
                custom_message: None,
            },
        )
        .await
        .expect("Invitation should tolerate a broken audit sink");

    engine
        .invitations
        .accept_invitation(&invitation.token, "Secret123", "Secret123", None)
        .await
        .expect("Acceptance should tolerate a broken audit sink");

    engine
        .identity
        .resolve_by_tenant_and_username(
            outcome.tenant.tenant_id,
            "alice",
            &RequestContext::default(),
        )
        .await
        .expect("Resolution should tolerate a broken audit sink");

    // Failure paths attempt the write too, and still return their typed error
    let result = engine
        .identity
        .resolve_by_tenant_and_username(
            outcome.tenant.tenant_id,
            "ghost",
            &RequestContext::default(),
        )
        .await;
    assert!(matches!(result, Err(ServiceError::UserNotFound)));
}
