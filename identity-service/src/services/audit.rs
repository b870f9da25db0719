//! Audit trail recorder.
//!
//! Every security-relevant event goes through this capability. Audit writes
//! are best-effort from the caller's point of view: a failed write is logged
//! and never fails or blocks the primary operation, but the attempt itself is
//! mandatory.

use std::sync::Arc;
use uuid::Uuid;

use crate::models::{AuditEvent, AuditEventResponse};
use crate::services::ServiceError;
use crate::store::AuditStore;

#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Record an event, awaiting the write. Failures are swallowed after
    /// logging so the primary operation's outcome is unaffected.
    pub async fn record(&self, event: AuditEvent) {
        if let Err(e) = self.store.append(&event).await {
            tracing::error!(
                error = %e,
                event_type = %event.event_type_code,
                "Failed to write audit event"
            );
        }
    }

    /// Record an event without awaiting the write.
    pub fn record_async(&self, event: AuditEvent) {
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.append(&event).await {
                tracing::error!(
                    error = %e,
                    event_type = %event.event_type_code,
                    "Failed to write audit event"
                );
            }
        });
    }

    /// Recent events for a tenant, newest first. Reporting read; the trail is
    /// never read back by the write paths.
    pub async fn list_for_tenant(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AuditEventResponse>, ServiceError> {
        let events = self.store.list_for_tenant(tenant_id, limit).await?;
        Ok(events.into_iter().map(AuditEventResponse::from).collect())
    }
}
