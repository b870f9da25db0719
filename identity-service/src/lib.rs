//! Multi-tenant identity resolution and authorization derivation engine.
//!
//! Resolves "who is making this request, under which organization, with which
//! permissions" and derives per-tenant OAuth2 client configuration. The
//! transport layer, the OAuth2 protocol state machine, and credential
//! verification live in collaborating services; this crate feeds them
//! resolved identities and derived client records.

pub mod config;
pub mod db;
pub mod models;
pub mod observability;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::services::{
    AuditRecorder, ClientMaterializer, IdentityResolver, InvitationNotifier, InvitationService,
    TenantService, VerificationTokenService,
};
use crate::store::StoreHandles;

/// The engine's service bundle, built once per process and shared with the
/// transport layer.
#[derive(Clone)]
pub struct IdentityEngine {
    pub tenants: TenantService,
    pub identity: IdentityResolver,
    pub clients: ClientMaterializer,
    pub invitations: InvitationService,
    pub verification_tokens: VerificationTokenService,
    pub audit: AuditRecorder,
}

impl IdentityEngine {
    pub fn new(
        config: &EngineConfig,
        stores: StoreHandles,
        notifier: Arc<dyn InvitationNotifier>,
    ) -> Self {
        let audit = AuditRecorder::new(stores.audit.clone());

        Self {
            tenants: TenantService::new(
                stores.tenants.clone(),
                stores.users.clone(),
                stores.roles.clone(),
                audit.clone(),
            ),
            identity: IdentityResolver::new(
                stores.tenants.clone(),
                stores.users.clone(),
                stores.roles.clone(),
                audit.clone(),
                config.security.max_failed_logins,
            ),
            clients: ClientMaterializer::new(stores.tenants.clone()),
            invitations: InvitationService::new(
                stores.tenants,
                stores.users.clone(),
                stores.roles,
                audit.clone(),
                notifier,
                config.invitation.validity_days,
            ),
            verification_tokens: VerificationTokenService::new(stores.users),
            audit,
        }
    }
}
