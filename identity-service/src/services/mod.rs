//! Services layer for the identity engine.
//!
//! Business logic for identity resolution, authority derivation, client
//! materialization, invitations, and tenant administration.

pub mod audit;
pub mod authority;
pub mod error;
pub mod identity;
pub mod invitation;
pub mod notifier;
pub mod oauth_client;
pub mod tenant;
pub mod verification;

pub use audit::AuditRecorder;
pub use authority::aggregate_authorities;
pub use error::{AccountUnavailableReason, ServiceError};
pub use identity::{IdentityResolver, RequestContext, ResolvedIdentity};
pub use invitation::{InvitationOutcome, InvitationService, InviteUserRequest};
pub use notifier::{InvitationNotice, InvitationNotifier, MockNotifier, SmtpNotifier};
pub use oauth_client::{ClientDescriptor, ClientMaterializer};
pub use tenant::{ProvisionOutcome, TenantService};
pub use verification::VerificationTokenService;
