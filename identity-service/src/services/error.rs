use crate::store::StoreError;
use thiserror::Error;

/// Reason an otherwise-found account cannot authenticate.
///
/// Checks run in a fixed order and the first failure wins; the order is
/// stable across releases because it feeds user-facing messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountUnavailableReason {
    Deactivated,
    Unverified,
    Locked,
    CredentialExpired,
    NoCredential,
    /// Stand-in used when an infrastructure failure was downgraded; never
    /// names one of the real checks.
    Unavailable,
}

impl AccountUnavailableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountUnavailableReason::Deactivated => "account is deactivated",
            AccountUnavailableReason::Unverified => "email is not verified",
            AccountUnavailableReason::Locked => "account is locked",
            AccountUnavailableReason::CredentialExpired => "password credential has expired",
            AccountUnavailableReason::NoCredential => "no credential set",
            AccountUnavailableReason::Unavailable => "account temporarily unavailable",
        }
    }
}

impl std::fmt::Display for AccountUnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Tenant not found")]
    TenantNotFound,

    #[error("Tenant is inactive")]
    TenantInactive,

    #[error("User not found")]
    UserNotFound,

    #[error("Role not found")]
    RoleNotFound,

    #[error("Account unavailable: {0}")]
    AccountUnavailable(AccountUnavailableReason),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Password confirmation does not match")]
    PasswordMismatch,

    #[error("Ambiguous identity: {0}")]
    AmbiguousIdentity(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error")]
    Infrastructure(#[source] anyhow::Error),
}

impl ServiceError {
    /// Uniform, non-enumerating message for authentication failures. The
    /// same text regardless of whether the identifier existed.
    pub fn login_failure_message() -> &'static str {
        "Authentication failed"
    }

    /// Log an infrastructure failure in full and downgrade it to the generic
    /// unavailable shape so internals never leak to the caller.
    pub fn downgrade_infrastructure(err: anyhow::Error, context: &str) -> Self {
        tracing::error!(error = %err, context = %context, "Infrastructure failure during resolution");
        ServiceError::AccountUnavailable(AccountUnavailableReason::Unavailable)
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(constraint) => ServiceError::Conflict(constraint),
            StoreError::Backend(e) => ServiceError::Infrastructure(e),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(err.to_string())
    }
}
