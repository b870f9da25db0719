//! Verification token model - single-use tokens for the simplified flows.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    EmailVerification,
    PasswordReset,
    AccountActivation,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::EmailVerification => "email_verification",
            TokenType::PasswordReset => "password_reset",
            TokenType::AccountActivation => "account_activation",
        }
    }
}

/// Single-use verification token. Consumption sets `used_utc` and is terminal.
#[derive(Debug, Clone, FromRow)]
pub struct VerificationToken {
    pub token_id: Uuid,
    /// Digest of the opaque token handed to the user.
    pub token_hash: String,
    pub user_id: Uuid,
    /// Target mailbox the token was issued for.
    pub email: String,
    pub token_type_code: String,
    pub expires_utc: DateTime<Utc>,
    pub used_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl VerificationToken {
    pub fn new(
        user_id: Uuid,
        email: String,
        token_hash: String,
        token_type: TokenType,
        validity: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            token_id: Uuid::new_v4(),
            token_hash,
            user_id,
            email,
            token_type_code: token_type.as_str().to_string(),
            expires_utc: now + validity,
            used_utc: None,
            created_utc: now,
        }
    }

    /// Valid iff not expired and never consumed.
    pub fn is_valid(&self) -> bool {
        self.used_utc.is_none() && Utc::now() < self.expires_utc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(validity: Duration) -> VerificationToken {
        VerificationToken::new(
            Uuid::new_v4(),
            "a@acme.test".to_string(),
            "digest".to_string(),
            TokenType::EmailVerification,
            validity,
        )
    }

    #[test]
    fn fresh_token_is_valid() {
        assert!(token(Duration::hours(24)).is_valid());
    }

    #[test]
    fn expired_token_is_invalid() {
        assert!(!token(Duration::seconds(-1)).is_valid());
    }

    #[test]
    fn consumed_token_is_invalid() {
        let mut t = token(Duration::hours(24));
        t.used_utc = Some(Utc::now());
        assert!(!t.is_valid());
    }
}
