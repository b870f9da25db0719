//! Single-use verification tokens for the simplified flows.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{TokenType, VerificationToken};
use crate::services::ServiceError;
use crate::store::UserStore;
use crate::utils::{generate_token, hash_token};

#[derive(Clone)]
pub struct VerificationTokenService {
    users: Arc<dyn UserStore>,
}

impl VerificationTokenService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Issue a token for a user and target mailbox; returns the opaque
    /// plaintext for delivery, only the digest is stored.
    pub async fn issue(
        &self,
        user_id: Uuid,
        email: &str,
        token_type: TokenType,
        validity: Duration,
    ) -> Result<String, ServiceError> {
        let token = generate_token();
        let record = VerificationToken::new(
            user_id,
            email.to_string(),
            hash_token(&token),
            token_type,
            validity,
        );
        self.users.insert_verification_token(&record).await?;
        Ok(token)
    }

    /// Consume a token of the expected type. Single-use: consumption is
    /// terminal, a second attempt fails `InvalidOrExpiredToken`.
    pub async fn consume(
        &self,
        token: &str,
        expected_type: TokenType,
    ) -> Result<VerificationToken, ServiceError> {
        let record = self
            .users
            .find_verification_token_by_hash(&hash_token(token))
            .await?
            .filter(|t| t.token_type_code == expected_type.as_str() && t.is_valid())
            .ok_or(ServiceError::InvalidOrExpiredToken)?;

        let consumed = self
            .users
            .mark_verification_token_used(record.token_id, Utc::now())
            .await?;
        if !consumed {
            // Lost a race against a concurrent consumer
            return Err(ServiceError::InvalidOrExpiredToken);
        }
        Ok(record)
    }
}
