//! Outbound invitation notification.
//!
//! Fire-and-forget boundary: delivery failure is logged and never rolls back
//! the invitation that triggered it.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use std::time::Duration;
use uuid::Uuid;

use crate::config::SmtpConfig;
use crate::services::ServiceError;

/// Everything the delivery channel needs to compose an invitation message.
///
/// `email` is the originally requested address: deconfliction only rewrites
/// the stored copy, the message still goes to the real mailbox.
#[derive(Debug, Clone)]
pub struct InvitationNotice {
    pub email: String,
    pub username: String,
    pub tenant_name: String,
    pub invited_by: Uuid,
    pub token: String,
    pub expires_days: i64,
    pub custom_message: Option<String>,
}

#[async_trait]
pub trait InvitationNotifier: Send + Sync {
    async fn notify(&self, notice: &InvitationNotice) -> Result<(), ServiceError>;
}

/// SMTP-backed notifier.
#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: SmtpTransport,
    from_email: String,
    accept_base_url: String,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig, accept_base_url: String) -> Result<Self, ServiceError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.relay)
            .map_err(|e| ServiceError::Infrastructure(anyhow::anyhow!(e.to_string())))?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(relay = %config.relay, "Invitation notifier initialized with SMTP transport");

        Ok(Self {
            mailer,
            from_email: config.from_email.clone(),
            accept_base_url,
        })
    }
}

#[async_trait]
impl InvitationNotifier for SmtpNotifier {
    async fn notify(&self, notice: &InvitationNotice) -> Result<(), ServiceError> {
        let accept_link = format!("{}/invitations/accept?token={}", self.accept_base_url, notice.token);

        let extra = notice
            .custom_message
            .as_deref()
            .map(|m| format!("<p>{}</p>", m))
            .unwrap_or_default();

        let html_body = format!(
            r###"<html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>You have been invited to {tenant}</h2>
                    {extra}
                    <p>An account was created for you as <b>{username}</b>. Click the link below to choose a password and activate it:</p>
                    <p>
                        <a href="{link}" style="background-color: #4CAF50; color: white; padding: 14px 20px; text-decoration: none; border-radius: 4px;">
                            Accept Invitation
                        </a>
                    </p>
                    <p style="color: #666; font-size: 12px;">
                        This invitation expires in {days} days. If you didn't expect this, please ignore this email.
                    </p>
                </body>
            </html>"###,
            tenant = notice.tenant_name,
            extra = extra,
            username = notice.username,
            link = accept_link,
            days = notice.expires_days,
        );

        let plain_body = format!(
            "You have been invited to {}\n\n\
            An account was created for you as {}. Visit the following link to choose a password and activate it:\n\n\
            {}\n\n\
            This invitation expires in {} days. If you didn't expect this, please ignore this email.",
            notice.tenant_name, notice.username, accept_link, notice.expires_days,
        );

        let email = Message::builder()
            .from(
                self.from_email
                    .parse()
                    .map_err(|e: lettre::address::AddressError| {
                        ServiceError::Infrastructure(e.into())
                    })?,
            )
            .to(notice
                .email
                .parse()
                .map_err(|e: lettre::address::AddressError| {
                    ServiceError::Infrastructure(e.into())
                })?)
            .subject(format!("Invitation to join {}", notice.tenant_name))
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )
            .map_err(|e| ServiceError::Infrastructure(e.into()))?;

        // Send on the blocking pool to keep the async runtime unblocked
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| ServiceError::Infrastructure(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %notice.email, "Invitation email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %notice.email, "Failed to send invitation email");
                Err(ServiceError::Infrastructure(anyhow::anyhow!(e)))
            }
        }
    }
}

/// Notifier that records notices instead of delivering them.
#[derive(Default)]
pub struct MockNotifier {
    notices: tokio::sync::Mutex<Vec<InvitationNotice>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn notices(&self) -> Vec<InvitationNotice> {
        self.notices.lock().await.clone()
    }
}

#[async_trait]
impl InvitationNotifier for MockNotifier {
    async fn notify(&self, notice: &InvitationNotice) -> Result<(), ServiceError> {
        self.notices.lock().await.push(notice.clone());
        Ok(())
    }
}
