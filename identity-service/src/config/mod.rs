use serde::Deserialize;
use std::env;

use crate::services::ServiceError;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub database: DatabaseConfig,
    pub smtp: SmtpConfig,
    pub invitation: InvitationConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub relay: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvitationConfig {
    /// Default validity window for new invitations, in days.
    pub validity_days: i64,
    /// Base URL for the acceptance link in outgoing messages.
    pub accept_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Failed login attempts before the account is locked.
    pub max_failed_logins: i32,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ServiceError> {
        dotenvy::dotenv().ok();

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| ServiceError::Validation(e))?;

        let is_prod = environment == Environment::Prod;

        let config = EngineConfig {
            environment,
            service_name: get_env("SERVICE_NAME", Some("identity-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            smtp: SmtpConfig {
                relay: get_env("SMTP_RELAY", None, is_prod)?,
                port: parse_env("SMTP_PORT", "587", is_prod)?,
                username: get_env("SMTP_USERNAME", None, is_prod)?,
                password: get_env("SMTP_PASSWORD", None, is_prod)?,
                from_email: get_env("SMTP_FROM_EMAIL", None, is_prod)?,
            },
            invitation: InvitationConfig {
                validity_days: parse_env("INVITATION_VALIDITY_DAYS", "7", is_prod)?,
                accept_base_url: get_env(
                    "INVITATION_ACCEPT_BASE_URL",
                    Some("http://localhost:3000"),
                    is_prod,
                )?,
            },
            security: SecurityConfig {
                max_failed_logins: parse_env("MAX_FAILED_LOGINS", "5", is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ServiceError> {
        if self.database.max_connections == 0 {
            return Err(ServiceError::Validation(
                "DATABASE_MAX_CONNECTIONS must be greater than 0".to_string(),
            ));
        }
        if self.invitation.validity_days <= 0 {
            return Err(ServiceError::Validation(
                "INVITATION_VALIDITY_DAYS must be positive".to_string(),
            ));
        }
        if self.security.max_failed_logins <= 0 {
            return Err(ServiceError::Validation(
                "MAX_FAILED_LOGINS must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, ServiceError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(ServiceError::Validation(format!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(ServiceError::Validation(format!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: &str, is_prod: bool) -> Result<T, ServiceError>
where
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| ServiceError::Validation(format!("{key}: {e}")))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
