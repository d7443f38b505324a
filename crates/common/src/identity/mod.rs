//! Identity provider abstraction
//!
//! Login identities (email, password, ban state and authorization metadata)
//! live in a hosted auth service. Two implementations:
//! - GoTrue admin API over HTTP
//! - In-memory store for local development and tests

mod gotrue;
mod memory;

pub use gotrue::GoTrueIdentityProvider;
pub use memory::InMemoryIdentityProvider;

use crate::auth::{AppMetadata, JwtManager};
use crate::config::IdentityConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// An identity as the provider reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub app_metadata: AppMetadata,
}

/// Fields for a new, pre-confirmed identity
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub password: String,
    pub app_metadata: AppMetadata,
    /// Create the identity already banned
    pub banned: bool,
}

/// Partial identity update; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityChanges {
    pub email: Option<String>,
    pub password: Option<String>,
    pub app_metadata: Option<AppMetadata>,
    /// `Some(true)` bans the identity indefinitely, `Some(false)` lifts a ban
    pub banned: Option<bool>,
}

impl IdentityChanges {
    pub fn is_empty(&self) -> bool {
        self == &IdentityChanges::default()
    }
}

/// Tokens issued by a successful password sign-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub user: Identity,
}

/// Trait for identity management
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create a confirmed identity
    async fn create_identity(&self, new: NewIdentity) -> Result<Identity>;

    /// Update email, password, metadata or ban state
    async fn update_identity(&self, id: Uuid, changes: IdentityChanges) -> Result<Identity>;

    /// Delete an identity; `NotFound` when it does not exist
    async fn delete_identity(&self, id: Uuid) -> Result<()>;

    /// Exchange email and password for tokens
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignInSession>;

    /// Provider name for logs and health output
    fn provider_name(&self) -> &str;
}

/// Create an identity provider based on configuration
pub fn create_identity_provider(
    config: &IdentityConfig,
    jwt: Arc<JwtManager>,
) -> Result<Arc<dyn IdentityProvider>> {
    match config.provider.as_str() {
        "gotrue" => {
            let base_url = config.base_url.clone().ok_or_else(|| AppError::Configuration {
                message: "identity.base_url is required".to_string(),
            })?;
            let service_key = config.service_key.clone().ok_or_else(|| AppError::Configuration {
                message: "identity.service_key is required".to_string(),
            })?;

            Ok(Arc::new(GoTrueIdentityProvider::new(
                base_url,
                service_key,
                config.anon_key.clone(),
                config.timeout_secs,
            )?))
        }
        "memory" => {
            tracing::warn!("Using in-memory identity provider; identities are lost on restart");
            Ok(Arc::new(InMemoryIdentityProvider::new(jwt)))
        }
        other => Err(AppError::Configuration {
            message: format!("unknown identity provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt() -> Arc<JwtManager> {
        Arc::new(JwtManager::new("test-secret", "authenticated", 3600))
    }

    #[test]
    fn test_factory_selects_provider() {
        let mut config = IdentityConfig::default();

        config.provider = "memory".to_string();
        assert_eq!(create_identity_provider(&config, jwt()).unwrap().provider_name(), "memory");

        config.provider = "gotrue".to_string();
        assert!(create_identity_provider(&config, jwt()).is_err());

        config.base_url = Some("http://localhost:54321".to_string());
        config.service_key = Some("service".to_string());
        assert_eq!(create_identity_provider(&config, jwt()).unwrap().provider_name(), "gotrue");

        config.provider = "ldap".to_string();
        assert!(create_identity_provider(&config, jwt()).is_err());
    }

    #[test]
    fn test_identity_changes_empty() {
        assert!(IdentityChanges::default().is_empty());
        assert!(!IdentityChanges {
            banned: Some(false),
            ..Default::default()
        }
        .is_empty());
    }
}
