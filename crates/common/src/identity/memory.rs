//! In-memory identity provider for local development and tests

use super::{Identity, IdentityChanges, IdentityProvider, NewIdentity, SignInSession};
use crate::auth::{normalize_email, JwtManager};
use crate::errors::{AppError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

struct StoredIdentity {
    identity: Identity,
    password_hash: String,
    banned: bool,
}

/// Identity store held in process memory; tokens are minted locally
pub struct InMemoryIdentityProvider {
    jwt: Arc<JwtManager>,
    identities: Mutex<HashMap<Uuid, StoredIdentity>>,
}

impl InMemoryIdentityProvider {
    pub fn new(jwt: Arc<JwtManager>) -> Self {
        Self {
            jwt,
            identities: Mutex::new(HashMap::new()),
        }
    }

    /// Look up an identity by ID
    pub async fn get(&self, id: Uuid) -> Option<Identity> {
        self.identities
            .lock()
            .await
            .get(&id)
            .map(|stored| stored.identity.clone())
    }

    /// Whether the identity is currently banned
    pub async fn is_banned(&self, id: Uuid) -> bool {
        self.identities
            .lock()
            .await
            .get(&id)
            .map_or(false, |stored| stored.banned)
    }

    pub async fn count(&self) -> usize {
        self.identities.lock().await.len()
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal {
            message: format!("Failed to hash password: {}", e),
        })
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn email_taken(identities: &HashMap<Uuid, StoredIdentity>, email: &str, except: Option<Uuid>) -> bool {
    identities.values().any(|stored| {
        Some(stored.identity.id) != except && stored.identity.email.as_deref() == Some(email)
    })
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn create_identity(&self, new: NewIdentity) -> Result<Identity> {
        let email = normalize_email(&new.email);
        let password_hash = hash_password(&new.password)?;

        let mut identities = self.identities.lock().await;
        if email_taken(&identities, &email, None) {
            return Err(AppError::Duplicate {
                message: "email already registered with the identity provider".to_string(),
            });
        }

        let identity = Identity {
            id: Uuid::new_v4(),
            email: Some(email),
            app_metadata: new.app_metadata,
        };
        identities.insert(
            identity.id,
            StoredIdentity {
                identity: identity.clone(),
                password_hash,
                banned: new.banned,
            },
        );

        Ok(identity)
    }

    async fn update_identity(&self, id: Uuid, changes: IdentityChanges) -> Result<Identity> {
        let password_hash = changes.password.as_deref().map(hash_password).transpose()?;
        let email = changes.email.as_deref().map(normalize_email);

        let mut identities = self.identities.lock().await;
        if let Some(email) = &email {
            if email_taken(&identities, email, Some(id)) {
                return Err(AppError::Duplicate {
                    message: "email already registered with the identity provider".to_string(),
                });
            }
        }

        let stored = identities
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("identity", id))?;

        if let Some(email) = email {
            stored.identity.email = Some(email);
        }
        if let Some(hash) = password_hash {
            stored.password_hash = hash;
        }
        if let Some(app_metadata) = changes.app_metadata {
            stored.identity.app_metadata = app_metadata;
        }
        if let Some(banned) = changes.banned {
            stored.banned = banned;
        }

        Ok(stored.identity.clone())
    }

    async fn delete_identity(&self, id: Uuid) -> Result<()> {
        self.identities
            .lock()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("identity", id))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignInSession> {
        let email = normalize_email(email);
        let invalid = || AppError::Unauthorized {
            message: "invalid email or password".to_string(),
        };

        let identities = self.identities.lock().await;
        let stored = identities
            .values()
            .find(|stored| stored.identity.email.as_deref() == Some(email.as_str()))
            .ok_or_else(invalid)?;

        if !verify_password(password, &stored.password_hash) {
            return Err(invalid());
        }
        if stored.banned {
            return Err(AppError::Unauthorized {
                message: "user is banned".to_string(),
            });
        }

        let identity = stored.identity.clone();
        let access_token =
            self.jwt
                .generate_token(identity.id, &email, identity.app_metadata.clone())?;

        Ok(SignInSession {
            access_token,
            refresh_token: None,
            expires_in: self.jwt.expiration_secs(),
            user: identity,
        })
    }

    fn provider_name(&self) -> &str {
        "memory"
    }
}
