//! Authentication and authorization utilities
//!
//! Provides:
//! - JWT verification for tokens issued by the identity provider
//! - Local token minting (in-memory provider, tests)
//! - Axum extractors for authenticated and admin callers
//! - Temporary password generation

use crate::db::models::Role;
use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Authorization metadata the identity provider carries for each identity.
/// Only the service role can write it, so handlers may trust it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (identity / user ID)
    pub sub: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Audience
    pub aud: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Database role requested by the token, `authenticated` for users
    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub app_metadata: AppMetadata,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    audience: String,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, audience: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            audience: audience.to_string(),
            expiration_secs: expiration_secs as i64,
        }
    }

    pub fn expiration_secs(&self) -> i64 {
        self.expiration_secs
    }

    /// Generate a new access token for an identity
    pub fn generate_token(
        &self,
        user_id: Uuid,
        email: &str,
        app_metadata: AppMetadata,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            email: Some(email.to_string()),
            aud: self.audience.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            role: "authenticated".to_string(),
            app_metadata,
        };

        self.encode_claims(&claims)
    }

    fn encode_claims(&self, claims: &JwtClaims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(|e| {
            AppError::Internal {
                message: format!("Failed to generate token: {}", e),
            }
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.audience]);

        decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidToken,
            })
    }
}

/// Authenticated caller, decoded from the bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub tenant_id: Option<Uuid>,
    pub role: Option<Role>,
}

impl AuthUser {
    fn from_claims(claims: JwtClaims) -> Result<Self> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

        Ok(Self {
            user_id,
            email: claims.email,
            tenant_id: claims.app_metadata.tenant_id,
            role: claims.app_metadata.role,
        })
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Some(Role::SuperAdmin)
    }
}

/// Caller holding the `super_admin` role
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

/// Extract the token from an `Authorization: Bearer ...` header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl<S> FromRequestParts<S> for AuthUser
where
    Arc<JwtManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let jwt = Arc::<JwtManager>::from_ref(state);

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Expected a Bearer token".to_string(),
        })?;

        let user = AuthUser::from_claims(jwt.validate_token(token)?)?;

        Ok(user)
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    Arc<JwtManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let user = AuthUser::from_request_parts(parts, state).await?;

        if !user.is_super_admin() {
            tracing::warn!(user_id = %user.user_id, "Non-admin caller rejected");
            return Err(AppError::Forbidden {
                message: "Administrator role required".to_string(),
            });
        }

        Ok(AdminUser(user))
    }
}

const LOWER: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const DIGITS: &[u8] = b"23456789";

/// Generate a random password containing lower, upper and digit characters.
/// Look-alike characters (0/O, 1/l/I) are left out.
pub fn generate_temporary_password(length: usize) -> String {
    let mut rng = rand::thread_rng();
    let alphabet = [LOWER, UPPER, DIGITS].concat();

    let mut chars: Vec<u8> = [LOWER, UPPER, DIGITS]
        .iter()
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();

    while chars.len() < length {
        chars.push(alphabet[rng.gen_range(0..alphabet.len())]);
    }

    chars.shuffle(&mut rng);
    chars.into_iter().map(char::from).collect()
}

/// Canonical form used for uniqueness checks and storage
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> JwtManager {
        JwtManager::new("test_secret", "authenticated", 3600)
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = manager();
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let metadata = AppMetadata {
            tenant_id: Some(tenant_id),
            role: Some(Role::Manager),
        };

        let token = manager.generate_token(user_id, "ana@example.com", metadata.clone()).unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email.as_deref(), Some("ana@example.com"));
        assert_eq!(claims.app_metadata, metadata);

        let user = AuthUser::from_claims(claims).unwrap();
        assert_eq!(user.tenant_id, Some(tenant_id));
        assert!(!user.is_super_admin());
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let issuer = JwtManager::new("test_secret", "service", 3600);
        let token = issuer
            .generate_token(Uuid::new_v4(), "a@b.c", AppMetadata::default())
            .unwrap();

        assert!(matches!(manager().validate_token(&token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = JwtManager::new("other_secret", "authenticated", 3600);
        let token = issuer
            .generate_token(Uuid::new_v4(), "a@b.c", AppMetadata::default())
            .unwrap();

        assert!(matches!(manager().validate_token(&token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_expired_token() {
        let manager = manager();
        let now = Utc::now().timestamp();
        let claims = JwtClaims {
            sub: Uuid::new_v4().to_string(),
            email: None,
            aud: "authenticated".to_string(),
            exp: now - 7200,
            iat: now - 10800,
            role: "authenticated".to_string(),
            app_metadata: AppMetadata::default(),
        };
        let token = manager.encode_claims(&claims).unwrap();

        assert!(matches!(manager.validate_token(&token), Err(AppError::ExpiredToken)));
    }

    #[test]
    fn test_garbage_token() {
        assert!(matches!(manager().validate_token("not.a.jwt"), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let claims = JwtClaims {
            sub: "service-account".to_string(),
            email: None,
            aud: "authenticated".to_string(),
            exp: 0,
            iat: 0,
            role: String::new(),
            app_metadata: AppMetadata::default(),
        };
        assert!(AuthUser::from_claims(claims).is_err());
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("abc.def"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_temporary_password_shape() {
        for _ in 0..20 {
            let password = generate_temporary_password(16);
            assert_eq!(password.len(), 16);
            assert!(password.chars().any(|c| c.is_ascii_lowercase()));
            assert!(password.chars().any(|c| c.is_ascii_uppercase()));
            assert!(password.chars().any(|c| c.is_ascii_digit()));
            assert!(!password.contains(['0', 'O', '1', 'l', 'I']));
        }
        assert_ne!(generate_temporary_password(16), generate_temporary_password(16));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ana.Silva@Example.COM "), "ana.silva@example.com");
    }
}
