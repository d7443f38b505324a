//! GoTrue admin API client

use super::{Identity, IdentityChanges, IdentityProvider, NewIdentity, SignInSession};
use crate::auth::AppMetadata;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Ban length GoTrue accepts for "indefinitely"
const BAN_FOREVER: &str = "876000h";
const BAN_NONE: &str = "none";

/// Identity provider backed by a hosted GoTrue instance
pub struct GoTrueIdentityProvider {
    client: reqwest::Client,
    auth_url: String,
    service_key: String,
    anon_key: Option<String>,
}

#[derive(Serialize)]
struct CreateUserRequest<'a> {
    email: &'a str,
    password: &'a str,
    email_confirm: bool,
    app_metadata: &'a AppMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    ban_duration: Option<&'static str>,
}

#[derive(Serialize, Default)]
struct UpdateUserRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    app_metadata: Option<&'a AppMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ban_duration: Option<&'static str>,
}

impl<'a> From<&'a IdentityChanges> for UpdateUserRequest<'a> {
    fn from(changes: &'a IdentityChanges) -> Self {
        Self {
            email: changes.email.as_deref(),
            password: changes.password.as_deref(),
            app_metadata: changes.app_metadata.as_ref(),
            ban_duration: changes
                .banned
                .map(|banned| if banned { BAN_FOREVER } else { BAN_NONE }),
        }
    }
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

impl GoTrueIdentityProvider {
    /// Create a client for `{base_url}/auth/v1`
    pub fn new(
        base_url: String,
        service_key: String,
        anon_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            auth_url: format!("{}/auth/v1", base_url.trim_end_matches('/')),
            service_key,
            anon_key,
        })
    }

    fn admin(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    fn user_url(&self, id: Uuid) -> String {
        format!("{}/admin/users/{}", self.auth_url, id)
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        operation: &str,
        subject: Option<Uuid>,
    ) -> Result<Response> {
        let response = builder.send().await.map_err(|e| AppError::Identity {
            message: format!("{} request failed: {}", operation, e),
            status: None,
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(operation, status = status.as_u16(), body = %body, "Identity provider rejected request");

        Err(map_status(status, operation, subject, body))
    }
}

fn map_status(status: StatusCode, operation: &str, subject: Option<Uuid>, body: String) -> AppError {
    match status {
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => AppError::Duplicate {
            message: "email already registered with the identity provider".to_string(),
        },
        StatusCode::NOT_FOUND => AppError::not_found(
            "identity",
            subject.map(|id| id.to_string()).unwrap_or_default(),
        ),
        _ => AppError::Identity {
            message: format!("{} failed: {}", operation, body),
            status: Some(status.as_u16()),
        },
    }
}

#[async_trait]
impl IdentityProvider for GoTrueIdentityProvider {
    async fn create_identity(&self, new: NewIdentity) -> Result<Identity> {
        let request = CreateUserRequest {
            email: &new.email,
            password: &new.password,
            email_confirm: true,
            app_metadata: &new.app_metadata,
            ban_duration: new.banned.then_some(BAN_FOREVER),
        };

        let builder = self
            .admin(self.client.post(format!("{}/admin/users", self.auth_url)))
            .json(&request);

        let identity: Identity = self.send(builder, "create identity", None).await?.json().await?;
        tracing::info!(identity_id = %identity.id, "Identity created");
        Ok(identity)
    }

    async fn update_identity(&self, id: Uuid, changes: IdentityChanges) -> Result<Identity> {
        let builder = self
            .admin(self.client.put(self.user_url(id)))
            .json(&UpdateUserRequest::from(&changes));

        Ok(self.send(builder, "update identity", Some(id)).await?.json().await?)
    }

    async fn delete_identity(&self, id: Uuid) -> Result<()> {
        let builder = self.admin(self.client.delete(self.user_url(id)));
        self.send(builder, "delete identity", Some(id)).await?;
        tracing::info!(identity_id = %id, "Identity deleted");
        Ok(())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignInSession> {
        let key = self.anon_key.as_deref().unwrap_or(&self.service_key);
        let builder = self
            .client
            .post(format!("{}/token?grant_type=password", self.auth_url))
            .header("apikey", key)
            .json(&PasswordGrant { email, password });

        match self.send(builder, "sign in", None).await {
            Ok(response) => Ok(response.json().await?),
            Err(AppError::Identity {
                status: Some(400 | 401),
                ..
            }) => Err(AppError::Unauthorized {
                message: "invalid email or password".to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    fn provider_name(&self) -> &str {
        "gotrue"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;

    #[test]
    fn test_update_request_serialization() {
        let changes = IdentityChanges {
            email: Some("new@example.com".to_string()),
            banned: Some(true),
            ..Default::default()
        };
        let json = serde_json::to_value(UpdateUserRequest::from(&changes)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "email": "new@example.com", "ban_duration": "876000h" })
        );

        let lift = IdentityChanges {
            banned: Some(false),
            app_metadata: Some(AppMetadata {
                tenant_id: None,
                role: Some(Role::Manager),
            }),
            ..Default::default()
        };
        let json = serde_json::to_value(UpdateUserRequest::from(&lift)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "app_metadata": { "role": "manager" }, "ban_duration": "none" })
        );
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status(StatusCode::UNPROCESSABLE_ENTITY, "create identity", None, String::new()),
            AppError::Duplicate { .. }
        ));
        assert!(map_status(StatusCode::NOT_FOUND, "delete identity", Some(Uuid::nil()), String::new()).is_not_found());
        assert!(matches!(
            map_status(StatusCode::INTERNAL_SERVER_ERROR, "update identity", None, "boom".into()),
            AppError::Identity { status: Some(500), .. }
        ));
    }

    #[test]
    fn test_auth_url_trims_trailing_slash() {
        let provider =
            GoTrueIdentityProvider::new("http://localhost:54321/".into(), "key".into(), None, 5).unwrap();
        assert_eq!(provider.auth_url, "http://localhost:54321/auth/v1");
        assert_eq!(
            provider.user_url(Uuid::nil()),
            "http://localhost:54321/auth/v1/admin/users/00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_identity_parses_gotrue_user() {
        let body = serde_json::json!({
            "id": "6f1c2a4e-1b2c-4d3e-8f90-112233445566",
            "aud": "authenticated",
            "email": "ana@acme.test",
            "app_metadata": { "provider": "email", "providers": ["email"], "role": "employee" },
            "user_metadata": {}
        });
        let identity: Identity = serde_json::from_value(body).unwrap();
        assert_eq!(identity.email.as_deref(), Some("ana@acme.test"));
        assert_eq!(identity.app_metadata.role, Some(Role::Employee));
    }
}
