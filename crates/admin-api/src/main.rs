//! Trackera Admin API
//!
//! Internal, super-admin only service for:
//! - Tenant onboarding (tenant row + schema)
//! - Employee records inside a tenant
//! - User account provisioning against the identity provider

mod handlers;

use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::info;
use trackera_common::{
    auth::JwtManager,
    config::AppConfig,
    db::{DbPool, Repository},
    identity::{create_identity_provider, IdentityProvider},
    metrics,
    provisioning::ProvisioningService,
    server::{self, HealthProbe},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repo: Repository,
    pub jwt: Arc<JwtManager>,
    pub identity: Arc<dyn IdentityProvider>,
    pub provisioning: Arc<ProvisioningService>,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

impl FromRef<AppState> for HealthProbe {
    fn from_ref(state: &AppState) -> Self {
        HealthProbe {
            service: state.config.observability.service_name.clone(),
            repo: state.repo.clone(),
            identity: state.identity.clone(),
        }
    }
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        repo: Repository,
        jwt: Arc<JwtManager>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let provisioning = Arc::new(ProvisioningService::new(
            identity.clone(),
            Arc::new(repo.clone()),
            &config.provisioning,
        ));

        Self {
            config,
            repo,
            jwt,
            identity,
            provisioning,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load_service("admin-api")?;
    metrics::init_tracing(&config.observability);

    info!("Starting Trackera Admin API v{}", trackera_common::VERSION);

    config.validate().map_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        e
    })?;
    let config = Arc::new(config);

    // Initialize metrics
    metrics::register_metrics();
    metrics::install_exporter(config.observability.metrics_port)?;

    // Initialize database connection
    let db = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        db.run_migrations().await?;
    }

    let jwt = Arc::new(JwtManager::new(
        config.jwt_secret()?,
        &config.auth.jwt_audience,
        config.auth.jwt_expiration_secs,
    ));
    let identity = create_identity_provider(&config.identity, jwt.clone())?;
    info!(provider = identity.provider_name(), "Identity provider ready");

    let state = AppState::new(config.clone(), Repository::new(db), jwt, identity);

    let app = server::with_standard_layers(create_router(state), &config.server);
    server::serve(app, &config.server).await?;

    Ok(())
}

/// Create the admin router
fn create_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        // Tenants
        .route(
            "/tenants",
            get(handlers::tenants::list_tenants).post(handlers::tenants::create_tenant),
        )
        .route("/tenants/{tenant_id}", get(handlers::tenants::get_tenant))
        // Employees
        .route(
            "/employees/{tenant_id}",
            get(handlers::employees::list_employees).post(handlers::employees::create_employee),
        )
        // Users
        .route(
            "/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route(
            "/users/{id}",
            get(handlers::users::get_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route(
            "/users/{id}/reset-password",
            post(handlers::users::reset_password),
        );

    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(server::health))
        .route("/ready", get(server::ready))
        .nest("/admin", admin_routes)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use sea_orm::DatabaseConnection;
    use tower::ServiceExt;
    use trackera_common::{
        auth::AppMetadata,
        db::models::Role,
        identity::InMemoryIdentityProvider,
    };
    use uuid::Uuid;

    /// State whose database is never reached: every request below is
    /// rejected before a handler touches the repository.
    fn test_state() -> AppState {
        let jwt = Arc::new(JwtManager::new("test-secret", "authenticated", 3600));
        let identity = Arc::new(InMemoryIdentityProvider::new(jwt.clone()));
        let repo = Repository::new(DbPool::from_connection(DatabaseConnection::Disconnected));
        AppState::new(Arc::new(AppConfig::default()), repo, jwt, identity)
    }

    fn token(state: &AppState, role: Role) -> String {
        let metadata = AppMetadata {
            tenant_id: None,
            role: Some(role),
        };
        state
            .jwt
            .generate_token(Uuid::new_v4(), "someone@trackera.test", metadata)
            .unwrap()
    }

    async fn status_of(request: Request<Body>) -> StatusCode {
        create_router(test_state())
            .oneshot(request)
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        assert_eq!(status_of(request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_routes_require_token() {
        let request = Request::builder().uri("/admin/tenants").body(Body::empty()).unwrap();
        assert_eq!(status_of(request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_routes_reject_non_admins() {
        let state = test_state();
        let request = Request::builder()
            .uri("/admin/users")
            .header(header::AUTHORIZATION, format!("Bearer {}", token(&state, Role::TenantAdmin)))
            .body(Body::empty())
            .unwrap();

        let response = create_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_bad_user_filter_returns_error_body() {
        let state = test_state();
        let request = Request::builder()
            .uri("/admin/users?status=frozen")
            .header(header::AUTHORIZATION, format!("Bearer {}", token(&state, Role::SuperAdmin)))
            .body(Body::empty())
            .unwrap();

        let response = create_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_invalid_body_rejected_before_provisioning() {
        let state = test_state();
        let request = Request::builder()
            .method("POST")
            .uri("/admin/users")
            .header(header::AUTHORIZATION, format!("Bearer {}", token(&state, Role::SuperAdmin)))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"tenantId":"not-a-uuid","email":"x"}"#))
            .unwrap();

        let response = create_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
