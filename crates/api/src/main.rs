//! Trackera App API
//!
//! Backend for the public web app:
//! - Password login through the identity provider
//! - Profile and weekly dashboard
//! - Projects and time entries in the caller's tenant schema

mod handlers;
mod member;
mod middleware;

use axum::{
    extract::FromRef,
    routing::{get, post, put},
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
    server::{self, HealthProbe},
};

use crate::middleware::rate_limit::{rate_limit, LoginLimiter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repo: Repository,
    pub jwt: Arc<JwtManager>,
    pub identity: Arc<dyn IdentityProvider>,
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load_service("api")?;
    metrics::init_tracing(&config.observability);

    info!("Starting Trackera App API v{}", trackera_common::VERSION);

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

    let state = AppState {
        config: config.clone(),
        repo: Repository::new(db),
        jwt,
        identity,
    };

    let app = server::with_standard_layers(create_router(state), &config.server);
    server::serve(app, &config.server).await?;

    Ok(())
}

/// Create the app router
fn create_router(state: AppState) -> Router {
    let limits = &state.config.rate_limit;
    let mut login = post(handlers::auth::login);
    if limits.enabled {
        let limiter = LoginLimiter::new(limits.requests_per_second, limits.burst);
        login = login.layer(axum::middleware::from_fn_with_state(limiter, rate_limit));
    }

    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(server::health))
        .route("/ready", get(server::ready))
        // Auth
        .route("/auth/login", login)
        .route("/me", get(handlers::me::me))
        // Dashboard
        .route("/dashboard", get(handlers::dashboard::dashboard))
        // Projects
        .route("/projects", get(handlers::projects::list_projects))
        // Time entries
        .route(
            "/time-entries",
            get(handlers::time_entries::list_time_entries)
                .post(handlers::time_entries::create_time_entry),
        )
        .route(
            "/time-entries/{id}",
            put(handlers::time_entries::update_time_entry)
                .delete(handlers::time_entries::delete_time_entry),
        )
        .route(
            "/time-entries/{id}/stop",
            post(handlers::time_entries::stop_time_entry),
        )
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
    use trackera_common::identity::InMemoryIdentityProvider;

    /// State whose database is never reached by the requests below
    fn test_state(config: AppConfig) -> AppState {
        let jwt = Arc::new(JwtManager::new("test-secret", "authenticated", 3600));
        AppState {
            config: Arc::new(config),
            repo: Repository::new(DbPool::from_connection(DatabaseConnection::Disconnected)),
            identity: Arc::new(InMemoryIdentityProvider::new(jwt.clone())),
            jwt,
        }
    }

    fn login_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_member_routes_require_token() {
        for uri in ["/me", "/dashboard", "/projects", "/time-entries"] {
            let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
            let response = create_router(test_state(AppConfig::default()))
                .oneshot(request)
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_login_with_unknown_identity_is_unauthorized() {
        let app = create_router(test_state(AppConfig::default()));
        let response = app
            .oneshot(login_request(r#"{"email":"ana@acme.test","password":"nope"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_is_rate_limited() {
        let mut config = AppConfig::default();
        config.rate_limit.enabled = true;
        config.rate_limit.requests_per_second = 1;
        config.rate_limit.burst = 1;
        let app = create_router(test_state(config));

        let body = r#"{"email":"ana@acme.test","password":"nope"}"#;
        let first = app.clone().oneshot(login_request(body)).await.unwrap();
        let second = app.oneshot(login_request(body)).await.unwrap();

        assert_eq!(first.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
