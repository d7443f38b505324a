//! HTTP server plumbing shared by the services

use crate::config::ServerConfig;
use crate::db::Repository;
use crate::errors::Result;
use crate::identity::IdentityProvider;
use crate::metrics;
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    middleware, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

/// CORS for the configured origins; any origin when none are configured
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
}

/// Wrap a finished router with the standard layer stack
pub fn with_standard_layers(router: Router, config: &ServerConfig) -> Router {
    router
        .layer(middleware::from_fn(metrics::track_requests))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

// ============================================================================
// Health probes
// ============================================================================

/// What the health endpoints look at; each service derives it from its state
#[derive(Clone)]
pub struct HealthProbe {
    pub service: String,
    pub repo: Repository,
    pub identity: Arc<dyn IdentityProvider>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: CheckResult,
    pub identity_provider: String,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health(State(probe): State<HealthProbe>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: probe.service,
        version: crate::VERSION,
    })
}

/// Readiness probe - 503 until the database answers
pub async fn ready(State(probe): State<HealthProbe>) -> (StatusCode, Json<ReadyResponse>) {
    let start = Instant::now();

    let database = match probe.repo.ping().await {
        Ok(()) => CheckResult {
            status: "up",
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => CheckResult {
            status: "down",
            latency_ms: None,
            error: Some(e.to_string()),
        },
    };

    let (code, status) = if database.status == "up" {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (
        code,
        Json(ReadyResponse {
            status,
            checks: HealthChecks {
                database,
                identity_provider: probe.identity.provider_name().to_string(),
            },
        }),
    )
}

/// Bind and serve until Ctrl+C or SIGTERM
pub async fn serve(router: Router, config: &ServerConfig) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(drain))
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler; in-flight requests get `drain` to finish
async fn shutdown_signal(drain: Duration) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }

    tokio::spawn(async move {
        tokio::time::sleep(drain).await;
        warn!(drain_secs = drain.as_secs(), "Requests still in flight after drain timeout, exiting");
        std::process::exit(1);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtManager;
    use crate::db::DbPool;
    use crate::identity::InMemoryIdentityProvider;
    use axum::{body::Body, http::Request, routing::get};
    use sea_orm::DatabaseConnection;
    use tower::ServiceExt;

    fn probe_router() -> Router {
        let jwt = Arc::new(JwtManager::new("test-secret", "authenticated", 3600));
        let probe = HealthProbe {
            service: "admin-api".to_string(),
            repo: Repository::new(DbPool::from_connection(DatabaseConnection::Disconnected)),
            identity: Arc::new(InMemoryIdentityProvider::new(jwt)),
        };

        Router::new()
            .route("/health", get(health))
            .route("/ready", get(ready))
            .with_state(probe)
    }

    async fn json_of(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_service() {
        let response = probe_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_of(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "admin-api");
    }

    #[tokio::test]
    async fn test_ready_is_unavailable_without_database() {
        let response = probe_router()
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_of(response).await;
        assert_eq!(body["checks"]["database"]["status"], "down");
        assert_eq!(body["checks"]["identity_provider"], "memory");
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let router = Router::new().route("/health", get(|| async { "ok" }));
        let app = with_standard_layers(router, &ServerConfig::default());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[test]
    fn test_cors_accepts_listed_origins() {
        // Invalid entries are dropped instead of failing startup
        let _ = cors_layer(&["https://app.trackera.io".to_string(), "bad\norigin".to_string()]);
        let _ = cors_layer(&[]);
    }
}
