//! HTTP API for health checks, Prometheus metrics and user events

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use idler_lib::{DispatchError, IdlerMetrics, IdlerSupervisor, User};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
pub struct AppState {
    pub supervisor: Arc<IdlerSupervisor>,
    pub metrics: IdlerMetrics,
    ready: AtomicBool,
}

impl AppState {
    pub fn new(supervisor: Arc<IdlerSupervisor>, metrics: IdlerMetrics) -> Self {
        Self {
            supervisor,
            metrics,
            ready: AtomicBool::new(false),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

/// Liveness: the process serves requests
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "idlers": state.supervisor.len(),
        })),
    )
}

/// Readiness: 200 once initialised and until shutdown starts
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if !state.ready.load(Ordering::SeqCst) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "ready": false, "reason": "Idler not yet initialized" })),
        );
    }

    if state.supervisor.shutdown_token().is_cancelled() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "ready": false, "reason": "Idler shutting down" })),
        );
    }

    (StatusCode::OK, Json(json!({ "ready": true })))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Accept a fresh user snapshot and route it to the user's idler
async fn post_user(
    State(state): State<Arc<AppState>>,
    Json(user): Json<User>,
) -> impl IntoResponse {
    let user_id = user.id.clone();

    match state.supervisor.dispatch(user) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(json!({ "status": "accepted", "id": user_id })),
        ),
        Err(e) => {
            let status = match e {
                DispatchError::QueueFull(_) => StatusCode::TOO_MANY_REQUESTS,
                DispatchError::Closed(_) | DispatchError::ShuttingDown => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                DispatchError::Create { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warn!(user_id = %user_id, error = %e, "Unable to dispatch user event");
            (
                status,
                Json(json!({ "status": "rejected", "id": user_id, "error": e.to_string() })),
            )
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/users", post(post_user))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::body::Body;
    use axum::http::Request;
    use idler_lib::openshift::{async_trait, OpenShiftClient};
    use idler_lib::toggles::FixedUuidToggle;
    use idler_lib::{IdlerConfig, JenkinsState};
    use tower::ServiceExt;

    struct RunningOpenShift;

    #[async_trait]
    impl OpenShiftClient for RunningOpenShift {
        async fn is_idle(&self, _: &str, _: &str, _: &str, _: &str) -> Result<JenkinsState> {
            Ok(JenkinsState::Running)
        }

        async fn idle(&self, _: &str, _: &str, _: &str, _: &str) -> Result<()> {
            Ok(())
        }

        async fn unidle(&self, _: &str, _: &str, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
    }

    fn setup_test_app() -> (Router, Arc<AppState>) {
        let supervisor = Arc::new(
            IdlerSupervisor::new(
                "https://api.cluster.example.com",
                "token",
                IdlerConfig::default(),
                Arc::new(RunningOpenShift),
                Arc::new(FixedUuidToggle::default()),
            )
            .unwrap(),
        );
        let state = Arc::new(AppState::new(supervisor, IdlerMetrics::new()));
        (create_router(state.clone()), state)
    }

    fn user_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/users")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_healthz_returns_ok() {
        let (app, _) = setup_test_app();

        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readyz_follows_lifecycle() {
        let (app, state) = setup_test_app();

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.set_ready(true);
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        state.supervisor.shutdown().await;
        let response = app
            .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (app, state) = setup_test_app();
        state.metrics.inc_events_dropped();

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("jenkins_idler_events_dropped_total"));
    }

    #[tokio::test]
    async fn test_post_user_starts_idler() {
        let (app, state) = setup_test_app();

        let response = app
            .oneshot(user_request(r#"{"id": "u1", "name": "alice"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(state.supervisor.contains("u1"));

        state.supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_post_user_after_shutdown_is_rejected() {
        let (app, state) = setup_test_app();
        state.supervisor.shutdown().await;

        let response = app
            .oneshot(user_request(r#"{"id": "u1", "name": "alice"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_post_user_rejects_malformed_body() {
        let (app, _) = setup_test_app();

        let response = app.oneshot(user_request(r#"{"name": 3}"#)).await.unwrap();

        assert!(response.status().is_client_error());
    }
}
