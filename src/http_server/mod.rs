//! HTTP surface: the one-shot check endpoint and the monitor control API.
use axum::{
    Json, Router,
    extract::State,
    http::HeaderValue,
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::availability::{AvailabilityClient, CheckOutcome};
use crate::monitor::{MonitorHandle, MonitorState, SessionSnapshot, Transition, format_countdown};

pub mod error;
pub mod websocket;

use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub monitor: MonitorHandle,
    pub checker: Arc<dyn AvailabilityClient>,
    pub allowed_host: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub target: String,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub transition: Transition,
    pub state: MonitorState,
}

/// Snapshot plus the countdown fields a UI would otherwise compute itself.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
    pub seconds_until_next_check: i64,
    pub countdown: String,
}

impl From<SessionSnapshot> for StatusResponse {
    fn from(snapshot: SessionSnapshot) -> Self {
        let seconds = snapshot.seconds_until_next_check(Utc::now());
        Self {
            snapshot,
            seconds_until_next_check: seconds,
            countdown: format_countdown(seconds),
        }
    }
}

/// Loose shape check the UI applies before starting a session.
pub fn is_http_url(target: &str) -> bool {
    target.trim().starts_with("http")
}

pub fn is_booking_url(url: &str, allowed_host: &str) -> bool {
    !url.trim().is_empty() && url.contains(allowed_host)
}

fn cors_layer(frontend_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match frontend_origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            warn!(origin = %frontend_origin, error = %e, "Invalid frontend origin; cross-origin requests will be refused.");
            layer
        }
    }
}

pub fn create_router(state: AppState, frontend_origin: &str) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/check-availability", post(check_availability))
        .route("/api/monitor/start", post(start_monitor))
        .route("/api/monitor/stop", post(stop_monitor))
        .route("/api/monitor/force-check", post(force_check))
        .route("/api/monitor/reset", post(reset_monitor))
        .route("/api/monitor/status", get(monitor_status))
        .route("/api/monitor/ws", get(websocket::monitor_ws_handler))
        .layer(cors_layer(frontend_origin))
        .with_state(state)
}

async fn home() -> Json<Value> {
    Json(json!({ "status": "alive", "mode": "monitor" }))
}

async fn check_availability(
    State(state): State<AppState>,
    Json(payload): Json<CheckRequest>,
) -> Result<Json<CheckOutcome>, AppError> {
    if !is_booking_url(&payload.url, &state.allowed_host) {
        return Err(AppError::InvalidInput("Invalid booking URL".to_string()));
    }
    let outcome = match state.checker.check_availability(&payload.url).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "One-shot availability check failed.");
            CheckOutcome::failed(vec![format!("System Error: {e}")])
        }
    };
    Ok(Json(outcome))
}

fn transition_response(state: &AppState, transition: Transition) -> Json<TransitionResponse> {
    Json(TransitionResponse {
        transition,
        state: state.monitor.snapshot().state,
    })
}

async fn start_monitor(
    State(state): State<AppState>,
    Json(payload): Json<StartRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    if !is_http_url(&payload.target) {
        return Err(AppError::InvalidInput(
            "Enter a valid booking URL (http/https)".to_string(),
        ));
    }
    let transition = state.monitor.start(payload.target).await?;
    info!(transition = ?transition, "Start requested over HTTP.");
    Ok(transition_response(&state, transition))
}

async fn stop_monitor(State(state): State<AppState>) -> Result<Json<TransitionResponse>, AppError> {
    let transition = state.monitor.stop().await?;
    Ok(transition_response(&state, transition))
}

async fn force_check(State(state): State<AppState>) -> Result<Json<TransitionResponse>, AppError> {
    let transition = state.monitor.force_check().await?;
    Ok(transition_response(&state, transition))
}

async fn reset_monitor(State(state): State<AppState>) -> Result<Json<TransitionResponse>, AppError> {
    let transition = state.monitor.reset().await?;
    Ok(transition_response(&state, transition))
}

async fn monitor_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse::from(state.monitor.snapshot()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::{AvailabilityError, JourneyInfo};
    use crate::monitor::{BackoffGenerator, MonitorScheduler};
    use crate::notifications::Notifier;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct FixedClient {
        fail: bool,
    }

    #[async_trait]
    impl AvailabilityClient for FixedClient {
        async fn check_availability(&self, _target: &str) -> Result<CheckOutcome, AvailabilityError> {
            if self.fail {
                return Err(AvailabilityError::InvalidResponse("timed out".to_string()));
            }
            Ok(CheckOutcome {
                success: true,
                is_available: false,
                logs: vec!["🔴 BENGAWAN: Habis / Sold Out".to_string()],
                data: Some(JourneyInfo {
                    name: "BENGAWAN".to_string(),
                    ..JourneyInfo::default()
                }),
            })
        }
    }

    struct Silent;

    impl Notifier for Silent {
        fn notify(&self, _journey: &JourneyInfo) {}
    }

    fn router(fail: bool) -> Router {
        let checker: Arc<dyn AvailabilityClient> = Arc::new(FixedClient { fail });
        let backoff = BackoffGenerator::seeded(180, 300, 3).unwrap();
        let (monitor, _task) = MonitorScheduler::spawn(checker.clone(), Arc::new(Silent), backoff);
        let state = AppState {
            monitor,
            checker,
            allowed_host: "booking.kai.id".to_string(),
        };
        create_router(state, "http://localhost:5173")
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_empty(uri: &str) -> Request<Body> {
        Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_home_is_alive() {
        let response = router(false)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["status"], "alive");
    }

    #[tokio::test]
    async fn test_check_rejects_foreign_url() {
        let response = router(false)
            .oneshot(post_json("/check-availability", json!({ "url": "https://example.com/x" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["detail"], "Invalid booking URL");
    }

    #[tokio::test]
    async fn test_check_returns_outcome() {
        let response = router(false)
            .oneshot(post_json(
                "/check-availability",
                json!({ "url": "https://booking.kai.id/?origination=SK" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["is_available"], false);
        assert_eq!(body["data"]["name"], "BENGAWAN");
        assert_eq!(body["logs"][0], "🔴 BENGAWAN: Habis / Sold Out");
    }

    #[tokio::test]
    async fn test_check_failure_is_reported_in_body() {
        let response = router(true)
            .oneshot(post_json(
                "/check-availability",
                json!({ "url": "https://booking.kai.id/?origination=SK" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["logs"][0], "System Error: Invalid response: timed out");
    }

    #[tokio::test]
    async fn test_start_requires_http_target() {
        let response = router(false)
            .oneshot(post_json("/api/monitor/start", json!({ "target": "booking.kai.id" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_start_status_stop() {
        let app = router(false);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/monitor/start",
                json!({ "target": "https://booking.kai.id/?origination=SK" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["transition"], "applied");

        let response = app.clone().oneshot(post_empty("/api/monitor/stop")).await.unwrap();
        let body = read_json(response).await;
        assert_eq!(body["transition"], "applied");
        assert_eq!(body["state"], "stopped");

        let response = app.clone().oneshot(post_empty("/api/monitor/force-check")).await.unwrap();
        assert_eq!(read_json(response).await["transition"], "ignored");

        let response = app
            .oneshot(Request::builder().uri("/api/monitor/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = read_json(response).await;
        assert_eq!(body["state"], "stopped");
        assert_eq!(body["countdown"], "0:00");
        assert_eq!(body["target"], "https://booking.kai.id/?origination=SK");
    }

    #[test]
    fn test_url_checks() {
        assert!(is_http_url(" https://booking.kai.id/"));
        assert!(!is_http_url("booking.kai.id"));
        assert!(is_booking_url("https://booking.kai.id/x", "booking.kai.id"));
        assert!(!is_booking_url("", "booking.kai.id"));
        assert!(!is_booking_url("https://example.com", "booking.kai.id"));
    }
}
