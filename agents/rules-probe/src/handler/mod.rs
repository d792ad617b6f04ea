//! HTTP handler for the Rules Probe Agent
//!
//! Delivers activation signals over HTTP. A matching signal starts a probe
//! run in the background and the request returns immediately.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::contracts::{AGENT_ID, AGENT_VERSION};
use crate::engine::RulesProbe;
use crate::telemetry::ProbeMetrics;

/// Application state
pub struct AppState {
    pub probe: Arc<RulesProbe>,
    pub metrics: Arc<ProbeMetrics>,
}

impl AppState {
    pub fn new(probe: Arc<RulesProbe>, metrics: Arc<ProbeMetrics>) -> Self {
        Self { probe, metrics }
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/v1/broadcast", post(broadcast))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        agent_id: AGENT_ID.to_string(),
        agent_version: AGENT_VERSION.to_string(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode_text() {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Deliver an activation signal
async fn broadcast(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BroadcastRequest>,
) -> (StatusCode, Json<BroadcastResponse>) {
    if !state.probe.accept(&request.action) {
        return (
            StatusCode::OK,
            Json(BroadcastResponse {
                accepted: false,
                request_id: None,
            }),
        );
    }

    let request_id = Uuid::new_v4();
    let probe = Arc::clone(&state.probe);
    tokio::spawn(async move {
        // outcome is reported through the run's own log lines
        let _ = probe.run_with_id(request_id).await;
    });

    (
        StatusCode::ACCEPTED,
        Json(BroadcastResponse {
            accepted: true,
            request_id: Some(request_id),
        }),
    )
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub agent_id: String,
    pub agent_version: String,
}

/// Signal delivery request
#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub action: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BroadcastResponse {
    pub accepted: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryStore;
    use crate::contracts::{DEFAULT_ACTION, DEFAULT_COLLECTION};
    use crate::identity::{Principal, StaticIdentity};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state(store: Arc<MemoryStore>) -> Arc<AppState> {
        let metrics = Arc::new(ProbeMetrics::new().unwrap());
        let probe = RulesProbe::new(
            store,
            Arc::new(StaticIdentity::signed_in(Principal::new("u1"))),
        )
        .with_metrics(Arc::clone(&metrics));
        Arc::new(AppState::new(Arc::new(probe), metrics))
    }

    fn broadcast_request(action: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/broadcast")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::json!({ "action": action }).to_string()))
            .unwrap()
    }

    async fn read_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let router = create_router(test_state(Arc::new(MemoryStore::new())));
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["agent_id"], AGENT_ID);
    }

    #[tokio::test]
    async fn test_non_matching_signal_ignored() {
        let state = test_state(Arc::new(MemoryStore::new()));
        let router = create_router(Arc::clone(&state));

        let response = router.oneshot(broadcast_request("other.ACTION")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["accepted"], false);
        assert_eq!(state.metrics.signals(false), 1);
        assert_eq!(state.metrics.runs("passed"), 0);
    }

    #[tokio::test]
    async fn test_matching_signal_spawns_run() {
        let store = Arc::new(MemoryStore::new());
        let state = test_state(Arc::clone(&store));
        let router = create_router(Arc::clone(&state));

        let response = router.oneshot(broadcast_request(DEFAULT_ACTION)).await.unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = read_json(response).await;
        assert_eq!(body["accepted"], true);

        for _ in 0..100 {
            if state.metrics.runs("passed") == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(state.metrics.runs("passed"), 1);
        assert_eq!(state.metrics.signals(true), 1);
        assert!(store.is_empty(DEFAULT_COLLECTION).await);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let router = create_router(test_state(Arc::new(MemoryStore::new())));
        let response = router
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
