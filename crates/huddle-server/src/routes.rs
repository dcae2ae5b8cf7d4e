// ABOUTME: Route definitions for the huddle HTTP API.
// ABOUTME: Assembles all routes into a single Axum Router with auth, tracing, and shared state.

use axum::extract::State;
use axum::routing::{delete, get};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::SharedState;
use crate::providers::ProviderStatus;

/// Build the complete Axum router with all routes and shared state.
pub fn create_router(state: SharedState) -> Router {
    let auth = state.auth.clone();
    Router::new()
        .route("/health", get(health))
        .route("/api/providers", get(providers))
        .route(
            "/api/chats/{id}/messages",
            get(api::chat::get_history).post(api::chat::send_message),
        )
        .route(
            "/api/agents",
            get(api::agents::list_agents).post(api::agents::upsert_agent),
        )
        .route("/api/agents/{slug}", delete(api::agents::delete_agent))
        .route(
            "/api/agents/{slug}/files",
            get(api::agents::list_files).post(api::agents::add_file),
        )
        .with_state(state)
        .layer(auth)
        .layer(TraceLayer::new_for_http())
}

/// Health check handler. Returns 200 OK with a simple JSON body.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/providers - Which model providers are configured.
async fn providers(State(state): State<SharedState>) -> Json<ProviderStatus> {
    Json(state.provider_status.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::test_support;
    use axum::body::Body;
    use http::Request;
    use huddle_agent::testing::StubModelClient;
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_returns_ok_without_auth() {
        let (state, _store) = test_support::state(Arc::new(StubModelClient::new("x")));
        let app = create_router(state);
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn api_requires_token() {
        let (state, _store) = test_support::state(Arc::new(StubModelClient::new("x")));
        let app = create_router(state);

        let resp = app
            .clone()
            .oneshot(Request::get("/api/providers").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);

        let resp = app
            .oneshot(
                Request::get("/api/providers")
                    .header("authorization", "Bearer tok-bob")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["defaultModel"], "anthropic/claude-test");
        assert_eq!(json["providers"].as_array().unwrap().len(), 4);
    }
}
