//! Health / heartbeat endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health))]
pub struct HealthApi;

/// Register health-check routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// Heartbeat endpoint.
///
/// Returns `{"status": "ok", "version": "...", "conversations": n, "connections": n}`
/// with HTTP 200.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is healthy", body = Value)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let registry = state.relay.registry();
    Json(json!({
        "status":        "ok",
        "version":       env!("CARGO_PKG_VERSION"),
        "conversations": registry.conversation_count(),
        "connections":   registry.connection_count(),
    }))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use crate::routes::test_support;

    #[tokio::test]
    async fn health_response_has_ok_status() {
        let Json(body) = get_health(State(test_support::state().await)).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn health_response_has_version() {
        let Json(body) = get_health(State(test_support::state().await)).await;
        assert!(!body["version"].as_str().unwrap_or("").is_empty());
    }

    #[tokio::test]
    async fn health_reports_idle_registry() {
        let Json(body) = get_health(State(test_support::state().await)).await;
        assert_eq!(body["conversations"], 0);
        assert_eq!(body["connections"], 0);
    }
}
