use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tracing::debug;
use tunemate_core::SessionStore;
use utoipa::OpenApi;
use validator::Validate;

use crate::error::ServerError;
use crate::schemas::v1::events::{IngestResponse, ListeningEventRequest};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(ingest_event),
    components(schemas(ListeningEventRequest, IngestResponse))
)]
pub struct EventsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/listening-events", post(ingest_event))
}

/// Record one listening sample. Only samples with `is_playing` set are kept.
#[utoipa::path(
    post,
    path = "/v1/listening-events",
    tag = "listening-events",
    request_body = ListeningEventRequest,
    responses(
        (status = 200, description = "Sample processed", body = IngestResponse),
        (status = 400, description = "Missing user or artist id"),
        (status = 500, description = "Session store write failed"),
    )
)]
pub async fn ingest_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ListeningEventRequest>,
) -> Result<Json<IngestResponse>, ServerError> {
    req.validate()
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;

    if !req.is_playing {
        debug!(user_id = %req.user_id, "dropping paused sample");
        return Ok(Json(IngestResponse { stored: false }));
    }

    state.store.append_event(req.into_event()).await?;
    Ok(Json(IngestResponse { stored: true }))
}
