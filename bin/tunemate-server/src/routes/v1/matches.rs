use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use tracing::debug;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::v1::matches::{MatchCandidateResponse, MatchesResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_matches),
    components(schemas(MatchesResponse, MatchCandidateResponse))
)]
pub struct MatchesApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/users/{user_id}/matches", get(list_matches))
}

/// Users with overlapping listening history, most similar first.
#[utoipa::path(
    get,
    path = "/v1/users/{user_id}/matches",
    tag = "matches",
    params(("user_id" = String, Path, description = "Requesting user")),
    responses(
        (status = 200, description = "Up to ten ranked candidates", body = MatchesResponse),
        (status = 503, description = "Session or profile store unavailable"),
    )
)]
pub async fn list_matches(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<MatchesResponse>, ServerError> {
    let candidates = state.matcher.compute_matches(&user_id).await?;
    debug!(user_id = %user_id, count = candidates.len(), "matches computed");
    Ok(Json(MatchesResponse {
        matches: candidates.into_iter().map(Into::into).collect(),
    }))
}
