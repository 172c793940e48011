use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::put;
use axum::{Json, Router};
use tunemate_core::ProfileStore;
use utoipa::OpenApi;
use validator::Validate;

use crate::error::ServerError;
use crate::schemas::v1::profiles::{ProfileResponse, UpsertProfileRequest};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(upsert_profile),
    components(schemas(UpsertProfileRequest, ProfileResponse))
)]
pub struct ProfilesApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/profiles/{user_id}", put(upsert_profile))
}

#[utoipa::path(
    put,
    path = "/v1/profiles/{user_id}",
    tag = "profiles",
    params(("user_id" = String, Path, description = "Profile owner")),
    request_body = UpsertProfileRequest,
    responses(
        (status = 200, description = "Profile stored", body = ProfileResponse),
        (status = 400, description = "Invalid display name or image url"),
        (status = 500, description = "Profile store write failed"),
    )
)]
pub async fn upsert_profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(req): Json<UpsertProfileRequest>,
) -> Result<Json<ProfileResponse>, ServerError> {
    req.validate()
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;

    let profile = req.into_profile(user_id);
    state.store.upsert_profile(profile.clone()).await?;
    Ok(Json(profile.into()))
}
