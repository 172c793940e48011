pub mod conversations;
pub mod events;
pub mod matches;
pub mod profiles;
pub mod ws;

use std::sync::Arc;

use axum::Router;
use utoipa::OpenApi;

use crate::state::AppState;

/// Routes nested under `/v1`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(matches::router())
        .merge(conversations::router())
        .merge(events::router())
        .merge(profiles::router())
        .merge(ws::router())
}

#[derive(OpenApi)]
#[openapi()]
pub struct V1Api;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut spec = V1Api::openapi();
    spec.merge(matches::MatchesApi::openapi());
    spec.merge(conversations::ConversationsApi::openapi());
    spec.merge(events::EventsApi::openapi());
    spec.merge(profiles::ProfilesApi::openapi());
    spec.merge(ws::ChatSocketApi::openapi());
    spec
}
