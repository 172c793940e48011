use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use tunemate_core::HISTORY_LIMIT;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::v1::conversations::{ConversationQuery, ConversationResponse, MessageResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(get_conversation),
    components(schemas(ConversationResponse, MessageResponse))
)]
pub struct ConversationsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/conversations/{user_a}/{user_b}", get(get_conversation))
}

/// Stored messages between two users, oldest first.
///
/// Without `before` this is the most recent page. `before` pages backwards
/// through older messages; `total` always counts the whole conversation.
#[utoipa::path(
    get,
    path = "/v1/conversations/{user_a}/{user_b}",
    tag = "conversations",
    params(
        ("user_a" = String, Path, description = "One participant"),
        ("user_b" = String, Path, description = "The other participant"),
        ConversationQuery,
    ),
    responses(
        (status = 200, description = "Conversation page", body = ConversationResponse),
        (status = 400, description = "Invalid page size"),
        (status = 503, description = "Chat log unavailable"),
    )
)]
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path((user_a, user_b)): Path<(String, String)>,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<ConversationResponse>, ServerError> {
    if query.limit.is_some_and(|limit| limit == 0 || limit > HISTORY_LIMIT) {
        return Err(ServerError::BadRequest(format!(
            "limit must be between 1 and {HISTORY_LIMIT}"
        )));
    }

    let messages = match (query.before, query.limit) {
        (None, None) => state.relay.history(&user_a, &user_b).await?,
        (before, limit) => {
            state
                .relay
                .history_before(
                    &user_a,
                    &user_b,
                    before.unwrap_or(i64::MAX),
                    limit.unwrap_or(HISTORY_LIMIT),
                )
                .await?
        }
    };
    let total = state.relay.conversation_total(&user_a, &user_b).await?;

    Ok(Json(ConversationResponse {
        messages: messages.into_iter().map(Into::into).collect(),
        total,
    }))
}
