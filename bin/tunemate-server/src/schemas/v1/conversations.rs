use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use tunemate_core::ChatMessage;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConversationQuery {
    /// Return only messages with an id below this one.
    pub before: Option<i64>,
    /// Page size, 1 to 100 (default 100).
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: i64,
    pub sender_id: String,
    pub receiver_id: String,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversationResponse {
    /// Oldest first.
    pub messages: Vec<MessageResponse>,
    /// Every stored message of the conversation, not just this page.
    pub total: u64,
}

impl From<ChatMessage> for MessageResponse {
    fn from(m: ChatMessage) -> Self {
        Self {
            id: m.id,
            sender_id: m.sender_id,
            receiver_id: m.receiver_id,
            message: m.body,
            timestamp: m.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}
