//! JSON frames exchanged over a chat connection.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::types::ChatMessage;

/// Frame sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundFrame {
    pub message: String,
}

/// A relayed chat message as seen by every member of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub message: String,
    /// ISO-8601 creation time assigned by the server.
    pub timestamp: String,
}

impl From<&ChatMessage> for OutboundMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            sender_id: msg.sender_id.clone(),
            receiver_id: msg.receiver_id.clone(),
            message: msg.body.clone(),
            timestamp: msg.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

/// Anything the server writes to a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Message(OutboundMessage),
    /// Sent only to the connection whose inbound frame failed.
    Error { error: String },
}

impl ServerFrame {
    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error {
            error: message.into(),
        }
    }
}
