use thiserror::Error;

use crate::relay::ConnectionId;

/// Errors produced by the matcher and the chat relay.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A backing store could not be read. The operation was aborted.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// A profile or conversation does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The transport could not complete its handshake; the connection was
    /// never registered.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// One fan-out recipient could not be reached in time.
    #[error("delivery to connection {connection_id} failed: {reason}")]
    DeliveryFailed {
        connection_id: ConnectionId,
        reason: String,
    },

    /// A write to the chat log or session store failed.
    #[error("persist failed: {0}")]
    PersistFailed(String),

    /// An inbound message was rejected before it reached the chat log.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The connection is no longer open.
    #[error("connection {0} is closed")]
    ConnectionClosed(ConnectionId),
}
