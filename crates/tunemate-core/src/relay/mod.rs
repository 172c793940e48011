//! Real-time chat relay.
//!
//! [`ChatRelay`] ties the [`ConnectionRegistry`] to a [`ChatLog`]: it admits
//! connections, persists each inbound message, and fans it out to every live
//! connection of the conversation, the sender's own included.
//!
//! Fan-out works on a registry snapshot and never holds a registry lock while
//! sending. Each recipient gets an independent delivery attempt bounded by
//! [`RelayConfig::delivery_timeout`]; a recipient that misses the deadline is
//! disconnected and the others are unaffected.

mod clock;
mod connection;
mod frame;
mod registry;


use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::CoreError;
use crate::store::ChatLog;
use crate::types::{ChatMessage, ConversationKey, NewChatMessage};

pub use clock::MonotonicClock;
pub use connection::{Connection, ConnectionId, ConnectionState};
pub use frame::{InboundFrame, OutboundMessage, ServerFrame};
pub use registry::ConnectionRegistry;

/// Hard cap on the number of messages returned by one history read.
pub const HISTORY_LIMIT: usize = 100;

/// Largest accepted message body, in bytes.
pub const MAX_MESSAGE_BYTES: usize = 4 * 1024;

/// Tunables for [`ChatRelay`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Upper bound on one delivery attempt to one connection.
    pub delivery_timeout: Duration,
    /// Upper bound on the transport handshake in [`ChatRelay::accept`].
    pub handshake_timeout: Duration,
    /// Outbound frames buffered per connection before delivery blocks.
    pub outbound_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: Duration::from_secs(2),
            handshake_timeout: Duration::from_secs(5),
            outbound_buffer: 64,
        }
    }
}

/// A freshly opened connection and the receiver its writer must drain.
#[derive(Debug)]
pub struct Accepted {
    pub connection: Arc<Connection>,
    pub outbound: mpsc::Receiver<ServerFrame>,
}

pub struct ChatRelay<L> {
    registry: Arc<ConnectionRegistry>,
    log: Arc<L>,
    clock: MonotonicClock,
    config: RelayConfig,
}

impl<L> fmt::Debug for ChatRelay<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatRelay")
            .field("conversations", &self.registry.conversation_count())
            .field("config", &self.config)
            .finish()
    }
}

impl<L: ChatLog> ChatRelay<L> {
    pub fn new(registry: Arc<ConnectionRegistry>, log: Arc<L>, config: RelayConfig) -> Self {
        Self {
            registry,
            log,
            clock: MonotonicClock::new(),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Open a connection for `sender_id` in its conversation with
    /// `receiver_id`.
    ///
    /// `handshake` is the transport's own setup step. If it fails or exceeds
    /// the handshake timeout the connection is closed without ever being
    /// registered.
    pub async fn accept<F, E>(
        &self,
        sender_id: &str,
        receiver_id: &str,
        handshake: F,
    ) -> Result<Accepted, CoreError>
    where
        F: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        if sender_id.is_empty() || receiver_id.is_empty() {
            return Err(CoreError::HandshakeFailed(
                "participant ids must not be empty".to_owned(),
            ));
        }
        if self.registry.is_closing() {
            return Err(CoreError::HandshakeFailed("relay is shutting down".to_owned()));
        }

        let (connection, outbound) =
            Connection::pending(sender_id, receiver_id, self.config.outbound_buffer);

        let failure = match tokio::time::timeout(self.config.handshake_timeout, handshake).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("timed out after {:?}", self.config.handshake_timeout)),
        };
        if let Some(reason) = failure {
            connection.mark_closed();
            warn!(conn_id = connection.id(), sender_id, receiver_id, %reason, "handshake failed");
            return Err(CoreError::HandshakeFailed(reason));
        }

        let key = connection.key().clone();
        if !connection.mark_open() || !self.registry.register(&key, Arc::clone(&connection)) {
            // shutdown() ran while the handshake was in flight.
            connection.mark_closed();
            return Err(CoreError::HandshakeFailed("relay is shutting down".to_owned()));
        }
        debug!(conn_id = connection.id(), key = %key, participant = sender_id, "connection accepted");

        Ok(Accepted {
            connection,
            outbound,
        })
    }

    /// Persist `body` as a message from `conn`'s participant, then deliver it
    /// to every live connection of the conversation.
    ///
    /// Nothing is delivered if the chat log rejects the write; the error is
    /// returned to the caller, which owns the sending connection.
    pub async fn handle_inbound(
        &self,
        conn: &Connection,
        body: String,
    ) -> Result<ChatMessage, CoreError> {
        if !conn.is_open() {
            return Err(CoreError::ConnectionClosed(conn.id()));
        }
        if body.trim().is_empty() {
            return Err(CoreError::InvalidMessage("message body is empty".to_owned()));
        }
        if body.len() > MAX_MESSAGE_BYTES {
            return Err(CoreError::InvalidMessage(format!(
                "message too large ({} bytes); maximum is {MAX_MESSAGE_BYTES} bytes",
                body.len()
            )));
        }

        let msg = NewChatMessage {
            sender_id: conn.participant().to_owned(),
            receiver_id: conn.peer().to_owned(),
            body,
            created_at: self.clock.now(),
        };
        let stored = self.log.append(msg).await.map_err(|e| {
            error!(conn_id = conn.id(), key = %conn.key(), error = %e, "failed to persist chat message");
            CoreError::PersistFailed(e.to_string())
        })?;

        let delivered = self.fan_out(conn.key(), &stored).await;
        debug!(message_id = stored.id, key = %conn.key(), delivered, "message relayed");
        Ok(stored)
    }

    /// Deliver `msg` to the current members of `key`. Returns how many
    /// connections accepted it.
    async fn fan_out(&self, key: &ConversationKey, msg: &ChatMessage) -> usize {
        let members = self.registry.snapshot(key);
        let frame = ServerFrame::Message(OutboundMessage::from(msg));
        let timeout = self.config.delivery_timeout;

        let attempts = members.iter().map(|member| {
            let frame = frame.clone();
            async move {
                match member.deliver(frame, timeout).await {
                    Ok(()) => true,
                    Err(CoreError::ConnectionClosed(_)) => false,
                    Err(e) => {
                        warn!(conn_id = member.id(), key = %key, error = %e, "delivery failed; disconnecting recipient");
                        self.handle_disconnect(member);
                        false
                    }
                }
            }
        });

        join_all(attempts).await.into_iter().filter(|ok| *ok).count()
    }

    /// Unregister `conn`. Stored messages are left untouched.
    pub fn handle_disconnect(&self, conn: &Connection) {
        if self.registry.unregister(conn.key(), conn) {
            debug!(conn_id = conn.id(), key = %conn.key(), "connection closed");
        }
    }

    /// Best-effort error frame to a single connection. Never blocks.
    pub fn notify(&self, conn: &Connection, error: impl Into<String>) -> bool {
        conn.try_deliver(ServerFrame::error(error)).is_ok()
    }

    /// The [`HISTORY_LIMIT`] most recent messages between two users,
    /// oldest first.
    pub async fn history(&self, user_a: &str, user_b: &str) -> Result<Vec<ChatMessage>, CoreError> {
        let key = ConversationKey::new(user_a, user_b);
        self.log
            .recent(&key, HISTORY_LIMIT)
            .await
            .map_err(|e| CoreError::DataUnavailable(e.to_string()))
    }

    /// Page backwards from `before_id`: up to `limit` (at most
    /// [`HISTORY_LIMIT`]) older messages, oldest first.
    pub async fn history_before(
        &self,
        user_a: &str,
        user_b: &str,
        before_id: i64,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, CoreError> {
        let key = ConversationKey::new(user_a, user_b);
        self.log
            .before(&key, before_id, limit.min(HISTORY_LIMIT))
            .await
            .map_err(|e| CoreError::DataUnavailable(e.to_string()))
    }

    /// Number of stored messages between two users.
    pub async fn conversation_total(&self, user_a: &str, user_b: &str) -> Result<u64, CoreError> {
        let key = ConversationKey::new(user_a, user_b);
        self.log
            .count(&key)
            .await
            .map_err(|e| CoreError::DataUnavailable(e.to_string()))
    }

    /// Close every live connection. Returns how many were closed.
    pub fn shutdown(&self) -> usize {
        let closed = self.registry.close_all();
        info!(closed, "chat relay shut down");
        closed
    }
}
