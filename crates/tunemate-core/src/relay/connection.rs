use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};

use crate::error::CoreError;
use crate::relay::frame::ServerFrame;
use crate::types::ConversationKey;

/// Process-unique connection identifier.
pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a [`Connection`]. There are no transitions out of `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Pending = 0,
    Open = 1,
    Closed = 2,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ConnectionState::Pending,
            1 => ConnectionState::Open,
            _ => ConnectionState::Closed,
        }
    }
}

/// One participant's open duplex channel within one conversation.
///
/// Outbound frames go through a bounded buffer drained by the transport's
/// writer; the writer watches [`Connection::closed`] to know when to stop.
pub struct Connection {
    id: ConnectionId,
    participant: String,
    peer: String,
    key: ConversationKey,
    state: AtomicU8,
    outbound: mpsc::Sender<ServerFrame>,
    closed_tx: watch::Sender<bool>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("participant", &self.participant)
            .field("key", &self.key)
            .field("state", &self.state())
            .finish()
    }
}

impl Connection {
    /// Create a `Pending` connection for `participant` talking to `peer`.
    ///
    /// Returns the receiving half of its outbound buffer, which the
    /// transport writer must drain.
    pub fn pending(
        participant: &str,
        peer: &str,
        buffer: usize,
    ) -> (Arc<Self>, mpsc::Receiver<ServerFrame>) {
        let (outbound, rx) = mpsc::channel(buffer.max(1));
        let (closed_tx, _) = watch::channel(false);
        let conn = Arc::new(Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            participant: participant.to_owned(),
            peer: peer.to_owned(),
            key: ConversationKey::new(participant, peer),
            state: AtomicU8::new(ConnectionState::Pending as u8),
            outbound,
            closed_tx,
        });
        (conn, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn participant(&self) -> &str {
        &self.participant
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// `Pending → Open`. Returns `false` if the connection was not pending.
    pub(crate) fn mark_open(&self) -> bool {
        self.state
            .compare_exchange(
                ConnectionState::Pending as u8,
                ConnectionState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to `Closed` and wake the writer. Returns `false` if already closed.
    pub(crate) fn mark_closed(&self) -> bool {
        let prev = self
            .state
            .swap(ConnectionState::Closed as u8, Ordering::AcqRel);
        if prev == ConnectionState::Closed as u8 {
            return false;
        }
        self.closed_tx.send_replace(true);
        true
    }

    /// Resolves once the connection is `Closed`.
    pub async fn closed(&self) {
        let mut rx = self.closed_tx.subscribe();
        // The sender lives in `self`, so `wait_for` can only end with a match.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Queue `frame`, waiting at most `timeout` for buffer space.
    pub async fn deliver(&self, frame: ServerFrame, timeout: Duration) -> Result<(), CoreError> {
        if !self.is_open() {
            return Err(CoreError::ConnectionClosed(self.id));
        }
        self.outbound
            .send_timeout(frame, timeout)
            .await
            .map_err(|e| CoreError::DeliveryFailed {
                connection_id: self.id,
                reason: match e {
                    SendTimeoutError::Timeout(_) => format!("no buffer space within {timeout:?}"),
                    SendTimeoutError::Closed(_) => "writer has gone away".to_owned(),
                },
            })
    }

    /// Queue `frame` only if buffer space is free right now.
    pub fn try_deliver(&self, frame: ServerFrame) -> Result<(), CoreError> {
        if !self.is_open() {
            return Err(CoreError::ConnectionClosed(self.id));
        }
        self.outbound
            .try_send(frame)
            .map_err(|e| CoreError::DeliveryFailed {
                connection_id: self.id,
                reason: match e {
                    TrySendError::Full(_) => "outbound buffer full".to_owned(),
                    TrySendError::Closed(_) => "writer has gone away".to_owned(),
                },
            })
    }
}
