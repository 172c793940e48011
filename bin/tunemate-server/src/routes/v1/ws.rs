//! WebSocket transport for the chat relay.
//!
//! Each socket is split in two: the reader loop below feeds inbound text
//! frames to [`tunemate_core::ChatRelay::handle_inbound`], and a writer task
//! drains the connection's outbound buffer into the socket and sends
//! keep-alive pings. Either side ending unregisters the connection, which in
//! turn stops the other side through [`Connection::closed`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use tunemate_core::{Accepted, Connection, CoreError, InboundFrame, MAX_MESSAGE_BYTES, ServerFrame};
use utoipa::OpenApi;

use crate::state::{AppState, Relay};

/// Socket frames larger than this are rejected by the transport itself.
/// Anything between [`MAX_MESSAGE_BYTES`] and this limit gets an error frame.
const MAX_FRAME_BYTES: usize = 4 * MAX_MESSAGE_BYTES;

#[derive(OpenApi)]
#[openapi(paths(chat_socket))]
pub struct ChatSocketApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/ws/chat/{sender_id}/{receiver_id}", get(chat_socket))
}

/// Open a chat connection as `sender_id` in the conversation with
/// `receiver_id`.
///
/// Clients send `{"message": "..."}` text frames. Every stored message is
/// pushed to all open connections of the pair as
/// `{"sender_id", "receiver_id", "message", "timestamp"}`.
#[utoipa::path(
    get,
    path = "/v1/ws/chat/{sender_id}/{receiver_id}",
    tag = "chat",
    params(
        ("sender_id" = String, Path, description = "Connecting user"),
        ("receiver_id" = String, Path, description = "Conversation peer"),
    ),
    responses(
        (status = 101, description = "Switching to the WebSocket protocol"),
        (status = 400, description = "Not a WebSocket upgrade request"),
    )
)]
pub async fn chat_socket(
    State(state): State<Arc<AppState>>,
    Path((sender_id, receiver_id)): Path<(String, String)>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.max_message_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| run_connection(state, socket, sender_id, receiver_id))
}

async fn run_connection(
    state: Arc<AppState>,
    mut socket: WebSocket,
    sender_id: String,
    receiver_id: String,
) {
    let relay = Arc::clone(&state.relay);

    // The first ping doubles as the handshake probe.
    let probe = socket.send(Message::Ping(Bytes::new()));
    let Accepted {
        connection,
        outbound,
    } = match relay.accept(&sender_id, &receiver_id, probe).await {
        Ok(accepted) => accepted,
        Err(e) => {
            debug!(sender_id = %sender_id, receiver_id = %receiver_id, error = %e, "dropping socket");
            return;
        }
    };

    let (sink, mut stream) = socket.split();
    tokio::spawn(write_loop(
        Arc::clone(&relay),
        Arc::clone(&connection),
        outbound,
        sink,
        state.config.ws_ping_interval,
    ));

    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    handle_text(&relay, &connection, text.as_str()).await;
                }
                Some(Ok(Message::Binary(_))) => {
                    relay.notify(&connection, "binary frames are not supported");
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(conn_id = connection.id(), error = %e, "socket read failed");
                    break;
                }
            },
            _ = connection.closed() => break,
        }
    }

    relay.handle_disconnect(&connection);
}

async fn handle_text(relay: &Relay, conn: &Connection, text: &str) {
    let body = match serde_json::from_str::<InboundFrame>(text) {
        Ok(frame) => frame.message,
        Err(e) => {
            relay.notify(conn, format!("invalid frame: {e}"));
            return;
        }
    };

    match relay.handle_inbound(conn, body).await {
        Ok(_) | Err(CoreError::ConnectionClosed(_)) => {}
        Err(CoreError::PersistFailed(_)) => {
            relay.notify(conn, "message could not be stored");
        }
        Err(e) => {
            relay.notify(conn, e.to_string());
        }
    }
}

async fn write_loop<S>(
    relay: Arc<Relay>,
    conn: Arc<Connection>,
    mut outbound: mpsc::Receiver<ServerFrame>,
    mut sink: S,
    ping_every: Duration,
) where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    // A peer that stops reading must not park this task inside `send`.
    let write_timeout = relay.config().delivery_timeout;
    let mut ping = tokio::time::interval(ping_every);
    // The first tick completes immediately; the handshake already pinged.
    ping.tick().await;

    loop {
        let outgoing = tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => match serde_json::to_string(&frame) {
                    Ok(text) => Message::Text(text.into()),
                    Err(e) => {
                        warn!(conn_id = conn.id(), error = %e, "failed to encode frame");
                        continue;
                    }
                },
                None => break,
            },
            _ = ping.tick() => Message::Ping(Bytes::new()),
            _ = conn.closed() => break,
        };

        let sent = tokio::select! {
            sent = tokio::time::timeout(write_timeout, sink.send(outgoing)) => sent,
            _ = conn.closed() => return,
        };
        match sent {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(conn_id = conn.id(), error = %e, "socket write failed");
                relay.handle_disconnect(&conn);
                return;
            }
            Err(_) => {
                warn!(conn_id = conn.id(), timeout = ?write_timeout, "socket write stalled; disconnecting");
                relay.handle_disconnect(&conn);
                return;
            }
        }
    }

    let _ = tokio::time::timeout(write_timeout, sink.send(Message::Close(None))).await;
}
