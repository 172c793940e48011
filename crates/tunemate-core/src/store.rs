//! Collaborator interfaces for durable state.
//!
//! The matcher and relay receive implementations of these traits at
//! construction. The server crate backs all three with SQLite; tests use the
//! in-memory versions in [`crate::memory`].
//!
//! All trait methods use `impl Future` in their signatures so that no extra
//! `async-trait` crate is required.

use std::fmt;
use std::future::Future;

use thiserror::Error;

use crate::types::{ChatMessage, ConversationKey, ListeningEvent, NewChatMessage, Profile};

/// Opaque failure reported by a backing store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Durable log of listening events.
pub trait SessionStore: Send + Sync + 'static {
    fn append_event(
        &self,
        event: ListeningEvent,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Every stored event of `user_id`, in insertion order.
    fn events_for_user(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<ListeningEvent>, StoreError>> + Send;

    /// Every stored event of every user except `user_id`, in insertion order.
    fn events_excluding_user(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<ListeningEvent>, StoreError>> + Send;
}

/// Keyed display metadata. A missing record is `Ok(None)`, not an error.
pub trait ProfileStore: Send + Sync + 'static {
    fn get_profile(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<Profile>, StoreError>> + Send;

    fn upsert_profile(
        &self,
        profile: Profile,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Append-only store of chat messages, queryable by conversation.
pub trait ChatLog: Send + Sync + 'static {
    /// Persist one message and return it with its assigned id.
    fn append(
        &self,
        msg: NewChatMessage,
    ) -> impl Future<Output = Result<ChatMessage, StoreError>> + Send;

    /// The `limit` most recent messages of `key`, oldest first.
    fn recent(
        &self,
        key: &ConversationKey,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, StoreError>> + Send;

    /// The `limit` most recent messages of `key` with an id below
    /// `before_id`, oldest first.
    fn before(
        &self,
        key: &ConversationKey,
        before_id: i64,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, StoreError>> + Send;

    /// Number of stored messages in `key`.
    fn count(&self, key: &ConversationKey) -> impl Future<Output = Result<u64, StoreError>> + Send;
}
