//! In-process store implementations.
//!
//! Each store keeps its records behind a `tokio::sync::RwLock` and can be
//! switched into a failing mode to simulate an unreachable backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use crate::store::{ChatLog, ProfileStore, SessionStore, StoreError};
use crate::types::{ChatMessage, ConversationKey, ListeningEvent, NewChatMessage, Profile};

fn check(failing: &AtomicBool, store: &str) -> Result<(), StoreError> {
    if failing.load(Ordering::Acquire) {
        Err(StoreError::new(format!("{store} is unreachable")))
    } else {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    events: RwLock<Vec<ListeningEvent>>,
    failing: AtomicBool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }
}

impl SessionStore for MemorySessionStore {
    async fn append_event(&self, event: ListeningEvent) -> Result<(), StoreError> {
        check(&self.failing, "session store")?;
        self.events.write().await.push(event);
        Ok(())
    }

    async fn events_for_user(&self, user_id: &str) -> Result<Vec<ListeningEvent>, StoreError> {
        check(&self.failing, "session store")?;
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn events_excluding_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ListeningEvent>, StoreError> {
        check(&self.failing, "session store")?;
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.user_id != user_id)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<String, Profile>>,
    failing: AtomicBool,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }
}

impl ProfileStore for MemoryProfileStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        check(&self.failing, "profile store")?;
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn upsert_profile(&self, profile: Profile) -> Result<(), StoreError> {
        check(&self.failing, "profile store")?;
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
        Ok(())
    }
}

/// Chat log held in a single vector; ids are 1-based insertion positions.
#[derive(Debug, Default)]
pub struct MemoryChatLog {
    messages: RwLock<Vec<ChatMessage>>,
    failing: AtomicBool,
}

impl MemoryChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

impl ChatLog for MemoryChatLog {
    async fn append(&self, msg: NewChatMessage) -> Result<ChatMessage, StoreError> {
        check(&self.failing, "chat log")?;
        let mut messages = self.messages.write().await;
        let stored = msg.into_stored(messages.len() as i64 + 1);
        messages.push(stored.clone());
        Ok(stored)
    }

    async fn recent(
        &self,
        key: &ConversationKey,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        self.before(key, i64::MAX, limit).await
    }

    async fn before(
        &self,
        key: &ConversationKey,
        before_id: i64,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        check(&self.failing, "chat log")?;
        let messages = self.messages.read().await;
        let mut page: Vec<ChatMessage> = messages
            .iter()
            .rev()
            .filter(|m| m.id < before_id && &m.conversation_key() == key)
            .take(limit)
            .cloned()
            .collect();
        page.reverse();
        Ok(page)
    }

    async fn count(&self, key: &ConversationKey) -> Result<u64, StoreError> {
        check(&self.failing, "chat log")?;
        Ok(self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| &m.conversation_key() == key)
            .count() as u64)
    }
}
