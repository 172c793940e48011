use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// One sample reported by the listening-event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListeningEvent {
    pub user_id: String,
    pub artist_id: String,
    pub artist_name: String,
    pub track_id: String,
    pub is_playing: bool,
    pub observed_at: DateTime<Utc>,
}

/// Display metadata held by the profile store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub display_name: String,
    pub profile_image: Option<String>,
}

/// A ranked user with overlapping listening history. Recomputed per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub user_id: String,
    pub display_name: String,
    pub profile_image: Option<String>,
    pub similarity: u64,
    pub shared_artists: BTreeSet<String>,
    /// Artist ids ordered by this user's own play count, at most five.
    pub top_artists: Vec<String>,
}

/// A chat message before the chat log has assigned it an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChatMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl NewChatMessage {
    pub fn conversation_key(&self) -> ConversationKey {
        ConversationKey::new(&self.sender_id, &self.receiver_id)
    }

    /// Attach the store-assigned id.
    pub fn into_stored(self, id: i64) -> ChatMessage {
        ChatMessage {
            id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            body: self.body,
            created_at: self.created_at,
        }
    }
}

/// A persisted chat message. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn conversation_key(&self) -> ConversationKey {
        ConversationKey::new(&self.sender_id, &self.receiver_id)
    }
}

/// Canonical identifier of a two-party conversation.
///
/// The two user ids are sorted, so `new(a, b) == new(b, a)`. Equality and
/// hashing use the pair itself. The `lo_hi` text form is for display and
/// indexing only: it is not unique when ids contain `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationKey {
    lo: String,
    hi: String,
}

impl ConversationKey {
    pub fn new(user_a: &str, user_b: &str) -> Self {
        let (lo, hi) = if user_a <= user_b {
            (user_a, user_b)
        } else {
            (user_b, user_a)
        };
        Self {
            lo: lo.to_owned(),
            hi: hi.to_owned(),
        }
    }

    /// The two participants, lower id first.
    pub fn participants(&self) -> (&str, &str) {
        (&self.lo, &self.hi)
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.lo, self.hi)
    }
}

impl Serialize for ConversationKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn conversation_key_sorts_participants() {
        assert_eq!(ConversationKey::new("u2", "u1").to_string(), "u1_u2");
        assert_eq!(ConversationKey::new("u1", "u2").participants(), ("u1", "u2"));
    }

    #[test]
    fn underscored_ids_do_not_collide() {
        let left = ConversationKey::new("a_b", "c");
        let right = ConversationKey::new("a", "b_c");
        assert_eq!(left.to_string(), right.to_string());
        assert_ne!(left, right);
    }

    #[test]
    fn message_key_ignores_direction() {
        let now = Utc::now();
        let outgoing = NewChatMessage {
            sender_id: "alice".into(),
            receiver_id: "bob".into(),
            body: "hey".into(),
            created_at: now,
        };
        let reply = NewChatMessage {
            sender_id: "bob".into(),
            receiver_id: "alice".into(),
            body: "hi".into(),
            created_at: now,
        };
        assert_eq!(outgoing.conversation_key(), reply.conversation_key());
        assert_eq!(outgoing.into_stored(7).conversation_key(), reply.conversation_key());
    }

    proptest! {
        #[test]
        fn conversation_key_is_symmetric(a in "[a-z0-9]{1,12}", b in "[a-z0-9]{1,12}") {
            prop_assert_eq!(ConversationKey::new(&a, &b), ConversationKey::new(&b, &a));
        }
    }
}
