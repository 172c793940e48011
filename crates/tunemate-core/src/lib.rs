//! tunemate core: listening-affinity matching and the real-time chat relay.
//!
//! The crate is storage-agnostic. Durable state is reached through the
//! collaborator traits in [`store`]; [`memory`] provides in-process
//! implementations used by tests and embedders.

pub mod error;
pub mod matcher;
pub mod memory;
pub mod relay;
pub mod store;
pub mod types;

pub use error::CoreError;
pub use matcher::{AffinityMatcher, ArtistHistogram, MAX_MATCHES, TOP_ARTISTS};
pub use relay::{
    Accepted, ChatRelay, Connection, ConnectionId, ConnectionRegistry, ConnectionState,
    HISTORY_LIMIT, InboundFrame, MAX_MESSAGE_BYTES, OutboundMessage, RelayConfig, ServerFrame,
};
pub use store::{ChatLog, ProfileStore, SessionStore, StoreError};
pub use types::{ChatMessage, ConversationKey, ListeningEvent, MatchCandidate, NewChatMessage, Profile};
