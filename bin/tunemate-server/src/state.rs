//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use tunemate_core::{AffinityMatcher, ChatRelay, ConnectionRegistry};

use crate::config::Config;
use crate::db::sqlite::SqliteStore;

/// Relay over the SQLite chat log.
pub type Relay = ChatRelay<SqliteStore>;

/// Matcher reading sessions and profiles from SQLite.
pub type Matcher = AffinityMatcher<SqliteStore, SqliteStore>;

/// State shared across all HTTP and WebSocket handlers.
#[derive(Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Session store, profile store and chat log.
    pub store: Arc<SqliteStore>,
    /// Live chat connections and message fan-out.
    pub relay: Arc<Relay>,
    pub matcher: Matcher,
}

impl AppState {
    /// Wire the relay and the matcher onto one store.
    pub fn new(config: Config, store: SqliteStore) -> Self {
        let store = Arc::new(store);
        let relay = ChatRelay::new(
            Arc::new(ConnectionRegistry::new()),
            Arc::clone(&store),
            config.relay(),
        );
        let matcher = AffinityMatcher::new(Arc::clone(&store), Arc::clone(&store));
        Self {
            config: Arc::new(config),
            store,
            relay: Arc::new(relay),
            matcher,
        }
    }
}
