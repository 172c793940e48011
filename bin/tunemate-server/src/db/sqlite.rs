//! SQLite implementation of the tunemate stores.
//!
//! Uses [`sqlx`] with the `sqlite` feature.  Migrations are run automatically
//! on startup via [`SqliteStore::connect`].
//!
//! # Migrations path
//!
//! `sqlx::migrate!("./migrations")` resolves the path **at compile time**
//! relative to `CARGO_MANIFEST_DIR` (the crate root), so the directory is
//! embedded into the binary.
//!
//! # Queries
//!
//! The `sqlx::query` (runtime-verified) form is used so that no
//! `DATABASE_URL` environment variable is needed at compile time.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tunemate_core::{
    ChatLog, ChatMessage, ConversationKey, ListeningEvent, NewChatMessage, Profile, ProfileStore,
    SessionStore, StoreError,
};

/// SQLite-backed session store, profile store and chat log.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g. `"sqlite://tunemate.db"`.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// A private in-memory database. A single pooled connection keeps the
    /// database alive for the lifetime of the store.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Close the pool; every later query fails.
    #[cfg(test)]
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// ── helpers ───────────────────────────────────────────────────────────────────

fn store_err(e: sqlx::Error) -> StoreError {
    StoreError::new(e)
}

/// Fixed-width so that lexical order equals chronological order.
fn to_db_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn from_db_time(raw: &str, column: &str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        tracing::warn!(raw = %raw, column, error = %e, "failed to parse stored timestamp; using now");
        Utc::now()
    })
}

type EventRow = (String, String, String, String, bool, String);
type MessageRow = (i64, String, String, String, String);

fn event_from_row((user_id, artist_id, artist_name, track_id, is_playing, observed_at): EventRow) -> ListeningEvent {
    ListeningEvent {
        user_id,
        artist_id,
        artist_name,
        track_id,
        is_playing,
        observed_at: from_db_time(&observed_at, "observed_at"),
    }
}

fn message_from_row((id, sender_id, receiver_id, body, created_at): MessageRow) -> ChatMessage {
    ChatMessage {
        id,
        sender_id,
        receiver_id,
        body,
        created_at: from_db_time(&created_at, "created_at"),
    }
}

// ── SessionStore ──────────────────────────────────────────────────────────────

impl SessionStore for SqliteStore {
    async fn append_event(&self, event: ListeningEvent) -> Result<(), StoreError> {
        let observed_at = to_db_time(&event.observed_at);
        sqlx::query(
            "INSERT INTO listening_events (user_id, artist_id, artist_name, track_id, is_playing, observed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&event.user_id)
        .bind(&event.artist_id)
        .bind(&event.artist_name)
        .bind(&event.track_id)
        .bind(event.is_playing)
        .bind(&observed_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn events_for_user(&self, user_id: &str) -> Result<Vec<ListeningEvent>, StoreError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT user_id, artist_id, artist_name, track_id, is_playing, observed_at \
             FROM listening_events WHERE user_id = ?1 ORDER BY id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(event_from_row).collect())
    }

    async fn events_excluding_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ListeningEvent>, StoreError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT user_id, artist_id, artist_name, track_id, is_playing, observed_at \
             FROM listening_events WHERE user_id <> ?1 ORDER BY id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(event_from_row).collect())
    }
}

// ── ProfileStore ──────────────────────────────────────────────────────────────

impl ProfileStore for SqliteStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        let row: Option<(String, String, Option<String>)> = sqlx::query_as(
            "SELECT user_id, display_name, profile_image FROM profiles WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(row.map(|(user_id, display_name, profile_image)| Profile {
            user_id,
            display_name,
            profile_image,
        }))
    }

    async fn upsert_profile(&self, profile: Profile) -> Result<(), StoreError> {
        let updated_at = to_db_time(&Utc::now());
        sqlx::query(
            "INSERT INTO profiles (user_id, display_name, profile_image, updated_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(user_id) DO UPDATE SET display_name = ?2, profile_image = ?3, updated_at = ?4",
        )
        .bind(&profile.user_id)
        .bind(&profile.display_name)
        .bind(&profile.profile_image)
        .bind(&updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }
}

// ── ChatLog ───────────────────────────────────────────────────────────────────

impl ChatLog for SqliteStore {
    async fn append(&self, msg: NewChatMessage) -> Result<ChatMessage, StoreError> {
        let key = msg.conversation_key();
        let created_at = to_db_time(&msg.created_at);
        let result = sqlx::query(
            "INSERT INTO chat_messages (conversation_key, sender_id, receiver_id, body, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(key.to_string())
        .bind(&msg.sender_id)
        .bind(&msg.receiver_id)
        .bind(&msg.body)
        .bind(&created_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(msg.into_stored(result.last_insert_rowid()))
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
        let (lo, hi) = key.participants();
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, sender_id, receiver_id, body, created_at \
             FROM chat_messages WHERE conversation_key = ?1 AND id < ?2 \
             AND ((sender_id = ?3 AND receiver_id = ?4) OR (sender_id = ?4 AND receiver_id = ?3)) \
             ORDER BY created_at DESC, id DESC LIMIT ?5",
        )
        .bind(key.to_string())
        .bind(before_id)
        .bind(lo)
        .bind(hi)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        // Newest-first from the query; callers want oldest-first.
        Ok(rows.into_iter().rev().map(message_from_row).collect())
    }

    async fn count(&self, key: &ConversationKey) -> Result<u64, StoreError> {
        let (lo, hi) = key.participants();
        let (n,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM chat_messages WHERE conversation_key = ?1 \
             AND ((sender_id = ?2 AND receiver_id = ?3) OR (sender_id = ?3 AND receiver_id = ?2))",
        )
        .bind(key.to_string())
        .bind(lo)
        .bind(hi)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(u64::try_from(n).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, SubsecRound};

    fn event(user: &str, artist: &str, is_playing: bool) -> ListeningEvent {
        ListeningEvent {
            user_id: user.into(),
            artist_id: artist.into(),
            artist_name: format!("{artist} name"),
            track_id: "t1".into(),
            is_playing,
            observed_at: Utc::now().trunc_subsecs(6),
        }
    }

    #[tokio::test]
    async fn listening_events_round_trip_in_insertion_order() {
        let store = SqliteStore::in_memory().await.unwrap();
        let first = event("x", "a", true);
        store.append_event(first.clone()).await.unwrap();
        store.append_event(event("y", "b", true)).await.unwrap();
        store.append_event(event("x", "c", false)).await.unwrap();

        let own = store.events_for_user("x").await.unwrap();
        assert_eq!(own.len(), 2);
        assert_eq!(own[0], first);
        assert!(!own[1].is_playing);

        let others = store.events_excluding_user("x").await.unwrap();
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].user_id, "y");
    }

    #[tokio::test]
    async fn profiles_upsert_and_lookup() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store.get_profile("x").await.unwrap().is_none());

        let mut profile = Profile {
            user_id: "x".into(),
            display_name: "Ex".into(),
            profile_image: None,
        };
        store.upsert_profile(profile.clone()).await.unwrap();
        profile.display_name = "Ex Two".into();
        profile.profile_image = Some("https://img.example/x.png".into());
        store.upsert_profile(profile.clone()).await.unwrap();

        assert_eq!(store.get_profile("x").await.unwrap(), Some(profile));
    }

    #[tokio::test]
    async fn chat_log_pages_by_conversation() {
        let store = SqliteStore::in_memory().await.unwrap();
        let start = Utc::now().trunc_subsecs(6);
        for i in 0..5 {
            let (sender, receiver) = if i % 2 == 0 { ("u1", "u2") } else { ("u2", "u1") };
            store
                .append(NewChatMessage {
                    sender_id: sender.into(),
                    receiver_id: receiver.into(),
                    body: format!("m{i}"),
                    created_at: start + Duration::microseconds(i),
                })
                .await
                .unwrap();
        }
        store
            .append(NewChatMessage {
                sender_id: "u1".into(),
                receiver_id: "u3".into(),
                body: "elsewhere".into(),
                created_at: start,
            })
            .await
            .unwrap();

        let key = ConversationKey::new("u2", "u1");
        let recent = store.recent(&key, 3).await.unwrap();
        let bodies: Vec<&str> = recent.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["m2", "m3", "m4"]);
        assert_eq!(recent[0].created_at, start + Duration::microseconds(2));

        let older = store.before(&key, recent[0].id, 10).await.unwrap();
        let bodies: Vec<&str> = older.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["m0", "m1"]);

        assert_eq!(store.count(&key).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn conversations_with_underscored_ids_stay_apart() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .append(NewChatMessage {
                sender_id: "a_b".into(),
                receiver_id: "c".into(),
                body: "for c only".into(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let other = ConversationKey::new("a", "b_c");
        assert!(store.recent(&other, 10).await.unwrap().is_empty());
        assert_eq!(store.count(&other).await.unwrap(), 0);
        assert_eq!(store.count(&ConversationKey::new("c", "a_b")).await.unwrap(), 1);
    }
}
