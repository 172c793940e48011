use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tunemate_core::ListeningEvent;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct ListeningEventRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub artist_id: String,
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub track_id: String,
    pub is_playing: bool,
    /// Defaults to the time of receipt.
    pub observed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IngestResponse {
    /// `false` when the sample was not a playing sample and was dropped.
    pub stored: bool,
}

impl ListeningEventRequest {
    pub fn into_event(self) -> ListeningEvent {
        ListeningEvent {
            user_id: self.user_id,
            artist_id: self.artist_id,
            artist_name: self.artist_name,
            track_id: self.track_id,
            is_playing: self.is_playing,
            observed_at: self.observed_at.unwrap_or_else(Utc::now),
        }
    }
}
