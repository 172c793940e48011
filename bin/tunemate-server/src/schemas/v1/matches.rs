use serde::{Deserialize, Serialize};
use tunemate_core::MatchCandidate;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MatchCandidateResponse {
    pub user_id: String,
    pub display_name: String,
    pub profile_image: Option<String>,
    /// Sum over shared artists of the smaller play count.
    pub similarity: u64,
    /// Shared artist ids in ascending order.
    pub shared_artists: Vec<String>,
    /// This user's own most-played artist ids, at most five.
    pub top_artists: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MatchesResponse {
    pub matches: Vec<MatchCandidateResponse>,
}

impl From<MatchCandidate> for MatchCandidateResponse {
    fn from(c: MatchCandidate) -> Self {
        Self {
            user_id: c.user_id,
            display_name: c.display_name,
            profile_image: c.profile_image,
            similarity: c.similarity,
            shared_artists: c.shared_artists.into_iter().collect(),
            top_artists: c.top_artists,
        }
    }
}
