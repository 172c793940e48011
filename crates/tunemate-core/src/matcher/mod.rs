//! Affinity matcher: ranks other users by shared listening history.

mod histogram;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tracing::debug;

use crate::error::CoreError;
use crate::store::{ProfileStore, SessionStore};
use crate::types::MatchCandidate;

pub use histogram::{ArtistHistogram, Overlap, group_by_user, similarity};

/// Upper bound on the number of candidates returned per request.
pub const MAX_MATCHES: usize = 10;

/// Length cap of [`MatchCandidate::top_artists`].
pub const TOP_ARTISTS: usize = 5;

/// Stateless matcher over a session store and a profile store.
///
/// Every call reads fresh data and builds its own histograms, so one
/// instance can serve any number of concurrent callers.
#[derive(Debug)]
pub struct AffinityMatcher<S, P> {
    sessions: Arc<S>,
    profiles: Arc<P>,
}

impl<S, P> Clone for AffinityMatcher<S, P> {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            profiles: Arc::clone(&self.profiles),
        }
    }
}

impl<S: SessionStore, P: ProfileStore> AffinityMatcher<S, P> {
    pub fn new(sessions: Arc<S>, profiles: Arc<P>) -> Self {
        Self { sessions, profiles }
    }

    /// Up to [`MAX_MATCHES`] users sharing at least one artist with
    /// `user_id`, highest similarity first.
    ///
    /// A user without history gets an empty list. Users without a profile
    /// record are skipped.
    pub async fn compute_matches(&self, user_id: &str) -> Result<Vec<MatchCandidate>, CoreError> {
        let own_events = self
            .sessions
            .events_for_user(user_id)
            .await
            .map_err(|e| CoreError::DataUnavailable(e.to_string()))?;
        let own = ArtistHistogram::from_events(&own_events);
        if own.is_empty() {
            debug!(user_id, "no listening history; nothing to match");
            return Ok(Vec::new());
        }

        let others = self
            .sessions
            .events_excluding_user(user_id)
            .await
            .map_err(|e| CoreError::DataUnavailable(e.to_string()))?;

        let mut scored: Vec<(String, Overlap, ArtistHistogram)> = group_by_user(&others)
            .into_iter()
            .filter(|(other_id, _)| other_id != user_id)
            .filter_map(|(other_id, hist)| {
                own.overlap(&hist).map(|overlap| (other_id, overlap, hist))
            })
            .collect();
        // Stable: equal scores keep first-appearance order.
        scored.sort_by(|a, b| b.1.similarity.cmp(&a.1.similarity));

        let mut matches = Vec::with_capacity(MAX_MATCHES.min(scored.len()));
        for (other_id, overlap, hist) in scored {
            if matches.len() == MAX_MATCHES {
                break;
            }
            let profile = self
                .profiles
                .get_profile(&other_id)
                .await
                .map_err(|e| CoreError::DataUnavailable(e.to_string()))?;
            let Some(profile) = profile else {
                debug!(user_id = %other_id, "candidate has no profile; skipped");
                continue;
            };
            matches.push(MatchCandidate {
                user_id: other_id,
                display_name: profile.display_name,
                profile_image: profile.profile_image,
                similarity: overlap.similarity,
                shared_artists: overlap.shared,
                top_artists: hist.top_artists(TOP_ARTISTS),
            });
        }

        debug!(user_id, matches = matches.len(), "matches computed");
        Ok(matches)
    }
}
