use std::sync::Arc;

use chrono::Utc;
use proptest::prelude::*;

use super::*;
use crate::memory::{MemoryProfileStore, MemorySessionStore};
use crate::store::{ProfileStore, SessionStore};
use crate::types::{ListeningEvent, Profile};

fn event(user: &str, artist: &str) -> ListeningEvent {
    ListeningEvent {
        user_id: user.to_owned(),
        artist_id: artist.to_owned(),
        artist_name: format!("{artist} name"),
        track_id: format!("{artist}-track"),
        is_playing: true,
        observed_at: Utc::now(),
    }
}

fn histogram(plays: &[(&str, u64)]) -> ArtistHistogram {
    let mut hist = ArtistHistogram::new();
    for (artist, n) in plays {
        for _ in 0..*n {
            hist.record(artist);
        }
    }
    hist
}

struct Fixture {
    sessions: Arc<MemorySessionStore>,
    profiles: Arc<MemoryProfileStore>,
    matcher: AffinityMatcher<MemorySessionStore, MemoryProfileStore>,
}

impl Fixture {
    fn new() -> Self {
        let sessions = Arc::new(MemorySessionStore::new());
        let profiles = Arc::new(MemoryProfileStore::new());
        let matcher = AffinityMatcher::new(Arc::clone(&sessions), Arc::clone(&profiles));
        Self {
            sessions,
            profiles,
            matcher,
        }
    }

    async fn plays(&self, user: &str, artist: &str, n: usize) {
        for _ in 0..n {
            self.sessions.append_event(event(user, artist)).await.unwrap();
        }
    }

    async fn profile(&self, user: &str) {
        self.profiles
            .upsert_profile(Profile {
                user_id: user.to_owned(),
                display_name: user.to_uppercase(),
                profile_image: Some(format!("https://img.example/{user}.png")),
            })
            .await
            .unwrap();
    }
}

// ── Histogram tests ───────────────────────────────────────────────────────────

#[test]
fn similarity_sums_minimum_of_shared_counts() {
    let x = histogram(&[("artistA", 3), ("artistB", 1)]);
    let y = histogram(&[("artistA", 2), ("artistC", 5)]);

    let overlap = x.overlap(&y).expect("artistA is shared");
    assert_eq!(overlap.similarity, 2);
    assert_eq!(overlap.shared.into_iter().collect::<Vec<_>>(), vec!["artistA"]);
}

#[test]
fn disjoint_histograms_have_no_overlap() {
    let x = histogram(&[("a", 4)]);
    let y = histogram(&[("b", 4)]);
    assert!(x.overlap(&y).is_none());
    assert_eq!(similarity(&x, &y), 0);
}

#[test]
fn top_artists_are_capped_and_ties_keep_first_seen_order() {
    let hist = histogram(&[("a", 1), ("b", 3), ("c", 1), ("d", 2), ("e", 1), ("f", 1)]);
    assert_eq!(hist.top_artists(TOP_ARTISTS), vec!["b", "d", "a", "c", "e"]);
}

#[test]
fn histogram_counts_every_event_regardless_of_playing_flag() {
    let mut paused = event("u", "a");
    paused.is_playing = false;
    let events = vec![event("u", "a"), paused];
    assert_eq!(ArtistHistogram::from_events(&events).count("a"), 2);
}

#[test]
fn grouping_preserves_first_appearance_order() {
    let events = vec![event("y", "a"), event("x", "a"), event("y", "b")];
    let groups = group_by_user(&events);
    let users: Vec<&str> = groups.iter().map(|(u, _)| u.as_str()).collect();
    assert_eq!(users, vec!["y", "x"]);
    assert_eq!(groups[0].1.len(), 2);
}

// ── Matcher tests ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_single_shared_artist() {
    let fx = Fixture::new();
    fx.plays("x", "artistA", 3).await;
    fx.plays("x", "artistB", 1).await;
    fx.plays("y", "artistA", 2).await;
    fx.plays("y", "artistC", 5).await;
    fx.profile("y").await;

    let matches = fx.matcher.compute_matches("x").await.unwrap();
    assert_eq!(matches.len(), 1);
    let y = &matches[0];
    assert_eq!(y.user_id, "y");
    assert_eq!(y.display_name, "Y");
    assert_eq!(y.similarity, 2);
    assert_eq!(y.shared_artists.iter().collect::<Vec<_>>(), vec!["artistA"]);
    assert_eq!(y.top_artists, vec!["artistC", "artistA"]);
}

#[tokio::test]
async fn requester_without_history_gets_empty_list() {
    let fx = Fixture::new();
    fx.plays("y", "artistA", 2).await;
    fx.profile("y").await;

    let matches = fx.matcher.compute_matches("nobody").await.unwrap();
    assert!(matches.is_empty());
}

#[tokio::test]
async fn requester_never_matches_itself() {
    let fx = Fixture::new();
    fx.plays("x", "a", 2).await;
    fx.plays("y", "a", 1).await;
    fx.profile("x").await;
    fx.profile("y").await;

    let matches = fx.matcher.compute_matches("x").await.unwrap();
    assert!(matches.iter().all(|m| m.user_id != "x"));
    assert_eq!(matches.len(), 1);
}

#[tokio::test]
async fn users_without_overlap_or_profile_are_excluded() {
    let fx = Fixture::new();
    fx.plays("x", "a", 2).await;
    fx.plays("disjoint", "b", 9).await;
    fx.plays("ghost", "a", 9).await;
    fx.plays("friend", "a", 1).await;
    fx.profile("disjoint").await;
    fx.profile("friend").await;

    let matches = fx.matcher.compute_matches("x").await.unwrap();
    let ids: Vec<&str> = matches.iter().map(|m| m.user_id.as_str()).collect();
    assert_eq!(ids, vec!["friend"]);
}

#[tokio::test]
async fn results_are_capped_and_sorted_with_stable_ties() {
    let fx = Fixture::new();
    fx.plays("me", "a", 5).await;
    fx.plays("me", "b", 5).await;
    // Twelve candidates; the first two tie at the top score.
    for i in 0..12 {
        let user = format!("user{i:02}");
        let plays = match i {
            0 | 1 => 4,
            _ => 1 + (i % 3),
        };
        fx.plays(&user, "a", plays).await;
        fx.profile(&user).await;
    }

    let matches = fx.matcher.compute_matches("me").await.unwrap();
    assert_eq!(matches.len(), MAX_MATCHES);
    assert!(matches.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    assert_eq!(matches[0].user_id, "user00");
    assert_eq!(matches[1].user_id, "user01");
}

#[tokio::test]
async fn unprofiled_candidates_do_not_consume_result_slots() {
    let fx = Fixture::new();
    fx.plays("me", "a", 3).await;
    for i in 0..11 {
        let user = format!("user{i:02}");
        fx.plays(&user, "a", 1).await;
        if i != 0 {
            fx.profile(&user).await;
        }
    }

    let matches = fx.matcher.compute_matches("me").await.unwrap();
    assert_eq!(matches.len(), MAX_MATCHES);
    assert!(matches.iter().all(|m| m.user_id != "user00"));
}

#[tokio::test]
async fn unreadable_session_store_is_data_unavailable() {
    let fx = Fixture::new();
    fx.plays("x", "a", 1).await;
    fx.sessions.set_failing(true);

    let err = fx.matcher.compute_matches("x").await.unwrap_err();
    assert!(matches!(err, CoreError::DataUnavailable(_)), "got {err:?}");
}

#[tokio::test]
async fn unreachable_profile_store_is_data_unavailable() {
    let fx = Fixture::new();
    fx.plays("x", "a", 1).await;
    fx.plays("y", "a", 1).await;
    fx.profiles.set_failing(true);

    let err = fx.matcher.compute_matches("x").await.unwrap_err();
    assert!(matches!(err, CoreError::DataUnavailable(_)), "got {err:?}");
}

// ── Properties ────────────────────────────────────────────────────────────────

fn plays_strategy() -> impl Strategy<Value = Vec<(String, u64)>> {
    proptest::collection::vec(("[a-f]", 1u64..5), 0..8)
}

fn build(plays: &[(String, u64)]) -> ArtistHistogram {
    let borrowed: Vec<(&str, u64)> = plays.iter().map(|(a, n)| (a.as_str(), *n)).collect();
    histogram(&borrowed)
}

proptest! {
    #[test]
    fn similarity_is_symmetric(a in plays_strategy(), b in plays_strategy()) {
        let (ha, hb) = (build(&a), build(&b));
        prop_assert_eq!(similarity(&ha, &hb), similarity(&hb, &ha));
    }

    #[test]
    fn similarity_is_zero_for_disjoint_artists(
        a in proptest::collection::vec(("[a-c]", 1u64..5), 0..6),
        b in proptest::collection::vec(("[x-z]", 1u64..5), 0..6),
    ) {
        prop_assert_eq!(similarity(&build(&a), &build(&b)), 0);
    }

    #[test]
    fn similarity_never_exceeds_either_total(a in plays_strategy(), b in plays_strategy()) {
        let (ha, hb) = (build(&a), build(&b));
        let total = |h: &ArtistHistogram| h.artists().map(|x| h.count(x)).sum::<u64>();
        let s = similarity(&ha, &hb);
        prop_assert!(s <= total(&ha) && s <= total(&hb));
    }
}

/// Per-user play lists over a small artist pool, so overlaps are common.
fn population_strategy() -> impl Strategy<Value = Vec<Vec<(String, usize)>>> {
    proptest::collection::vec(
        proptest::collection::vec(("[a-h]", 1usize..4), 0..6),
        1..16,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ranked_matches_stay_bounded_and_ordered(population in population_strategy()) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let matches = rt.block_on(async {
            let fx = Fixture::new();
            for (i, plays) in population.iter().enumerate() {
                let user = format!("u{i}");
                fx.profile(&user).await;
                for (artist, n) in plays {
                    fx.plays(&user, artist, *n).await;
                }
            }
            fx.matcher.compute_matches("u0").await.unwrap()
        });

        prop_assert!(matches.len() <= MAX_MATCHES);
        prop_assert!(matches.iter().all(|m| m.user_id != "u0"));
        prop_assert!(matches.iter().all(|m| m.similarity > 0 && !m.shared_artists.is_empty()));
        prop_assert!(matches.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }
}
