use std::collections::{BTreeSet, HashMap};

use crate::types::ListeningEvent;

/// Per-user play counts keyed by artist id.
///
/// Artists are remembered in first-seen order so that stable sorts over the
/// histogram have a well-defined tie order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtistHistogram {
    counts: HashMap<String, u64>,
    order: Vec<String>,
}

/// Result of intersecting two histograms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlap {
    pub similarity: u64,
    pub shared: BTreeSet<String>,
}

impl ArtistHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event counts, whatever its `is_playing` flag.
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a ListeningEvent>) -> Self {
        let mut hist = Self::new();
        for event in events {
            hist.record(&event.artist_id);
        }
        hist
    }

    pub fn record(&mut self, artist_id: &str) {
        match self.counts.get_mut(artist_id) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(artist_id.to_owned(), 1);
                self.order.push(artist_id.to_owned());
            }
        }
    }

    pub fn count(&self, artist_id: &str) -> u64 {
        self.counts.get(artist_id).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Artist ids in first-seen order.
    pub fn artists(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Shared artists and the sum of per-artist minimum counts, or `None`
    /// when the key sets are disjoint.
    pub fn overlap(&self, other: &ArtistHistogram) -> Option<Overlap> {
        let mut similarity = 0;
        let mut shared = BTreeSet::new();
        for artist in self.artists() {
            let theirs = other.count(artist);
            if theirs > 0 {
                similarity += self.count(artist).min(theirs);
                shared.insert(artist.to_owned());
            }
        }
        if shared.is_empty() {
            None
        } else {
            Some(Overlap { similarity, shared })
        }
    }

    /// The `n` most-played artists, ties in first-seen order.
    pub fn top_artists(&self, n: usize) -> Vec<String> {
        let mut ranked: Vec<&String> = self.order.iter().collect();
        ranked.sort_by(|a, b| self.count(b).cmp(&self.count(a)));
        ranked.into_iter().take(n).cloned().collect()
    }
}

/// Overlap-coefficient similarity; zero for disjoint histograms.
pub fn similarity(a: &ArtistHistogram, b: &ArtistHistogram) -> u64 {
    a.overlap(b).map_or(0, |o| o.similarity)
}

/// Group events by user, keeping users in order of first appearance.
pub fn group_by_user(events: &[ListeningEvent]) -> Vec<(String, ArtistHistogram)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(String, ArtistHistogram)> = Vec::new();
    for event in events {
        let slot = *index.entry(event.user_id.as_str()).or_insert_with(|| {
            groups.push((event.user_id.clone(), ArtistHistogram::new()));
            groups.len() - 1
        });
        groups[slot].1.record(&event.artist_id);
    }
    groups
}
