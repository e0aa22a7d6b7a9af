//! Sparsity filter over the triplet table.
//!
//! One track cut followed by one playlist cut, in that order. This is not a
//! fixed point: a track can drop below `min_sc` after the playlist cut and it
//! stays. The id maps are built from exactly this output.

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::{PlaylistId, Triplet};

/// Filtered table plus the final per-entity counts.
#[derive(Debug)]
pub struct FilterOutcome {
    pub triplets: Vec<Triplet>,
    /// Rows per surviving playlist, ascending by playlist id.
    pub playlist_counts: BTreeMap<PlaylistId, usize>,
    /// Rows per surviving track.
    pub track_counts: FxHashMap<Arc<str>, usize>,
}

impl FilterOutcome {
    /// |triplets| / (|playlists| × |tracks|), as a percentage.
    pub fn sparsity_pct(&self) -> f64 {
        let cells = self.playlist_counts.len() as f64 * self.track_counts.len() as f64;
        if cells == 0.0 {
            0.0
        } else {
            100.0 * self.triplets.len() as f64 / cells
        }
    }

    /// Surviving playlist ids in ascending order.
    pub fn playlist_ids(&self) -> Vec<PlaylistId> {
        self.playlist_counts.keys().copied().collect()
    }
}

pub fn track_counts(triplets: &[Triplet]) -> FxHashMap<Arc<str>, usize> {
    let mut counts: FxHashMap<Arc<str>, usize> = FxHashMap::default();
    for t in triplets {
        *counts.entry(Arc::clone(&t.track)).or_default() += 1;
    }
    counts
}

pub fn playlist_counts(triplets: &[Triplet]) -> BTreeMap<PlaylistId, usize> {
    let mut counts = BTreeMap::new();
    for t in triplets {
        *counts.entry(t.playlist).or_default() += 1;
    }
    counts
}

/// Drop rows of tracks seen fewer than `min_sc` times, then rows of playlists
/// with fewer than `min_uc` remaining rows. A threshold of 0 skips its cut.
/// Survivors keep their input order.
pub fn filter_triplets(mut triplets: Vec<Triplet>, min_uc: usize, min_sc: usize) -> FilterOutcome {
    if min_sc > 0 {
        let counts = track_counts(&triplets);
        triplets.retain(|t| counts[&t.track] >= min_sc);
    }

    if min_uc > 0 {
        let counts = playlist_counts(&triplets);
        triplets.retain(|t| counts[&t.playlist] >= min_uc);
    }

    FilterOutcome {
        playlist_counts: playlist_counts(&triplets),
        track_counts: track_counts(&triplets),
        triplets,
    }
}
