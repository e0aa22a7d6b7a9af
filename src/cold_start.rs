//! Popularity fallbacks for cold-start challenge playlists.
//!
//! Two aggregators share one scan loop:
//! - `TitleAggregator`: playlists with a title and no known track. Every MPD
//!   playlist with the same normalized title votes +1 for each of its tracks.
//! - `TitleTrackAggregator`: playlists with a title and one known track. An
//!   MPD playlist scores 1 for a matching title plus 1 if it contains the seed
//!   track, and adds that score to each of its other tracks.
//!
//! Ranking is by descending score; ties keep the order in which candidates
//! were first encountered during the scan (slices in file order, tracks in
//! playlist order).

use anyhow::Result;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::corpus::for_each_slice;
use crate::models::{PlaylistId, Slice, SlicePlaylist};
use crate::normalize::normalize_optional_name;
use crate::progress::PlaylistCounter;
use crate::remap::IdMap;
use crate::settings::PROGRESS_INTERVAL;

// ============================================================================
// Candidate tables
// ============================================================================

/// Accumulated scores for one key, in first-encounter order.
#[derive(Clone, Debug, Default)]
pub struct Candidates {
    scores: Vec<(String, u64)>,
    index: FxHashMap<String, usize>,
}

impl Candidates {
    pub fn add(&mut self, track: &str, amount: u64) {
        match self.index.get(track) {
            Some(&i) => self.scores[i].1 += amount,
            None => {
                self.index.insert(track.to_string(), self.scores.len());
                self.scores.push((track.to_string(), amount));
            }
        }
    }

    pub fn score(&self, track: &str) -> Option<u64> {
        self.index.get(track).map(|&i| self.scores[i].1)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Up to `n` tracks by descending score. The sort is stable, so equal
    /// scores keep first-encounter order.
    pub fn top(&self, n: usize) -> Vec<String> {
        let mut order: Vec<usize> = (0..self.scores.len()).collect();
        order.sort_by(|&a, &b| self.scores[b].1.cmp(&self.scores[a].1));
        order
            .into_iter()
            .take(n)
            .map(|i| self.scores[i].0.clone())
            .collect()
    }
}

/// Rank one key's candidates, warning when fewer than `n` are available.
pub fn rank(key: &str, candidates: Option<&Candidates>, n: usize) -> Vec<String> {
    let ranked = candidates.map(|c| c.top(n)).unwrap_or_default();
    if ranked.len() < n {
        log::warn!(
            "Not enough items to recommend for '{}': {} of {}",
            key,
            ranked.len(),
            n
        );
    }
    ranked
}

/// Ranked output rows: key followed by its tracks.
pub type RankedRows = Vec<(String, Vec<String>)>;

// ============================================================================
// Corpus scan
// ============================================================================

/// Receives every MPD playlist of a scan, in corpus order.
pub trait PlaylistObserver {
    fn observe(&mut self, playlist: &SlicePlaylist);
}

/// Feed every playlist of `files` to `observer`.
pub fn scan_corpus(files: &[PathBuf], phase: &'static str, observer: &mut dyn PlaylistObserver) -> Result<u64> {
    let mut counter = PlaylistCounter::new(phase, PROGRESS_INTERVAL);
    for_each_slice(files, phase, |_, slice| {
        for playlist in &slice.playlists {
            observer.observe(playlist);
            counter.tick();
        }
        Ok(())
    })?;
    Ok(counter.seen())
}

// ============================================================================
// Title only
// ============================================================================

/// Normalized titles of challenge playlists with no known track.
pub fn cold_titles(challenge: &Slice) -> BTreeSet<String> {
    challenge
        .playlists
        .iter()
        .filter(|p| p.num_samples == Some(0))
        .map(|p| normalize_optional_name(p.name.as_deref()))
        .collect()
}

pub struct TitleAggregator {
    titles: BTreeSet<String>,
    tables: FxHashMap<String, Candidates>,
}

impl TitleAggregator {
    pub fn new(titles: BTreeSet<String>) -> Self {
        Self {
            titles,
            tables: FxHashMap::default(),
        }
    }

    pub fn candidates(&self, title: &str) -> Option<&Candidates> {
        self.tables.get(title)
    }

    /// One row per cold title, in title order.
    pub fn recommendations(&self, n: usize) -> RankedRows {
        self.titles
            .iter()
            .map(|title| (title.clone(), rank(title, self.tables.get(title), n)))
            .collect()
    }
}

impl PlaylistObserver for TitleAggregator {
    fn observe(&mut self, playlist: &SlicePlaylist) {
        let name = normalize_optional_name(playlist.name.as_deref());
        if !self.titles.contains(&name) {
            return;
        }
        let table = self.tables.entry(name).or_default();
        for uri in playlist.track_uris() {
            table.add(uri, 1);
        }
    }
}

// ============================================================================
// Title plus one track
// ============================================================================

/// Challenge playlist with a title and exactly one known track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Seed {
    pub pid: PlaylistId,
    pub track: String,
    pub title: String,
}

/// Seeds in challenge order.
pub fn one_track_seeds(challenge: &Slice) -> Vec<Seed> {
    challenge
        .playlists
        .iter()
        .filter(|p| p.num_samples == Some(1))
        .filter_map(|p| {
            let Some(track) = p.tracks.first() else {
                log::warn!("Challenge playlist {} has num_samples 1 but no tracks, skipping", p.pid);
                return None;
            };
            Some(Seed {
                pid: p.pid,
                track: track.track_uri.clone(),
                title: normalize_optional_name(p.name.as_deref()),
            })
        })
        .collect()
}

pub struct TitleTrackAggregator {
    seeds: Vec<Seed>,
    by_title: FxHashMap<String, Vec<usize>>,
    by_track: FxHashMap<String, Vec<usize>>,
    tables: Vec<Candidates>,
}

impl TitleTrackAggregator {
    pub fn new(seeds: Vec<Seed>) -> Self {
        let mut by_title: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        let mut by_track: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for (i, seed) in seeds.iter().enumerate() {
            by_title.entry(seed.title.clone()).or_default().push(i);
            by_track.entry(seed.track.clone()).or_default().push(i);
        }
        let tables = vec![Candidates::default(); seeds.len()];
        Self {
            seeds,
            by_title,
            by_track,
            tables,
        }
    }

    pub fn candidates(&self, seed: usize) -> Option<&Candidates> {
        self.tables.get(seed)
    }

    /// Match score of `playlist` for every seed it matches (1 or 2).
    fn scores(&self, playlist: &SlicePlaylist) -> BTreeMap<usize, u64> {
        let mut scores: BTreeMap<usize, u64> = BTreeMap::new();
        let name = normalize_optional_name(playlist.name.as_deref());
        if let Some(seeds) = self.by_title.get(&name) {
            for &i in seeds {
                *scores.entry(i).or_default() += 1;
            }
        }
        let distinct: FxHashSet<&str> = playlist.track_uris().collect();
        for uri in distinct {
            if let Some(seeds) = self.by_track.get(uri) {
                for &i in seeds {
                    *scores.entry(i).or_default() += 1;
                }
            }
        }
        scores
    }

    /// One row per seed, keyed by the challenge playlist id, in challenge order.
    pub fn recommendations(&self, n: usize) -> RankedRows {
        self.seeds
            .iter()
            .zip(&self.tables)
            .map(|(seed, table)| {
                let key = seed.pid.to_string();
                let ranked = rank(&key, Some(table), n);
                (key, ranked)
            })
            .collect()
    }
}

impl PlaylistObserver for TitleTrackAggregator {
    fn observe(&mut self, playlist: &SlicePlaylist) {
        for (i, score) in self.scores(playlist) {
            let seed_track = &self.seeds[i].track;
            let table = &mut self.tables[i];
            for uri in playlist.track_uris() {
                if uri != seed_track {
                    table.add(uri, score);
                }
            }
        }
    }
}

// ============================================================================
// Vocabulary coverage
// ============================================================================

/// (recommended tracks known to the track map, recommended tracks).
pub fn vocabulary_coverage(rows: &RankedRows, tracks: &IdMap<String>) -> (usize, usize) {
    let total = rows.iter().map(|(_, recs)| recs.len()).sum();
    let known = rows
        .iter()
        .flat_map(|(_, recs)| recs.iter())
        .filter(|t| tracks.get(t.as_str()).is_some())
        .count();
    (known, total)
}
