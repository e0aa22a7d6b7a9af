//! Dense integer ids for playlists and tracks.
//!
//! Tracks are numbered in first-seen order of the filtered table. Playlists
//! are numbered by a seeded permutation of their ascending source ids: a
//! Fisher-Yates shuffle (`SliceRandom::shuffle`) driven by
//! `ChaCha8Rng::seed_from_u64`. ChaCha8 output is fixed across platforms and
//! crate releases, so a persisted playlist map stays valid for later runs.
//! Do not swap the generator or the shuffle without regenerating every map.

use anyhow::{bail, Context, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::de::DeserializeOwned;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::borrow::Borrow;
use std::fs::File;
use std::hash::Hash;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::errors::{require, PipelineError};
use crate::models::{DenseId, PlaylistId, RemappedRow, Triplet};

// ============================================================================
// Id map
// ============================================================================

/// Bijection between source identifiers and `0..len()`.
#[derive(Clone, Debug)]
pub struct IdMap<K> {
    keys: Vec<K>,
    index: FxHashMap<K, DenseId>,
}

impl<K> IdMap<K>
where
    K: Eq + Hash + Clone,
{
    /// Number keys in iteration order, skipping repeats.
    pub fn from_first_seen<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
    {
        let mut map = Self {
            keys: Vec::new(),
            index: FxHashMap::default(),
        };
        for key in keys {
            if !map.index.contains_key(&key) {
                map.index.insert(key.clone(), map.keys.len() as DenseId);
                map.keys.push(key);
            }
        }
        map
    }

    pub fn get<Q>(&self, key: &Q) -> Option<DenseId>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).copied()
    }

    /// Keys in id order.
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<K> Serialize for IdMap<K>
where
    K: Serialize,
{
    /// `{ key: id }` in id order.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.keys.len()))?;
        for (id, key) in self.keys.iter().enumerate() {
            map.serialize_entry(key, &(id as DenseId))?;
        }
        map.end()
    }
}

impl<K> IdMap<K>
where
    K: Eq + Hash + Clone + Serialize + DeserializeOwned,
{
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer(&mut out, self)?;
        out.flush()?;
        Ok(())
    }

    /// Load a persisted map and check that its values are exactly `0..len`.
    pub fn load(path: &Path, stage: &'static str) -> Result<Self> {
        require(stage, path)?;
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let raw: FxHashMap<K, DenseId> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| PipelineError::malformed(path, e))?;

        let len = raw.len();
        let mut slots: Vec<Option<K>> = vec![None; len];
        for (key, id) in &raw {
            let corrupt = |details: String| PipelineError::CorruptIdMap {
                path: path.to_path_buf(),
                len,
                details,
            };
            let slot = slots
                .get_mut(*id as usize)
                .ok_or_else(|| corrupt(format!("id {} out of range", id)))?;
            if slot.is_some() {
                return Err(corrupt(format!("id {} assigned twice", id)).into());
            }
            *slot = Some(key.clone());
        }

        // Every slot is filled: `len` distinct ids below `len`.
        let keys = slots.into_iter().flatten().collect();
        Ok(Self { keys, index: raw })
    }
}

// ============================================================================
// Id assignment
// ============================================================================

/// Seeded permutation of `0..n`.
pub fn permutation(n: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut idx: Vec<usize> = (0..n).collect();
    idx.shuffle(&mut rng);
    idx
}

/// Playlist ids from the ascending surviving playlist ids, permuted with `seed`.
/// The map's key order is the permuted order.
pub fn build_playlist_map(sorted_ids: &[PlaylistId], seed: u64) -> IdMap<PlaylistId> {
    let perm = permutation(sorted_ids.len(), seed);
    IdMap::from_first_seen(perm.into_iter().map(|i| sorted_ids[i]))
}

/// Track ids in first-seen order of the filtered table.
pub fn build_track_map(triplets: &[Triplet]) -> IdMap<String> {
    IdMap::from_first_seen(triplets.iter().map(|t| t.track.to_string()))
}

/// Both id maps of one experiment.
#[derive(Clone, Debug)]
pub struct Remapping {
    pub playlists: IdMap<PlaylistId>,
    pub tracks: IdMap<String>,
}

impl Remapping {
    pub fn build(triplets: &[Triplet], sorted_playlists: &[PlaylistId], seed: u64) -> Self {
        Self {
            playlists: build_playlist_map(sorted_playlists, seed),
            tracks: build_track_map(triplets),
        }
    }

    pub fn save(&self, playlist_path: &Path, track_path: &Path) -> Result<()> {
        self.tracks.save(track_path)?;
        self.playlists.save(playlist_path)?;
        Ok(())
    }

    pub fn load(playlist_path: &Path, track_path: &Path, stage: &'static str) -> Result<Self> {
        Ok(Self {
            playlists: IdMap::load(playlist_path, stage)?,
            tracks: IdMap::load(track_path, stage)?,
        })
    }

    pub fn remap(&self, t: &Triplet) -> Result<RemappedRow> {
        let Some(uid) = self.playlists.get(&t.playlist) else {
            bail!("playlist {} has no id", t.playlist);
        };
        let Some(sid) = self.tracks.get(&*t.track) else {
            bail!("track {} has no id", t.track);
        };
        Ok(RemappedRow {
            uid,
            sid,
            title: t.title.to_string(),
        })
    }

    /// Remap every row; the maps must cover the whole table.
    pub fn numerize(&self, triplets: &[Triplet]) -> Result<Vec<RemappedRow>> {
        triplets.iter().map(|t| self.remap(t)).collect()
    }
}

/// Distinct uids and sids in first-seen order of a converted table.
pub fn index_listing(rows: &[RemappedRow]) -> (Vec<DenseId>, Vec<DenseId>) {
    let mut seen_u = FxHashSet::default();
    let mut seen_s = FxHashSet::default();
    let uids = rows.iter().map(|r| r.uid).filter(|u| seen_u.insert(*u)).collect();
    let sids = rows.iter().map(|r| r.sid).filter(|s| seen_s.insert(*s)).collect();
    (uids, sids)
}
