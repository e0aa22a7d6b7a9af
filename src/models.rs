//! Core data models for the MPD preprocessing pipeline.
//!
//! Raw slice records (deserialized straight from the JSON slices), the
//! interned triplet rows that flow between stages, and the run statistics
//! written next to the converted table.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Type Aliases
// ============================================================================

/// Source playlist identifier (`pid` in the slices).
pub type PlaylistId = u64;

/// Dense integer id assigned by the remapper.
pub type DenseId = u32;

// ============================================================================
// String Interning
// ============================================================================

/// String interner for deduplicating track URIs and titles while loading
/// the triplet table. Every playlist title is repeated once per track and
/// popular tracks appear in tens of thousands of playlists, so rows share
/// one allocation per distinct string.
pub struct StringInterner {
    strings: FxHashMap<Arc<str>, Arc<str>>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self {
            strings: FxHashMap::default(),
        }
    }

    /// Intern a string, returning a reference-counted handle.
    /// If the string was seen before, returns the existing Arc.
    pub fn intern(&mut self, s: &str) -> Arc<str> {
        if let Some(existing) = self.strings.get(s) {
            return Arc::clone(existing);
        }
        let arc: Arc<str> = Arc::from(s);
        self.strings.insert(Arc::clone(&arc), Arc::clone(&arc));
        arc
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Slice Models
// ============================================================================

/// One MPD slice file or the challenge set file.
#[derive(Clone, Debug, Deserialize)]
pub struct Slice {
    pub playlists: Vec<SlicePlaylist>,
}

/// Playlist object as found in the slices. `name` is mandatory in MPD
/// slices but may be absent from challenge playlists; `num_samples` only
/// exists in the challenge set.
#[derive(Clone, Debug, Deserialize)]
pub struct SlicePlaylist {
    pub pid: PlaylistId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub num_samples: Option<usize>,
    pub tracks: Vec<SliceTrack>,
}

/// Track entry; every other field of the slice entry is ignored.
#[derive(Clone, Debug, Deserialize)]
pub struct SliceTrack {
    pub track_uri: String,
}

impl SlicePlaylist {
    pub fn track_uris(&self) -> impl Iterator<Item = &str> {
        self.tracks.iter().map(|t| t.track_uri.as_str())
    }
}

// ============================================================================
// Triplet Models
// ============================================================================

/// (playlist, track, normalized title) interaction row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Triplet {
    pub playlist: PlaylistId,
    pub track: Arc<str>,
    pub title: Arc<str>,
}

/// Triplet after id remapping (`uid,sid,title`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemappedRow {
    pub uid: DenseId,
    pub sid: DenseId,
    pub title: String,
}

// ============================================================================
// Statistics
// ============================================================================

/// Summary of one `convert` run, written as JSON next to the converted table.
#[derive(Default, Debug, Clone, Serialize)]
pub struct ConvertStats {
    pub raw_events: usize,
    pub listening_events: usize,
    pub playlists: usize,
    pub tracks: usize,
    pub sparsity_pct: f64,
    pub min_sc: usize,
    pub min_uc: usize,

    // Validation split (zero when disabled)
    pub heldout_playlists: usize,
    pub train_rows: usize,
    pub validation_train_rows: usize,
    pub validation_test_rows: usize,

    pub elapsed_seconds: f64,
}

impl ConvertStats {
    /// Log stats in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            log::info!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
