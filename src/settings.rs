//! Path, filename and pipeline constants.
//!
//! Every artifact the pipeline reads or writes is named here. `Paths`
//! resolves them against the MPD root and the challenge root.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Directory and file names
// ============================================================================

pub const MPD_DATA_DIR_NAME: &str = "data";
pub const EXP_DIR_NAME: &str = "exp_data";
pub const VALIDATION_DIR_NAME: &str = "validation";

pub const MPD_TRACK_TRAIN_FILE_NAME: &str = "mpd_track_train.csv";
pub const MPD_CONVERTED_TRACK_TRAIN_FILE_NAME: &str = "mpd_converted_track_train.csv";
pub const PLAYLIST_INDEX_FILE_NAME: &str = "u_index.txt";
pub const TRACK_INDEX_FILE_NAME: &str = "i_index.txt";
pub const TRACK_MAPPING_FILE_NAME: &str = "item_mappings.json";
pub const PLAYLIST_MAPPING_FILE_NAME: &str = "user_mappings.json";

pub const CHALLENGE_SET_FILE_NAME: &str = "challenge_set.json";
pub const ONE_SONG_PLAYLISTS_FILE_NAME: &str = "one_song_playlists.csv";
pub const SUBPROFILE_TRAIN_FILE_NAME: &str = "subprofile_train.csv";
pub const CHALLENGE_USERS_FILE_NAME: &str = "challenge_users.csv";

pub const TITLE_RECS_FILE_NAME: &str = "title_popularity_recs.csv";
pub const TITLE_ONE_SONG_RECS_FILE_NAME: &str = "title_one_song_popularity_recs.csv";
pub const COLD_START_TITLES_FILE_NAME: &str = "cold_start_titles.txt";

pub const VALIDATION_TRAIN_FILE_NAME: &str = "train.csv";
pub const VALIDATION_TR_FILE_NAME: &str = "validation_tr.csv";
pub const VALIDATION_TE_FILE_NAME: &str = "validation_te.csv";

/// Source slices look like `mpd.slice.0-999.json`.
pub const SLICE_PREFIX: &str = "mpd.slice.";
pub const SLICE_SUFFIX: &str = ".json";

// ============================================================================
// Pipeline constants
// ============================================================================

/// Seed for the playlist permutation and the per-playlist test draws.
pub const SEED: u64 = 98765;

/// Number of playlists (taken from the end of the permuted order) held out for validation.
pub const HELDOUT_PLAYLISTS: usize = 10_000;

/// Validation playlists with fewer rows than this keep all rows in validation-train.
pub const MIN_TEST_INTERACTIONS: usize = 5;

pub const DEFAULT_TEST_PROP: f64 = 0.2;

/// Recommendations emitted per cold-start key.
pub const TOP_N: usize = 500;

/// Default minimum number of playlists a track must appear in.
pub const DEFAULT_MIN_SC: usize = 2;

/// Default minimum number of rows a playlist must have (0 disables the cut).
pub const DEFAULT_MIN_UC: usize = 0;

/// Playlists between progress lines.
pub const PROGRESS_INTERVAL: u64 = 1000;

// ============================================================================
// Resolved paths
// ============================================================================

/// Every artifact location for one experiment.
#[derive(Clone, Debug)]
pub struct Paths {
    pub mpd_data: PathBuf,
    pub exp_data: PathBuf,
    pub challenge_set: PathBuf,
}

impl Paths {
    /// Layout used by the original experiments: `<mpd>/data` holds the slices,
    /// `<mpd>/exp_data` receives every output.
    pub fn new(mpd_path: &Path, challenge_path: &Path) -> Self {
        Self {
            mpd_data: mpd_path.join(MPD_DATA_DIR_NAME),
            exp_data: mpd_path.join(EXP_DIR_NAME),
            challenge_set: challenge_path.join(CHALLENGE_SET_FILE_NAME),
        }
    }

    pub fn exp_file(&self, name: &str) -> PathBuf {
        self.exp_data.join(name)
    }

    pub fn validation_dir(&self) -> PathBuf {
        self.exp_data.join(VALIDATION_DIR_NAME)
    }

    pub fn track_train(&self) -> PathBuf {
        self.exp_file(MPD_TRACK_TRAIN_FILE_NAME)
    }

    pub fn track_mapping(&self) -> PathBuf {
        self.exp_file(TRACK_MAPPING_FILE_NAME)
    }

    pub fn playlist_mapping(&self) -> PathBuf {
        self.exp_file(PLAYLIST_MAPPING_FILE_NAME)
    }

    /// Create the experiment directory if it does not exist yet.
    pub fn ensure_exp_dir(&self) -> Result<()> {
        ensure_dir(&self.exp_data)
    }
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_layout() {
        let paths = Paths::new(Path::new("/mpd"), Path::new("/challenge"));
        assert_eq!(paths.mpd_data, PathBuf::from("/mpd/data"));
        assert_eq!(paths.track_train(), PathBuf::from("/mpd/exp_data/mpd_track_train.csv"));
        assert_eq!(paths.challenge_set, PathBuf::from("/challenge/challenge_set.json"));
        assert_eq!(paths.validation_dir(), PathBuf::from("/mpd/exp_data/validation"));
    }

    #[test]
    fn test_ensure_exp_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths::new(&tmp.path().join("a/b"), tmp.path());
        paths.ensure_exp_dir().unwrap();
        assert!(paths.exp_data.is_dir());
        // second call is a no-op
        paths.ensure_exp_dir().unwrap();
    }
}
