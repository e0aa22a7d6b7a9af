//! Challenge playlists with at least two known tracks, in the id space of the
//! MPD training table.

use anyhow::Result;
use std::collections::BTreeSet;
use std::path::Path;

use crate::models::{DenseId, RemappedRow, Slice};
use crate::normalize::normalize_optional_name;
use crate::remap::Remapping;
use crate::table::{write_lines, write_remapped};

/// Challenge playlists below this many known tracks are handled by the
/// cold-start aggregators instead.
pub const MIN_KNOWN_TRACKS: usize = 2;

#[derive(Debug, Default)]
pub struct ChallengeTrain {
    /// Rows in challenge order, track order kept within a playlist.
    pub rows: Vec<RemappedRow>,
    /// Dense ids of the challenge playlists that produced at least one row.
    pub users: BTreeSet<DenseId>,
    /// Rows whose playlist or track is unknown to the maps.
    pub skipped: usize,
}

/// Remap the known tracks of every challenge playlist with enough of them.
/// Rows the maps do not cover are dropped and counted.
pub fn map_challenge(challenge: &Slice, remapping: &Remapping) -> ChallengeTrain {
    let mut out = ChallengeTrain::default();
    for playlist in &challenge.playlists {
        if playlist.num_samples.unwrap_or(0) < MIN_KNOWN_TRACKS {
            continue;
        }
        let title = normalize_optional_name(playlist.name.as_deref());
        let Some(uid) = remapping.playlists.get(&playlist.pid) else {
            log::warn!(
                "Challenge playlist {} is not in the playlist map, skipping {} rows",
                playlist.pid,
                playlist.tracks.len()
            );
            out.skipped += playlist.tracks.len();
            continue;
        };
        for uri in playlist.track_uris() {
            match remapping.tracks.get(uri) {
                Some(sid) => {
                    out.rows.push(RemappedRow {
                        uid,
                        sid,
                        title: title.clone(),
                    });
                    out.users.insert(uid);
                }
                None => {
                    log::debug!("Track {} of challenge playlist {} is not in the track map", uri, playlist.pid);
                    out.skipped += 1;
                }
            }
        }
    }
    if out.skipped > 0 {
        log::warn!("Skipped {} challenge rows not covered by the id maps", out.skipped);
    }
    out
}

impl ChallengeTrain {
    /// Write the rows (no header) and the ascending playlist ids.
    pub fn write(&self, rows_path: &Path, users_path: &Path) -> Result<()> {
        let rows = write_remapped(rows_path, &self.rows, false)?;
        let users = write_lines(users_path, &self.users)?;
        log::info!(
            "Wrote {} challenge rows for {} playlists to {}",
            rows,
            users,
            rows_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SlicePlaylist, SliceTrack, Triplet};
    use crate::settings::SEED;
    use std::fs;
    use std::sync::Arc;

    fn challenge_playlist(pid: u64, name: &str, n: usize, tracks: &[&str]) -> SlicePlaylist {
        SlicePlaylist {
            pid,
            name: Some(name.to_string()),
            num_samples: Some(n),
            tracks: tracks
                .iter()
                .map(|t| SliceTrack {
                    track_uri: t.to_string(),
                })
                .collect(),
        }
    }

    fn remapping() -> Remapping {
        let rows: Vec<Triplet> = [(100, "a"), (101, "b"), (102, "c"), (100, "b")]
            .iter()
            .map(|&(pid, track)| Triplet {
                playlist: pid,
                track: Arc::from(track),
                title: Arc::from("x"),
            })
            .collect();
        Remapping::build(&rows, &[100, 101, 102], SEED)
    }

    #[test]
    fn test_map_challenge_filters_and_skips() {
        let remapping = remapping();
        let challenge = Slice {
            playlists: vec![
                challenge_playlist(102, "Big Mix", 3, &["c", "a", "unknown"]),
                challenge_playlist(101, "One", 1, &["b"]),
                challenge_playlist(999, "Stranger", 2, &["a", "b"]),
                challenge_playlist(100, "Pair", 2, &["b", "a"]),
            ],
        };
        let out = map_challenge(&challenge, &remapping);

        let u102 = remapping.playlists.get(&102u64).unwrap();
        let u100 = remapping.playlists.get(&100u64).unwrap();
        let sid = |t: &str| remapping.tracks.get(t).unwrap();
        let pairs: Vec<_> = out.rows.iter().map(|r| (r.uid, r.sid, r.title.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                (u102, sid("c"), "big mix"),
                (u102, sid("a"), "big mix"),
                (u100, sid("b"), "pair"),
                (u100, sid("a"), "pair"),
            ]
        );
        assert_eq!(out.skipped, 3);
        assert_eq!(out.users, [u100, u102].into_iter().collect::<BTreeSet<_>>());
    }

    #[test]
    fn test_write_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        let remapping = remapping();
        let challenge = Slice {
            playlists: vec![
                challenge_playlist(101, "b", 2, &["b", "c"]),
                challenge_playlist(100, "a", 2, &["a", "b"]),
            ],
        };
        let out = map_challenge(&challenge, &remapping);
        let rows = tmp.path().join("subprofile_train.csv");
        let users = tmp.path().join("challenge_users.csv");
        out.write(&rows, &users).unwrap();

        let body = fs::read_to_string(&rows).unwrap();
        assert_eq!(body.lines().count(), 4);
        assert!(!body.starts_with("uid"));

        let ids: Vec<DenseId> = fs::read_to_string(&users)
            .unwrap()
            .lines()
            .map(|l| l.parse().unwrap())
            .collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 2);
    }
}
