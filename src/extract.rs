//! Triplet extraction from the MPD slices and the challenge set.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Instant;

use crate::corpus::{for_each_slice, list_slices, read_challenge};
use crate::normalize::normalize_optional_name;
use crate::progress::{format_duration, PlaylistCounter};
use crate::safety::validate_output_path;
use crate::settings::PROGRESS_INTERVAL;
use crate::table::TripletWriter;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: usize,
    pub playlists: u64,
    pub triplets: u64,
}

/// Write one `playlist,track,title` row per track entry of every playlist in
/// the slices under `data_dir`. The sink is flushed after each slice, so an
/// interrupted run loses at most the slice in flight (the file must still be
/// regenerated from scratch).
pub fn extract_mpd(data_dir: &Path, output: &Path) -> Result<ExtractSummary> {
    let start = Instant::now();
    validate_output_path(output, &[data_dir])?;
    let files = list_slices(data_dir)?;
    log::info!("Extracting triplets from {} slices in {}", files.len(), data_dir.display());

    let mut writer = TripletWriter::create(output)?;
    let mut counter = PlaylistCounter::new("Extracting MPD playlists", PROGRESS_INTERVAL);

    for_each_slice(&files, "Extracting MPD slices", |path, slice| {
        for playlist in &slice.playlists {
            let title = normalize_optional_name(playlist.name.as_deref());
            for uri in playlist.track_uris() {
                writer.write(playlist.pid, uri, &title)?;
            }
            counter.tick();
        }
        writer
            .flush()
            .with_context(|| format!("Failed to flush triplets after {}", path.display()))
    })?;

    let summary = ExtractSummary {
        files: files.len(),
        playlists: counter.seen(),
        triplets: writer.rows(),
    };
    log::info!(
        "Extracted {} triplets from {} playlists in {}",
        summary.triplets,
        summary.playlists,
        format_duration(start.elapsed())
    );
    Ok(summary)
}

/// Append the challenge set's known tracks to the triplet file, and write the
/// playlists with exactly one known track to `one_song_output`.
pub fn extract_challenge(challenge: &Path, triplets: &Path, one_song_output: &Path) -> Result<ExtractSummary> {
    validate_output_path(triplets, &[challenge])?;
    validate_output_path(one_song_output, &[challenge, triplets])?;

    let slice = read_challenge(challenge)?;
    let mut writer = TripletWriter::append(triplets, "challenge extraction")?;
    let mut one_song = TripletWriter::create(one_song_output)?;
    let mut counter = PlaylistCounter::new("Extracting challenge playlists", PROGRESS_INTERVAL);

    for playlist in &slice.playlists {
        let title = normalize_optional_name(playlist.name.as_deref());
        let single = playlist.num_samples == Some(1);
        for uri in playlist.track_uris() {
            writer.write(playlist.pid, uri, &title)?;
            if single {
                one_song.write(playlist.pid, uri, &title)?;
            }
        }
        writer.flush()?;
        counter.tick();
    }
    one_song.flush()?;

    log::info!(
        "Appended {} challenge triplets, {} one-track playlists",
        writer.rows(),
        one_song.rows()
    );
    Ok(ExtractSummary {
        files: 1,
        playlists: counter.seen(),
        triplets: writer.rows(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::read_triplets;
    use std::fs;

    fn slice_json(playlists: &[(u64, &str, &[&str])]) -> String {
        let items: Vec<String> = playlists
            .iter()
            .map(|(pid, name, tracks)| {
                let tracks: Vec<String> = tracks
                    .iter()
                    .map(|t| format!(r#"{{"track_uri": "{}"}}"#, t))
                    .collect();
                format!(
                    r#"{{"pid": {}, "name": "{}", "tracks": [{}]}}"#,
                    pid,
                    name,
                    tracks.join(",")
                )
            })
            .collect();
        format!(r#"{{"playlists": [{}]}}"#, items.join(","))
    }

    #[test]
    fn test_extract_mpd_rows_and_order() {
        let tmp = tempfile::tempdir().unwrap();
        let data = tmp.path().join("data");
        fs::create_dir(&data).unwrap();
        fs::write(
            data.join("mpd.slice.1000-1999.json"),
            slice_json(&[(1000, "Later", &["t3"][..])]),
        )
        .unwrap();
        fs::write(
            data.join("mpd.slice.0-999.json"),
            slice_json(&[(0, "Rock, Roll!", &["t1", "t2"][..]), (1, "Chill", &["t2"][..])]),
        )
        .unwrap();
        fs::write(data.join("notes.json"), "not json").unwrap();

        let out = tmp.path().join("mpd_track_train.csv");
        let summary = extract_mpd(&data, &out).unwrap();
        assert_eq!(summary, ExtractSummary { files: 2, playlists: 3, triplets: 4 });

        let rows = read_triplets(&out, "test").unwrap();
        let flat: Vec<_> = rows
            .iter()
            .map(|t| (t.playlist, t.track.to_string(), t.title.to_string()))
            .collect();
        assert_eq!(
            flat,
            vec![
                (0, "t1".to_string(), "rock roll".to_string()),
                (0, "t2".to_string(), "rock roll".to_string()),
                (1, "t2".to_string(), "chill".to_string()),
                (1000, "t3".to_string(), "later".to_string()),
            ]
        );
    }

    #[test]
    fn test_extract_mpd_stops_on_malformed_slice() {
        let tmp = tempfile::tempdir().unwrap();
        let data = tmp.path().join("data");
        fs::create_dir(&data).unwrap();
        fs::write(data.join("mpd.slice.0-999.json"), slice_json(&[(0, "a", &["t1"][..])])).unwrap();
        fs::write(data.join("mpd.slice.1000-1999.json"), "{\"playlists\": [{\"pid\": 3}]}").unwrap();

        let out = tmp.path().join("mpd_track_train.csv");
        let err = extract_mpd(&data, &out).unwrap_err();
        assert!(err.to_string().contains("mpd.slice.1000-1999.json"));
        // The first slice was flushed before the failure.
        assert_eq!(read_triplets(&out, "test").unwrap().len(), 1);
    }

    #[test]
    fn test_extract_challenge_appends_and_splits_one_song() {
        let tmp = tempfile::tempdir().unwrap();
        let triplets = tmp.path().join("mpd_track_train.csv");
        let mut writer = TripletWriter::create(&triplets).unwrap();
        writer.write(1, "t1", "x").unwrap();
        writer.flush().unwrap();
        drop(writer);

        let challenge = tmp.path().join("challenge_set.json");
        fs::write(
            &challenge,
            r#"{"playlists": [
                {"pid": 900, "name": "Solo", "num_samples": 1, "tracks": [{"track_uri": "t9"}]},
                {"pid": 901, "num_samples": 2, "tracks": [{"track_uri": "t1"}, {"track_uri": "t2"}]},
                {"pid": 902, "name": "Empty", "num_samples": 0, "tracks": []}
            ]}"#,
        )
        .unwrap();
        let one_song = tmp.path().join("one_song_playlists.csv");

        let summary = extract_challenge(&challenge, &triplets, &one_song).unwrap();
        assert_eq!(summary.playlists, 3);
        assert_eq!(summary.triplets, 3);

        let all = read_triplets(&triplets, "test").unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(&*all[3].title, "");

        let singles = read_triplets(&one_song, "test").unwrap();
        assert_eq!(singles.len(), 1);
        assert_eq!(singles[0].playlist, 900);
        assert_eq!(&*singles[0].track, "t9");
        assert_eq!(&*singles[0].title, "solo");
    }

    #[test]
    fn test_extract_challenge_requires_triplets() {
        let tmp = tempfile::tempdir().unwrap();
        let challenge = tmp.path().join("challenge_set.json");
        fs::write(&challenge, r#"{"playlists": []}"#).unwrap();
        let err = extract_challenge(
            &challenge,
            &tmp.path().join("mpd_track_train.csv"),
            &tmp.path().join("one_song_playlists.csv"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing dependency"));
    }
}
