//! Stage drivers. Each stage reads the artifacts of earlier stages from the
//! experiment directory and fails with a missing-dependency error when one is
//! absent; nothing is recomputed implicitly.

use anyhow::Result;
use std::time::Instant;

use crate::challenge::{map_challenge, ChallengeTrain};
use crate::cold_start::{
    cold_titles, one_track_seeds, scan_corpus, vocabulary_coverage, RankedRows, TitleAggregator,
    TitleTrackAggregator,
};
use crate::corpus::{list_slices, read_challenge};
use crate::errors::require;
use crate::extract::{extract_challenge, extract_mpd, ExtractSummary};
use crate::filter::filter_triplets;
use crate::models::{ConvertStats, PlaylistId};
use crate::partition::{partition, PartitionConfig};
use crate::progress::{format_duration, spinner};
use crate::remap::{index_listing, IdMap, Remapping};
use crate::settings::*;
use crate::table::{read_triplets, write_lines, write_ranked_rows, write_remapped};

/// File the convert stage writes its run summary to.
pub const CONVERT_STATS_FILE_NAME: &str = "convert_stats.json";

#[derive(Clone, Debug)]
pub struct ConvertOptions {
    pub min_sc: usize,
    pub min_uc: usize,
    /// Produce the validation split.
    pub validation: bool,
    pub test_prop: f64,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            min_sc: DEFAULT_MIN_SC,
            min_uc: DEFAULT_MIN_UC,
            validation: true,
            test_prop: DEFAULT_TEST_PROP,
        }
    }
}

pub fn run_extract(paths: &Paths) -> Result<ExtractSummary> {
    paths.ensure_exp_dir()?;
    extract_mpd(&paths.mpd_data, &paths.track_train())
}

pub fn run_extract_challenge(paths: &Paths) -> Result<ExtractSummary> {
    paths.ensure_exp_dir()?;
    extract_challenge(
        &paths.challenge_set,
        &paths.track_train(),
        &paths.exp_file(ONE_SONG_PLAYLISTS_FILE_NAME),
    )
}

/// Filter, remap and optionally partition the triplet table.
pub fn run_convert(paths: &Paths, options: &ConvertOptions) -> Result<ConvertStats> {
    let start = Instant::now();
    let config = PartitionConfig {
        test_prop: options.test_prop,
        ..Default::default()
    }
    .validated()?;

    let loading = spinner("Loading triplets");
    let triplets = read_triplets(&paths.track_train(), "convert")?;
    let raw_events = triplets.len();
    loading.finish_with_message(format!("Loaded {} triplets", raw_events));
    log::info!("Loaded {} raw listening events", raw_events);

    let filtered = filter_triplets(triplets, options.min_uc, options.min_sc);
    let playlist_ids: Vec<PlaylistId> = filtered.playlist_ids();
    log::info!(
        "After filtering, there are {} listening events from {} playlists and {} tracks (sparsity: {:.3}%)",
        filtered.triplets.len(),
        playlist_ids.len(),
        filtered.track_counts.len(),
        filtered.sparsity_pct()
    );

    let remapping = Remapping::build(&filtered.triplets, &playlist_ids, SEED);
    remapping.save(&paths.playlist_mapping(), &paths.track_mapping())?;
    log::info!(
        "Saved id maps: {} playlists, {} tracks",
        remapping.playlists.len(),
        remapping.tracks.len()
    );

    let mut stats = ConvertStats {
        raw_events,
        listening_events: filtered.triplets.len(),
        playlists: remapping.playlists.len(),
        tracks: remapping.tracks.len(),
        sparsity_pct: filtered.sparsity_pct(),
        min_sc: options.min_sc,
        min_uc: options.min_uc,
        ..Default::default()
    };

    if options.validation {
        let split = partition(&filtered.triplets, &remapping, &config)?;
        let dir = paths.validation_dir();
        ensure_dir(&dir)?;
        stats.train_rows = write_remapped(&dir.join(VALIDATION_TRAIN_FILE_NAME), &split.train, true)?;
        stats.validation_train_rows =
            write_remapped(&dir.join(VALIDATION_TR_FILE_NAME), &split.validation_train, true)?;
        stats.validation_test_rows =
            write_remapped(&dir.join(VALIDATION_TE_FILE_NAME), &split.validation_test, true)?;
        stats.heldout_playlists = split.heldout_playlists;
    }

    let converted = remapping.numerize(&filtered.triplets)?;
    write_remapped(&paths.exp_file(MPD_CONVERTED_TRACK_TRAIN_FILE_NAME), &converted, true)?;

    let (uids, sids) = index_listing(&converted);
    write_lines(&paths.exp_file(PLAYLIST_INDEX_FILE_NAME), &uids)?;
    write_lines(&paths.exp_file(TRACK_INDEX_FILE_NAME), &sids)?;

    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    stats.log_phase("convert");
    stats.write_to_file(&paths.exp_file(CONVERT_STATS_FILE_NAME))?;
    log::info!("Convert finished in {}", format_duration(start.elapsed()));
    Ok(stats)
}

pub fn run_challenge_train(paths: &Paths) -> Result<ChallengeTrain> {
    let remapping = Remapping::load(&paths.playlist_mapping(), &paths.track_mapping(), "challenge train")?;
    let challenge = read_challenge(&paths.challenge_set)?;
    let out = map_challenge(&challenge, &remapping);
    out.write(
        &paths.exp_file(SUBPROFILE_TRAIN_FILE_NAME),
        &paths.exp_file(CHALLENGE_USERS_FILE_NAME),
    )?;
    Ok(out)
}

fn log_coverage(label: &str, rows: &RankedRows, tracks: &IdMap<String>) {
    let (known, total) = vocabulary_coverage(rows, tracks);
    let pct = if total == 0 { 0.0 } else { 100.0 * known as f64 / total as f64 };
    log::info!(
        "{}: {} of {} recommended tracks are in the model vocabulary ({:.2}%)",
        label,
        known,
        total,
        pct
    );
}

/// Popularity recommendations for challenge playlists with only a title.
pub fn run_title_recs(paths: &Paths) -> Result<RankedRows> {
    let start = Instant::now();
    let challenge = read_challenge(&paths.challenge_set)?;
    let tracks: IdMap<String> = IdMap::load(&paths.track_mapping(), "title recommendations")?;
    let files = list_slices(&paths.mpd_data)?;

    let titles = cold_titles(&challenge);
    log::info!("{} cold-start titles", titles.len());
    write_lines(&paths.exp_file(COLD_START_TITLES_FILE_NAME), titles.iter())?;

    let mut aggregator = TitleAggregator::new(titles);
    let scanned = scan_corpus(&files, "Scanning titles", &mut aggregator)?;
    let rows = aggregator.recommendations(TOP_N);

    let out = paths.exp_file(TITLE_RECS_FILE_NAME);
    write_ranked_rows(&out, rows.iter().map(|(k, v)| (k.as_str(), v.as_slice())))?;
    log_coverage("Title recommendations", &rows, &tracks);
    log::info!(
        "Wrote {} title rows to {} after scanning {} playlists in {}",
        rows.len(),
        out.display(),
        scanned,
        format_duration(start.elapsed())
    );
    Ok(rows)
}

/// Popularity recommendations for challenge playlists with a title and one track.
pub fn run_title_track_recs(paths: &Paths) -> Result<RankedRows> {
    let start = Instant::now();
    let challenge = read_challenge(&paths.challenge_set)?;
    let tracks: IdMap<String> = IdMap::load(&paths.track_mapping(), "title+track recommendations")?;
    let files = list_slices(&paths.mpd_data)?;

    let seeds = one_track_seeds(&challenge);
    log::info!("{} one-track seed playlists", seeds.len());

    let mut aggregator = TitleTrackAggregator::new(seeds);
    let scanned = scan_corpus(&files, "Scanning title and track matches", &mut aggregator)?;
    let rows = aggregator.recommendations(TOP_N);

    let out = paths.exp_file(TITLE_ONE_SONG_RECS_FILE_NAME);
    write_ranked_rows(&out, rows.iter().map(|(k, v)| (k.as_str(), v.as_slice())))?;
    log_coverage("Title+track recommendations", &rows, &tracks);
    log::info!(
        "Wrote {} seed rows to {} after scanning {} playlists in {}",
        rows.len(),
        out.display(),
        scanned,
        format_duration(start.elapsed())
    );
    Ok(rows)
}

/// Every stage in dependency order.
pub fn run_all(paths: &Paths, options: &ConvertOptions) -> Result<()> {
    let start = Instant::now();
    require("all", &paths.mpd_data)?;
    require("all", &paths.challenge_set)?;

    run_extract(paths)?;
    run_extract_challenge(paths)?;
    run_convert(paths, options)?;
    run_challenge_train(paths)?;
    run_title_recs(paths)?;
    run_title_track_recs(paths)?;

    log::info!("All stages finished in {}", format_duration(start.elapsed()));
    Ok(())
}
