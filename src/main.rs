use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;

use mpd_prep::pipeline::{self, ConvertOptions};
use mpd_prep::progress::{format_duration, set_log_only};
use mpd_prep::settings::{Paths, DEFAULT_MIN_SC, DEFAULT_MIN_UC, DEFAULT_TEST_PROP};

#[derive(Parser)]
#[command(name = "mpd-prep")]
#[command(about = "Prepare the Million Playlist Dataset for collaborative filtering experiments")]
struct Args {
    /// MPD root (holds `data/` with the slices; outputs go to `exp_data/`)
    #[arg(long, default_value = "mpd.v1")]
    mpd_path: PathBuf,

    /// Directory holding challenge_set.json
    #[arg(long, default_value = "challenge.v1")]
    challenge_path: PathBuf,

    #[arg(long, default_value = "0")]
    workers: usize,

    /// Log progress messages instead of showing progress bars (for background runs)
    #[arg(long)]
    log_only: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract playlist,track,title triplets from the MPD slices
    Extract,
    /// Append challenge triplets and write the one-track playlists
    ExtractChallenge,
    /// Filter, remap and split the triplet table
    Convert {
        #[command(flatten)]
        convert: ConvertArgs,
    },
    /// Map challenge playlists with two or more tracks into model ids
    ChallengeTrain,
    /// Title popularity recommendations for title-only challenge playlists
    TitleRecs,
    /// Title and track popularity recommendations for one-track challenge playlists
    TitleTrackRecs,
    /// Run every stage in order
    All {
        #[command(flatten)]
        convert: ConvertArgs,
    },
}

#[derive(clap::Args)]
struct ConvertArgs {
    /// Skip the validation split
    #[arg(long)]
    no_validation: bool,

    /// Minimum number of rows a track needs to be kept
    #[arg(long, default_value_t = DEFAULT_MIN_SC)]
    min_sc: usize,

    /// Minimum number of rows a playlist needs to be kept (0 disables the cut)
    #[arg(long, default_value_t = DEFAULT_MIN_UC)]
    min_uc: usize,

    /// Fraction of each validation playlist drawn as test rows
    #[arg(long, default_value_t = DEFAULT_TEST_PROP)]
    test_prop: f64,
}

impl From<&ConvertArgs> for ConvertOptions {
    fn from(args: &ConvertArgs) -> Self {
        ConvertOptions {
            min_sc: args.min_sc,
            min_uc: args.min_uc,
            validation: !args.no_validation,
            test_prop: args.test_prop,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    set_log_only(args.log_only);

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let start = Instant::now();
    let paths = Paths::new(&args.mpd_path, &args.challenge_path);
    log::info!(
        "MPD data: {}, experiment dir: {}, challenge set: {}",
        paths.mpd_data.display(),
        paths.exp_data.display(),
        paths.challenge_set.display()
    );

    match &args.command {
        Command::Extract => {
            pipeline::run_extract(&paths)?;
        }
        Command::ExtractChallenge => {
            pipeline::run_extract_challenge(&paths)?;
        }
        Command::Convert { convert } => {
            pipeline::run_convert(&paths, &convert.into())?;
        }
        Command::ChallengeTrain => {
            pipeline::run_challenge_train(&paths)?;
        }
        Command::TitleRecs => {
            pipeline::run_title_recs(&paths)?;
        }
        Command::TitleTrackRecs => {
            pipeline::run_title_track_recs(&paths)?;
        }
        Command::All { convert } => {
            pipeline::run_all(&paths, &convert.into())?;
        }
    }

    log::info!("Done in {}", format_duration(start.elapsed()));
    Ok(())
}
