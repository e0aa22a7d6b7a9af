//! Reading the MPD slices and the challenge set.
//!
//! Slices are parsed in parallel in bounded chunks, but handed to the caller
//! one at a time in sorted file order, so everything downstream sees the same
//! sequence as a sequential scan.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{require, PipelineError};
use crate::models::Slice;
use crate::progress::{log_file_progress, slice_bar};
use crate::safety::is_slice_file_name;

/// Slice files in `dir`, filtered by naming convention and sorted by name.
pub fn list_slices(dir: &Path) -> Result<Vec<PathBuf>> {
    require("slice scan", dir)?;
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if is_slice_file_name(name) && entry.path().is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn parse_document(path: &Path) -> Result<Slice> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let slice: Slice =
        serde_json::from_slice(&bytes).map_err(|e| PipelineError::malformed(path, e))?;
    Ok(slice)
}

/// Parse one MPD slice. Every playlist must carry a name.
pub fn read_slice(path: &Path) -> Result<Slice> {
    let slice = parse_document(path)?;
    if let Some(p) = slice.playlists.iter().find(|p| p.name.is_none()) {
        return Err(PipelineError::malformed(path, format!("playlist {} has no name", p.pid)).into());
    }
    Ok(slice)
}

/// Parse the challenge set. Names are optional, `num_samples` is not, and a
/// playlist must list at least `num_samples` tracks.
pub fn read_challenge(path: &Path) -> Result<Slice> {
    require("challenge set", path)?;
    let slice = parse_document(path)?;
    for p in &slice.playlists {
        let Some(n) = p.num_samples else {
            return Err(PipelineError::malformed(
                path,
                format!("challenge playlist {} has no num_samples", p.pid),
            )
            .into());
        };
        if p.tracks.len() < n {
            return Err(PipelineError::malformed(
                path,
                format!(
                    "challenge playlist {} has num_samples {} but {} tracks",
                    p.pid,
                    n,
                    p.tracks.len()
                ),
            )
            .into());
        }
    }
    Ok(slice)
}

/// Call `f` for every slice in `files`, in order. Parsing runs on the rayon
/// pool one chunk at a time; the first failure (in file order) stops the scan.
pub fn for_each_slice<F>(files: &[PathBuf], phase: &str, mut f: F) -> Result<()>
where
    F: FnMut(&Path, Slice) -> Result<()>,
{
    let total = files.len() as u64;
    let pb = slice_bar(total, phase);
    let chunk_size = rayon::current_num_threads().max(1);
    let mut done = 0u64;

    for chunk in files.chunks(chunk_size) {
        let parsed: Vec<Result<Slice>> = chunk.par_iter().map(|p| read_slice(p)).collect();
        for (path, slice) in chunk.iter().zip(parsed) {
            f(path, slice?)?;
            done += 1;
            pb.inc(1);
            log_file_progress(phase, done, total, 10);
        }
    }

    pb.finish_with_message(format!("{}: {} files", phase, done));
    Ok(())
}
