//! Triplet and remapped-row tables on disk.
//!
//! All tables are RFC 4180 CSV: a title containing commas, quotes or newlines
//! is quoted, so every record has exactly three fields. The intermediate
//! triplet file has no header; remapped tables start with `uid,sid,title`.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::errors::{require, PipelineError};
use crate::models::{PlaylistId, RemappedRow, StringInterner, Triplet};

pub const REMAPPED_HEADER: [&str; 3] = ["uid", "sid", "title"];

// ============================================================================
// Triplet sink
// ============================================================================

/// Incremental writer for `playlist,track,title` rows.
pub struct TripletWriter {
    inner: csv::Writer<File>,
    rows: u64,
}

impl TripletWriter {
    /// Truncate (or create) `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(Self::from_file(file))
    }

    /// Append to `path`; the file must already exist.
    pub fn append(path: &Path, stage: &'static str) -> Result<Self> {
        require(stage, path)?;
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {} for append", path.display()))?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: File) -> Self {
        let inner = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        Self { inner, rows: 0 }
    }

    pub fn write(&mut self, playlist: PlaylistId, track: &str, title: &str) -> Result<()> {
        self.inner
            .write_record([playlist.to_string().as_str(), track, title])?;
        self.rows += 1;
        Ok(())
    }

    /// Push buffered rows to the file. Called once per source document.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }
}

/// Load the whole triplet table, interning track URIs and titles.
pub fn read_triplets(path: &Path, stage: &'static str) -> Result<Vec<Triplet>> {
    require(stage, path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut interner = StringInterner::new();
    let mut triplets = Vec::new();
    let mut record = csv::StringRecord::new();

    while reader
        .read_record(&mut record)
        .map_err(|e| PipelineError::malformed(path, e))?
    {
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.len() != 3 {
            return Err(PipelineError::malformed(
                path,
                format!("line {}: expected 3 fields, found {}", line, record.len()),
            )
            .into());
        }
        let playlist: PlaylistId = record[0].parse().map_err(|_| {
            PipelineError::malformed(path, format!("line {}: bad playlist id {:?}", line, &record[0]))
        })?;
        triplets.push(Triplet {
            playlist,
            track: interner.intern(&record[1]),
            title: interner.intern(&record[2]),
        });
    }

    log::debug!(
        "Loaded {} triplets ({} distinct strings) from {}",
        triplets.len(),
        interner.len(),
        path.display()
    );
    Ok(triplets)
}

// ============================================================================
// Remapped tables
// ============================================================================

fn remapped_writer(path: &Path, header: bool) -> Result<csv::Writer<File>> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if header {
        writer.write_record(REMAPPED_HEADER)?;
    }
    Ok(writer)
}

/// Write `uid,sid,title` rows. The header is written even for an empty table.
pub fn write_remapped<'a, I>(path: &Path, rows: I, header: bool) -> Result<usize>
where
    I: IntoIterator<Item = &'a RemappedRow>,
{
    let mut writer = remapped_writer(path, header)?;
    let mut count = 0;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

/// Read a remapped table written with a header.
pub fn read_remapped(path: &Path) -> Result<Vec<RemappedRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut rows = Vec::new();
    for row in reader.deserialize::<RemappedRow>() {
        rows.push(row.map_err(|e| PipelineError::malformed(path, e))?);
    }
    Ok(rows)
}

/// One value per line.
pub fn write_lines<I, T>(path: &Path, values: I) -> Result<usize>
where
    I: IntoIterator<Item = T>,
    T: std::fmt::Display,
{
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    let mut count = 0;
    for value in values {
        writeln!(out, "{}", value)?;
        count += 1;
    }
    out.flush()?;
    Ok(count)
}

/// CSV rows of a key followed by its ranked items (`key,item1,item2,...`).
pub fn write_ranked_rows<'a, I>(path: &Path, rows: I) -> Result<usize>
where
    I: IntoIterator<Item = (&'a str, &'a [String])>,
{
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(file);
    let mut count = 0;
    for (key, items) in rows {
        let mut record = csv::StringRecord::with_capacity(64, items.len() + 1);
        record.push_field(key);
        for item in items {
            record.push_field(item);
        }
        writer.write_record(&record)?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}
