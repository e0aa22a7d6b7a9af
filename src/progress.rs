//! Progress reporting.
//!
//! Stages report per-file and per-1000-playlist progress. In log-only mode the
//! bars are hidden and progress goes through `log` instead, for tail-friendly
//! output from background runs.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Set once from `--log-only` before any stage runs.
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// `4.2s`, `3m05s`, `1h02m`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

fn hide_in_log_only(pb: ProgressBar, style: ProgressStyle) -> ProgressBar {
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(style);
    }
    pb
}

/// Bar over the slice files of one scan.
pub fn slice_bar(files: u64, phase: &str) -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({eta} left)")
        .unwrap()
        .progress_chars("=> ");
    let pb = hide_in_log_only(ProgressBar::new(files), style);
    pb.set_message(phase.to_string());
    pb
}

/// Spinner for steps with no known length (loading a whole table).
pub fn spinner(msg: &str) -> ProgressBar {
    let style = ProgressStyle::default_spinner()
        .template("{msg} {spinner} [{elapsed_precise}]")
        .unwrap();
    let pb = hide_in_log_only(ProgressBar::new_spinner(), style);
    if !is_log_only() {
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_message(msg.to_string());
    pb
}

/// Log a `[phase] done/total` line every `interval` files and at the end.
/// Only active in log-only mode; otherwise the bar shows the same thing.
pub fn log_file_progress(phase: &str, done: u64, total: u64, interval: u64) {
    if !is_log_only() || interval == 0 {
        return;
    }
    if done % interval == 0 || done == total {
        let pct = if total == 0 { 100.0 } else { 100.0 * done as f64 / total as f64 };
        log::info!("[{}] {}/{} files ({:.1}%)", phase, done, total, pct);
    }
}

/// Counts playlists across files and reports every `interval` of them.
pub struct PlaylistCounter {
    phase: &'static str,
    interval: u64,
    seen: u64,
}

impl PlaylistCounter {
    pub fn new(phase: &'static str, interval: u64) -> Self {
        Self {
            phase,
            interval,
            seen: 0,
        }
    }

    pub fn tick(&mut self) {
        self.seen += 1;
        if self.interval > 0 && self.seen % self.interval == 0 {
            if is_log_only() {
                log::info!("[{}] {} playlists processed", self.phase, self.seen);
            } else {
                log::debug!("[{}] {} playlists processed", self.phase, self.seen);
            }
        }
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }
}
