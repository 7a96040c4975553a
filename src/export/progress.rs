//! Terminal progress for an export run
//!
//! A bar when the row limit is known, a spinner otherwise. Always drawn on
//! stderr so it never mixes with CSV written to stdout.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::debug;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{wide_bar:.cyan/blue}] {human_pos}/{human_len} rows ({per_sec}) {msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {human_pos} rows ({per_sec}) {msg}";
const TICK: Duration = Duration::from_millis(120);

/// Counts rows and pages, optionally mirroring them on a progress bar.
///
/// Shared by reference with the pipeline, so every update goes through
/// atomics.
#[derive(Default)]
pub struct ProgressTracker {
    rows: AtomicU64,
    pages: AtomicU32,
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// `limit` sizes the bar; `visible` turns drawing on.
    pub fn new(limit: Option<u64>, visible: bool) -> Self {
        Self {
            rows: AtomicU64::new(0),
            pages: AtomicU32::new(0),
            bar: visible.then(|| progress_bar(limit)),
        }
    }

    /// Tracker that counts but never draws.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Set the number of rows accepted so far.
    pub fn update(&self, rows: u64) {
        self.rows.store(rows, Ordering::Relaxed);
        if let Some(bar) = &self.bar {
            bar.set_position(rows);
        }
    }

    /// Note that page number `page` has arrived from the store.
    pub fn page_fetched(&self, page: u32) {
        self.pages.store(page, Ordering::Relaxed);
        if let Some(bar) = &self.bar {
            bar.set_message(format!("page {page}"));
        }
    }

    pub fn processed(&self) -> u64 {
        self.rows.load(Ordering::Relaxed)
    }

    pub fn pages(&self) -> u32 {
        self.pages.load(Ordering::Relaxed)
    }

    /// Remove the bar from the terminal.
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

fn progress_bar(limit: Option<u64>) -> ProgressBar {
    let (bar, template) = match limit {
        Some(total) => (ProgressBar::new(total), BAR_TEMPLATE),
        None => (ProgressBar::new_spinner(), SPINNER_TEMPLATE),
    };

    match ProgressStyle::with_template(template) {
        Ok(style) => bar.set_style(style.progress_chars("=> ")),
        Err(err) => debug!("Falling back to the default progress style: {}", err),
    }
    bar.set_draw_target(ProgressDrawTarget::stderr());
    bar.enable_steady_tick(TICK);
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_tracker_still_counts() {
        let tracker = ProgressTracker::disabled();
        tracker.update(7);
        tracker.page_fetched(2);
        tracker.finish();
        assert_eq!(tracker.processed(), 7);
        assert_eq!(tracker.pages(), 2);
    }

    #[test]
    fn test_templates_are_valid() {
        assert!(ProgressStyle::with_template(BAR_TEMPLATE).is_ok());
        assert!(ProgressStyle::with_template(SPINNER_TEMPLATE).is_ok());
    }

    #[test]
    fn test_visible_bar_tracks_position() {
        let tracker = ProgressTracker::new(Some(1000), true);
        tracker.update(500);
        assert_eq!(tracker.bar.as_ref().map(ProgressBar::position), Some(500));
        tracker.finish();
        assert_eq!(tracker.processed(), 500);
    }
}
