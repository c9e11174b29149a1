//! Progress reporting for the scan pool.

use indicatif::{ProgressBar, ProgressStyle};

/// Receives `(completed, total)` once per finished job.
pub trait ProgressSink {
    fn advance(&mut self, completed: usize, total: usize);

    /// Called once after the last job.
    fn finish(&mut self) {}
}

/// Discards progress.
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn advance(&mut self, _completed: usize, _total: usize) {}
}

impl ProgressSink for ProgressBar {
    fn advance(&mut self, completed: usize, total: usize) {
        self.set_length(total as u64);
        self.set_position(completed as u64);
    }

    fn finish(&mut self) {
        ProgressBar::finish(self);
    }
}

/// Bar used while sweeping one network: `Progress [█████---] 42%`.
pub fn sweep_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    match ProgressStyle::with_template("Progress [{bar:30}] {percent:>3}%") {
        Ok(style) => bar.set_style(style.progress_chars("█-")),
        Err(e) => tracing::debug!(error = %e, "Falling back to default progress style"),
    }
    bar
}

/// Records every report; used by tests.
#[derive(Debug, Default)]
pub struct RecordedProgress(pub Vec<(usize, usize)>);

impl ProgressSink for RecordedProgress {
    fn advance(&mut self, completed: usize, total: usize) {
        self.0.push((completed, total));
    }
}
