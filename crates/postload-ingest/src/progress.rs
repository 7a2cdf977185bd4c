//! Progress reporting
//!
//! One line per merged batch plus one final summary. Reporters never fail;
//! a broken terminal must not abort an ingestion.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

pub trait ProgressReporter: Send {
    /// Report the cumulative number of merged records
    fn report(&mut self, cumulative: usize, context: &str);

    /// Emit the final summary of a successful run
    fn finish(&mut self, total: usize, source: &str);
}

/// Reports through `tracing` at info level
#[derive(Debug, Default)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn report(&mut self, cumulative: usize, context: &str) {
        info!("{} {}", cumulative, context);
    }

    fn finish(&mut self, total: usize, source: &str) {
        info!("{} records processed from {}", total, source);
    }
}

/// Terminal spinner counting merged records
pub struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    pub fn new(message: &str) -> Self {
        Self {
            bar: create_spinner(message),
        }
    }

    #[cfg(test)]
    fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

impl ProgressReporter for BarReporter {
    fn report(&mut self, cumulative: usize, context: &str) {
        self.bar.set_position(cumulative as u64);
        self.bar.set_message(context.to_string());
    }

    fn finish(&mut self, total: usize, source: &str) {
        self.bar.set_position(total as u64);
        self.bar
            .finish_with_message(format!("{} records processed from {}", total, source));
        info!("{} records processed from {}", total, source);
    }
}

impl Drop for BarReporter {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.abandon();
        }
    }
}

/// Spinner with a running record count
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_reporter_tracks_cumulative_count() {
        let mut reporter = BarReporter::hidden();
        reporter.report(1000, "read variants with vep annotations");
        reporter.report(2000, "read variants with vep annotations");
        assert_eq!(reporter.bar.position(), 2000);

        reporter.finish(2500, "/data/clinical.vep");
        assert_eq!(reporter.bar.position(), 2500);
        assert!(reporter.bar.is_finished());
    }

    #[test]
    fn test_log_reporter_never_fails() {
        let mut reporter = LogReporter;
        reporter.report(0, "read variants with vep annotations");
        reporter.finish(0, "empty.vep");
    }
}
