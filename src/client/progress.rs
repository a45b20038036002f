use crate::client::constants::PROGRESS_TICK_INTERVAL_MS;
use crate::client::error::{ClientError, Result};
use crate::client::statistics::PooledStats;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Per-generation progress bar counting joined workers. Draws to stderr.
///
/// Clones share the same bar.
#[derive(Clone)]
pub struct ProgressTracker {
    pb: ProgressBar,
}

impl ProgressTracker {
    /// Create a progress tracker; a quiet tracker never draws
    pub fn new(quiet: bool) -> Result<Self> {
        let pb = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr())
        };
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner} {msg} {bar:30.cyan/blue} {pos}/{len} workers [{elapsed_precise}]",
            )
            .map_err(|e| {
                ClientError::Measurement(format!("Failed to create progress style: {}", e))
            })?
            .progress_chars("█░"),
        );
        Ok(Self { pb })
    }

    /// Reset the bar for a new generation
    pub fn start_generation(&self, generation: usize, workers: usize, per_worker_budget: u64) {
        self.pb.reset();
        self.pb.set_length(workers as u64);
        self.pb.set_message(format!(
            "generation {}: {} rounds/worker",
            generation, per_worker_budget
        ));
        self.pb
            .enable_steady_tick(Duration::from_millis(PROGRESS_TICK_INTERVAL_MS));
    }

    pub fn worker_joined(&self) {
        self.pb.inc(1);
    }

    /// Show the pooled estimate once the generation has been absorbed
    pub fn finish_generation(&self, pooled: &PooledStats) {
        self.pb.disable_steady_tick();
        self.pb.set_message(format!(
            "mean {:.2}us ± {:.2}us",
            pooled.mean / 1000.0,
            pooled.stddev / 1000.0
        ));
    }

    /// Hide the bar while `f` writes to the terminal
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.pb.suspend(f)
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}
