//! Process-wide counters for a run.
//!
//! Counters are bumped silently at the call site; [`Metrics::flush`] emits
//! them as one `info!` event, normally when the run ends.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    trials_run: AtomicU64,
    fitness_replayed: AtomicU64,
    episodes_started: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            trials_run: AtomicU64::new(0),
            fitness_replayed: AtomicU64::new(0),
            episodes_started: AtomicU64::new(0),
        }
    }

    /// One trial ran to completion on the devices.
    pub fn inc_trials(&self) {
        self.trials_run.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "trials_run", "counter incremented");
    }

    /// `count` fitness values were answered from the logs instead of live trials.
    pub fn add_replayed(&self, count: u64) {
        self.fitness_replayed.fetch_add(count, Ordering::Relaxed);
        tracing::trace!(metric = "fitness_replayed", count, "counter incremented");
    }

    pub fn inc_episodes(&self) {
        self.episodes_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "episodes_started", "counter incremented");
    }

    /// Emit all counters as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            trials_run = self.trials_run(),
            fitness_replayed = self.fitness_replayed(),
            episodes_started = self.episodes_started(),
        );
    }

    pub fn trials_run(&self) -> u64 {
        self.trials_run.load(Ordering::Relaxed)
    }

    pub fn fitness_replayed(&self) -> u64 {
        self.fitness_replayed.load(Ordering::Relaxed)
    }

    pub fn episodes_started(&self) -> u64 {
        self.episodes_started.load(Ordering::Relaxed)
    }
}
