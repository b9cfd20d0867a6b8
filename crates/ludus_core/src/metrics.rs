//! Run metrics and structured logging.
//!
//! Counts what happened during a run and emits periodic progress through
//! `tracing`.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Events between two progress log lines.
pub const PROGRESS_INTERVAL: u64 = 100_000;

/// Counters of one simulated population.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub events: u64,
    /// Events that changed at least one trait, or no-op updates when those
    /// are committed too.
    pub commits: u64,
    pub flips: u64,
    pub mutations: u64,
    pub migrations: u64,
    /// Events skipped while waiting for a migration or mutation.
    pub skipped_events: u64,
}

impl RunMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `count` elapsed events, logging progress at every interval.
    pub fn record_events(&mut self, count: u64, time: f64) {
        let before = self.events / PROGRESS_INTERVAL;
        self.events += count;
        if self.events / PROGRESS_INTERVAL > before {
            tracing::info!(
                events = self.events,
                time = time,
                commits = self.commits,
                mutations = self.mutations,
                migrations = self.migrations,
                "Simulation progress"
            );
        }
    }

    pub fn record_commit(&mut self, flips: usize) {
        self.commits += 1;
        self.flips += flips as u64;
    }

    /// Fraction of events that changed the population.
    #[must_use]
    pub fn commit_ratio(&self) -> f64 {
        if self.events == 0 {
            0.0
        } else {
            self.commits as f64 / self.events as f64
        }
    }
}

/// Wall-clock timer for a batch of runs.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::start()
    }
}

impl Stopwatch {
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Initialize tracing subscriber for logging. `RUST_LOG` overrides the
/// default `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(filter)
            .finish(),
    )
    .ok();
}
