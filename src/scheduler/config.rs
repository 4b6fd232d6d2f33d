//! Scheduler configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of worker tasks driving ready sessions
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Fallback timer tick cadence in milliseconds; the timer driver wakes
    /// earlier whenever a session deadline is due sooner
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Initial capacity hint for the ready queue
    #[serde(default = "default_ready_capacity")]
    pub ready_capacity: usize,
}

fn default_workers() -> usize {
    debug!("default_workers: called");
    4
}

fn default_tick_interval_ms() -> u64 {
    debug!("default_tick_interval_ms: called");
    1000
}

fn default_ready_capacity() -> usize {
    debug!("default_ready_capacity: called");
    64
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        debug!("SchedulerConfig::default: called");
        Self {
            workers: 4,
            tick_interval_ms: 1000,
            ready_capacity: 64,
        }
    }
}

impl SchedulerConfig {
    /// Configuration with the given worker count and default tick cadence.
    pub fn with_workers(workers: usize) -> Self {
        debug!(workers, "SchedulerConfig::with_workers: called");
        Self {
            workers,
            ..Default::default()
        }
    }

    /// Get the fallback tick cadence as a Duration
    pub fn tick_interval(&self) -> Duration {
        debug!(%self.tick_interval_ms, "SchedulerConfig::tick_interval: called");
        Duration::from_millis(self.tick_interval_ms)
    }
}
