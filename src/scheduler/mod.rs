//! Scheduler: worker pool, ready queue and event routing
//!
//! The scheduler owns every live session, fans incoming events out through
//! one router per event kind, and drives runnable sessions on a pool of
//! worker tasks. A deadline-aware timer driver emits the ticks that satisfy
//! timer filters.

mod config;
mod core;

pub use self::core::{Scheduler, SchedulerStats};
pub use config::SchedulerConfig;
