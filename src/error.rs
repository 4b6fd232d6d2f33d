//! Library error types

use thiserror::Error;

/// Errors returned by the scheduler facade
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The scheduler has begun shutting down and no longer adopts coroutines.
    #[error("scheduler is shut down")]
    ShutDown,
}
