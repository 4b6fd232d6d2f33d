//! Awaitables: the suspend/resume protocols coroutine bodies await on
//!
//! Every awaitable follows the same skeleton: a cheap fast path, a first
//! poll that installs a filter into the relevant inbox and parks the
//! coroutine behind a resume predicate, and a resuming poll that pops the
//! value and disables the filter again so the router unsubscribes the
//! session on its next reconciliation.

mod blocking;
mod event_wait;
mod spawn;
mod timer;

pub use blocking::RunBlocking;
pub use event_wait::{EventWait, NextCallback, NextMessage};
pub use spawn::SpawnTask;
pub use timer::Sleep;
