//! Outer bot layer: update dispatch and command registration
//!
//! Wraps a [`Scheduler`](crate::scheduler::Scheduler) for hosts that consume
//! a platform long-poll loop: every update is routed to waiting sessions,
//! and recognized command prefixes additionally spawn their registered
//! coroutines.

mod core;

pub use self::core::{Dispatcher, Update};
