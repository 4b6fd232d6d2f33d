//! Sessions: per-coroutine execution contexts
//!
//! A [`Session`] bundles one resumable [`Coroutine`] with a typed inbox per
//! event kind and the upcalls back into the scheduler. Coroutine bodies
//! receive a [`SessionHandle`] as their first argument and reach the rest of
//! the crate exclusively through it.

mod coroutine;
mod core;
mod handle;

pub use self::core::{SchedulerHooks, Session, SessionTask};
pub use coroutine::{CoroState, Coroutine, TaskFuture, WaitPredicate};
pub use handle::SessionHandle;

#[cfg(test)]
pub(crate) use self::core::test_support;
