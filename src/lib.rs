//! botloop - cooperative coroutine scheduler with filtered event routing
//!
//! botloop is the core of a long-lived conversational bot: coroutine bodies
//! suspend until an event matching their filter arrives on their session's
//! inbox (or until a deadline passes), and a pool of workers resumes exactly
//! the sessions whose predicates have become satisfiable.
//!
//! # Core Concepts
//!
//! - **Session**: per-coroutine execution context owning one typed inbox per
//!   event kind and the coroutine itself
//! - **Filter**: boolean gate (enabled bit plus optional refinement)
//!   installed by whichever awaitable the coroutine is suspended on
//! - **Router**: per-kind fan-out delivering each incoming event into every
//!   subscribed session's inbox, reconciled lazily from the inbox dirty bit
//! - **Awaitable**: suspend/resume protocol a coroutine body awaits on;
//!   installs the filter and a resume predicate, pops the value on resume
//!
//! # Modules
//!
//! - [`awaitables`] - Futures coroutine bodies suspend on
//! - [`dispatch`] - Outer bot layer: command registry and update dispatch
//! - [`event`] - Event payloads, filters, inboxes and routers
//! - [`scheduler`] - Worker pool, ready queue and timer driver
//! - [`session`] - Per-coroutine execution contexts

pub mod awaitables;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod scheduler;
pub mod session;

// Re-export commonly used types
pub use awaitables::{EventWait, NextCallback, NextMessage, RunBlocking, Sleep, SpawnTask};
pub use dispatch::{Dispatcher, Update};
pub use error::SchedulerError;
pub use event::{
    AdmissionFilter, CallbackQuery, EventFilter, EventQueue, EventRouter, MessageEvent,
    TimerEvent, TimerFilter,
};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerStats};
pub use session::{CoroState, Coroutine, SchedulerHooks, Session, SessionHandle, SessionTask};
