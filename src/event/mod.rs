//! Typed events, admission filters, per-session inboxes and routers
//!
//! The routing core is generic over the event payload: a [`EventFilter`]
//! gates what a session's inbox accepts, an [`EventQueue`] buffers admitted
//! events in FIFO order, and an [`EventRouter`] fans one incoming event out
//! to every session whose inbox currently admits it.

mod filter;
mod queue;
mod router;
mod types;

pub use filter::{AdmissionFilter, EventFilter, TimerFilter};
pub use queue::{CallbackQueue, EventQueue, MessageQueue, TimerQueue};
pub use router::EventRouter;
pub use types::{CallbackQuery, MessageEvent, TimerEvent};
