//! Handle passed into coroutine bodies
//!
//! The handle is the only way a body reaches its session: awaitable
//! constructors, child-coroutine spawning and blocking offload all go
//! through it. It deliberately exposes nothing that would let a body drive
//! itself.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::core::{Session, SessionTask};
use crate::awaitables::{NextCallback, NextMessage, RunBlocking, Sleep, SpawnTask};
use crate::event::{CallbackQuery, EventFilter, MessageEvent};

/// Cloneable reference to the session owning the current coroutine.
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Session>,
}

impl SessionHandle {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub(crate) fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Await the next message admitted by `filter`.
    pub fn next_message(&self, filter: EventFilter<MessageEvent>) -> NextMessage {
        NextMessage::new(Arc::clone(&self.session), filter)
    }

    /// Await the next message sent by `user_id`.
    pub fn message_from(&self, user_id: i64) -> NextMessage {
        self.next_message(EventFilter::matching(move |m: &MessageEvent| {
            m.from_id == user_id
        }))
    }

    /// Await the next message posted in `chat_id`.
    pub fn message_in_chat(&self, chat_id: i64) -> NextMessage {
        self.next_message(EventFilter::matching(move |m: &MessageEvent| {
            m.chat_id == chat_id
        }))
    }

    /// Await the next message sent by `user_id` in `chat_id`.
    pub fn message_from_chat(&self, user_id: i64, chat_id: i64) -> NextMessage {
        self.next_message(EventFilter::matching(move |m: &MessageEvent| {
            m.from_id == user_id && m.chat_id == chat_id
        }))
    }

    /// Await the next callback query admitted by `filter`.
    pub fn next_callback(&self, filter: EventFilter<CallbackQuery>) -> NextCallback {
        NextCallback::new(Arc::clone(&self.session), filter)
    }

    /// Await the next callback query whose data starts with `prefix`.
    pub fn callback_prefixed(&self, prefix: impl Into<String>) -> NextCallback {
        let prefix = prefix.into();
        self.next_callback(EventFilter::matching(move |q: &CallbackQuery| {
            q.data.starts_with(&prefix)
        }))
    }

    /// Await the next callback query attached to `message_id`.
    pub fn callback_for_message(&self, message_id: i64) -> NextCallback {
        self.next_callback(EventFilter::matching(move |q: &CallbackQuery| {
            q.message_id == message_id
        }))
    }

    /// Await the next callback query on `message_id` whose data starts with
    /// `prefix`.
    pub fn callback_prefixed_for(&self, prefix: impl Into<String>, message_id: i64) -> NextCallback {
        let prefix = prefix.into();
        self.next_callback(EventFilter::matching(move |q: &CallbackQuery| {
            q.message_id == message_id && q.data.starts_with(&prefix)
        }))
    }

    /// Suspend until at least `duration` has elapsed.
    pub fn sleep_for(&self, duration: Duration) -> Sleep {
        self.sleep_until(Instant::now() + duration)
    }

    /// Suspend until the wall clock reaches `deadline`.
    pub fn sleep_until(&self, deadline: Instant) -> Sleep {
        Sleep::new(Arc::clone(&self.session), deadline)
    }

    /// Hand a new coroutine to the scheduler, then yield once so the current
    /// coroutine is re-driven immediately.
    pub fn spawn<F, Fut>(&self, f: F) -> SpawnTask
    where
        F: FnOnce(SessionHandle) -> Fut + Send + 'static,
        Fut: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        let task: SessionTask = Box::new(move |handle| Box::pin(f(handle)));
        SpawnTask::new(Arc::clone(&self.session), task)
    }

    /// Run `f` on a dedicated thread and suspend until its result is ready.
    ///
    /// One call is in flight per await point; the thread is joined when the
    /// coroutine resumes. There is no way to cancel the call once started.
    pub fn run_blocking<F, R>(&self, f: F) -> RunBlocking<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        RunBlocking::new(Arc::clone(&self.session), f)
    }
}
