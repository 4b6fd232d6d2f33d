//! Filtered FIFO inboxes owned by sessions

use std::collections::VecDeque;
use std::sync::Mutex;

use super::filter::{AdmissionFilter, EventFilter, TimerFilter};
use super::types::{CallbackQuery, MessageEvent, TimerEvent};

/// Inbox for chat messages.
pub type MessageQueue = EventQueue<MessageEvent>;
/// Inbox for callback queries.
pub type CallbackQueue = EventQueue<CallbackQuery>;
/// Inbox for timer ticks; gated by a deadline filter.
pub type TimerQueue = EventQueue<TimerEvent, TimerFilter>;

struct QueueState<T, F> {
    filter: F,
    items: VecDeque<T>,
    dirty: bool,
}

/// FIFO of events admitted by the queue's current filter.
///
/// The `dirty` flag tracks filter *identity* changes, not queue content: it
/// is raised by [`set_filter`](EventQueue::set_filter) and cleared only by
/// [`reset_changes`](EventQueue::reset_changes). Routers use it to reconcile
/// their subscription sets lazily after a session has run.
///
/// A fresh queue reports `has_changes() == true` so that the first
/// reconciliation pass always inspects it.
pub struct EventQueue<T, F = EventFilter<T>> {
    state: Mutex<QueueState<T, F>>,
}

impl<T, F> EventQueue<T, F>
where
    F: AdmissionFilter<T>,
{
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                filter: F::default(),
                items: VecDeque::new(),
                dirty: true,
            }),
        }
    }

    /// Replace the filter.
    ///
    /// Buffered events were admitted under the old filter and may not match
    /// the new consumer's expectations, so the queue is cleared first.
    pub fn set_filter(&self, filter: F) {
        let mut state = self.state.lock().unwrap();
        state.items.clear();
        state.filter = filter;
        state.dirty = true;
    }

    pub fn get_filter(&self) -> F {
        self.state.lock().unwrap().filter.clone()
    }

    /// Append the event if the current filter admits it; drop it silently
    /// otherwise. Never touches the dirty flag.
    pub fn push(&self, event: T) {
        let mut state = self.state.lock().unwrap();
        if state.filter.check(&event) {
            state.items.push_back(event);
        }
    }

    pub fn pop(&self) -> Option<T> {
        self.state.lock().unwrap().items.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().items.is_empty()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().items.clear();
    }

    pub fn has_changes(&self) -> bool {
        self.state.lock().unwrap().dirty
    }

    pub fn reset_changes(&self) {
        self.state.lock().unwrap().dirty = false;
    }
}

impl<T, F> Default for EventQueue<T, F>
where
    F: AdmissionFilter<T>,
{
    fn default() -> Self {
        Self::new()
    }
}
