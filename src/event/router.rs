//! Per-kind fan-out of incoming events to subscribed sessions

use std::sync::{Arc, Mutex};

use tracing::debug;

use super::filter::AdmissionFilter;
use super::queue::EventQueue;
use crate::session::Session;

/// Selects which inbox on a [`Session`] a router governs.
type InboxAccessor<T, F> = fn(&Session) -> &EventQueue<T, F>;

/// Fan-out mechanism for one event kind.
///
/// Holds the set of sessions whose inbox of this kind currently carries an
/// enabled filter. Filters are owned by whichever awaitable the session's
/// coroutine is suspended on and change on every suspend/resume; the router
/// learns about those changes lazily when the scheduler calls
/// [`update`](EventRouter::update) after driving the session.
pub struct EventRouter<T, F> {
    sessions: Mutex<Vec<Arc<Session>>>,
    inbox: InboxAccessor<T, F>,
}

impl<T, F> EventRouter<T, F>
where
    T: Clone,
    F: AdmissionFilter<T>,
{
    /// Create a router bound to one inbox accessor, e.g.
    /// `EventRouter::new(Session::messages)`.
    pub fn new(inbox: InboxAccessor<T, F>) -> Self {
        debug!("EventRouter::new: called");
        Self {
            sessions: Mutex::new(Vec::new()),
            inbox,
        }
    }

    /// Reconcile the subscription entry for `session` from its inbox's
    /// dirty bit. No-op while the bit is clear.
    pub fn update(&self, session: &Arc<Session>) {
        debug!(session = %session.id(), "EventRouter::update: called");
        let queue = (self.inbox)(session);
        if !queue.has_changes() {
            return;
        }

        let mut sessions = self.sessions.lock().unwrap();
        sessions.retain(|s| s.id() != session.id());
        if queue.get_filter().is_enabled() {
            debug!(session = %session.id(), "router: subscribing");
            sessions.push(Arc::clone(session));
        } else {
            debug!(session = %session.id(), "router: unsubscribed");
        }
        queue.reset_changes();
    }

    /// Drop the session from the subscription set, used on session teardown.
    pub fn remove(&self, session: &Session) {
        debug!(session = %session.id(), "EventRouter::remove: called");
        self.sessions.lock().unwrap().retain(|s| s.id() != session.id());
    }

    /// Deliver one event: push it into every subscribed session's inbox
    /// (each inbox's filter has the final say) and wake the session.
    ///
    /// Ordering across sessions is unspecified; within one inbox it is FIFO.
    pub fn route(&self, event: &T) {
        debug!("EventRouter::route: called");
        let sessions = self.sessions.lock().unwrap();
        debug!(subscribers = sessions.len(), "router: routing event");
        for session in sessions.iter() {
            (self.inbox)(session).push(event.clone());
            session.wake();
        }
    }

    /// Number of currently subscribed sessions.
    pub fn subscriber_count(&self) -> usize {
        debug!("EventRouter::subscriber_count: called");
        self.sessions.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventFilter, MessageEvent};
    use crate::session::test_support::session_with_hooks;
    use crate::session::SessionHandle;
    use std::sync::atomic::Ordering;

    fn waiting_session() -> std::sync::Arc<Session> {
        let (session, _) = session_with_hooks(Box::new(|handle: SessionHandle| {
            Box::pin(async move {
                let _msg = handle.next_message(EventFilter::accept_all()).await;
                Ok(())
            })
        }));
        session
    }

    #[test]
    fn test_update_subscribes_enabled_filters_only() {
        let router = EventRouter::new(Session::messages);
        let session = waiting_session();

        // Fresh queue is dirty with a disabled filter: not subscribed.
        router.update(&session);
        assert_eq!(router.subscriber_count(), 0);
        assert!(!session.messages().has_changes());

        // Suspending installs an enabled filter and re-dirties the queue.
        assert!(session.try_resume().unwrap());
        router.update(&session);
        assert_eq!(router.subscriber_count(), 1);
        assert!(!session.messages().has_changes());

        // Clean queue: update is a no-op, no duplicate entries.
        router.update(&session);
        assert_eq!(router.subscriber_count(), 1);
    }

    #[test]
    fn test_route_delivers_and_wakes() {
        let router = EventRouter::new(Session::messages);
        let (session, hooks) = session_with_hooks(Box::new(|handle: SessionHandle| {
            Box::pin(async move {
                let _msg = handle.next_message(EventFilter::accept_all()).await;
                Ok(())
            })
        }));

        assert!(session.try_resume().unwrap());
        router.update(&session);

        router.route(&MessageEvent::new(1, 1, 7, "hi"));
        assert!(!session.messages().is_empty());
        assert_eq!(hooks.wakes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_is_unconditional() {
        let router = EventRouter::new(Session::messages);
        let session = waiting_session();

        assert!(session.try_resume().unwrap());
        router.update(&session);
        assert_eq!(router.subscriber_count(), 1);

        router.remove(&session);
        assert_eq!(router.subscriber_count(), 0);

        // Removing an absent session is fine.
        router.remove(&session);
        assert_eq!(router.subscriber_count(), 0);
    }
}
