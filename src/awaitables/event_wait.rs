//! Waiting on filtered event inboxes

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use crate::event::{
    AdmissionFilter, CallbackQuery, EventFilter, EventQueue, MessageEvent, TimerFilter,
};
use crate::session::{Session, WaitPredicate};

/// Await the next message the installed filter admits.
pub type NextMessage = EventWait<MessageEvent, EventFilter<MessageEvent>>;
/// Await the next callback query the installed filter admits.
pub type NextCallback = EventWait<CallbackQuery, EventFilter<CallbackQuery>>;

/// Future resolving to the next event admitted into one of the session's
/// inboxes.
///
/// The first poll installs the filter (which clears the inbox and raises its
/// dirty bit) and parks the coroutine behind "inbox not empty". The resuming
/// poll pops the event and restores the disabled default filter. A spurious
/// wakeup that finds the inbox empty simply parks again.
pub struct EventWait<T, F> {
    session: Arc<Session>,
    inbox: fn(&Session) -> &EventQueue<T, F>,
    filter: Option<F>,
    give_up_at: Option<Instant>,
    installed: bool,
}

impl NextMessage {
    pub(crate) fn new(session: Arc<Session>, filter: EventFilter<MessageEvent>) -> Self {
        Self {
            session,
            inbox: Session::messages,
            filter: Some(filter),
            give_up_at: None,
            installed: false,
        }
    }
}

impl NextCallback {
    pub(crate) fn new(session: Arc<Session>, filter: EventFilter<CallbackQuery>) -> Self {
        Self {
            session,
            inbox: Session::callbacks,
            filter: Some(filter),
            give_up_at: None,
            installed: false,
        }
    }
}

impl<T, F> EventWait<T, F>
where
    T: Send + 'static,
    F: AdmissionFilter<T>,
{
    /// Abort the owning coroutine if no matching event has arrived by
    /// `deadline`.
    ///
    /// Installs an abort predicate alongside the resume predicate and a
    /// deadline filter on the timer inbox, so the timer driver is guaranteed
    /// to wake the session at `deadline` even if no event ever matches. On
    /// abort the coroutine transitions to `Done` on its next state refresh;
    /// this await point never resolves.
    pub fn give_up_at(mut self, deadline: Instant) -> Self {
        self.give_up_at = Some(deadline);
        self
    }

    fn park(&self) {
        let session = Arc::clone(&self.session);
        let inbox = self.inbox;
        let resume: WaitPredicate = Box::new(move || !inbox(&session).is_empty());
        let abort: Option<WaitPredicate> = self
            .give_up_at
            .map(|deadline| -> WaitPredicate { Box::new(move || Instant::now() >= deadline) });
        self.session.park(resume, abort);
    }
}

impl<T, F> Future for EventWait<T, F>
where
    T: Send + 'static,
    F: AdmissionFilter<T> + Unpin,
{
    type Output = T;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();

        if !this.installed {
            let filter = this.filter.take().unwrap_or_default();
            (this.inbox)(&this.session).set_filter(filter);
            if let Some(deadline) = this.give_up_at {
                this.session.timers().set_filter(TimerFilter::due_at(deadline));
            }
            this.park();
            this.installed = true;
            return Poll::Pending;
        }

        match (this.inbox)(&this.session).pop() {
            Some(event) => {
                (this.inbox)(&this.session).set_filter(F::default());
                if this.give_up_at.is_some() {
                    this.session.timers().set_filter(TimerFilter::new());
                }
                Poll::Ready(event)
            }
            None => {
                this.park();
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_support::session_with_hooks;
    use crate::session::{CoroState, SessionHandle};

    #[test]
    fn test_message_wait_full_lifecycle() {
        let (session, _) = session_with_hooks(Box::new(|handle: SessionHandle| {
            Box::pin(async move {
                let msg = handle.message_from(42).await;
                assert_eq!(msg.text, "hello");
                Ok(())
            })
        }));

        session.messages().reset_changes();
        assert!(session.try_resume().unwrap());
        assert!(session.messages().has_changes());
        assert_eq!(session.status(), CoroState::Wait);

        // Non-matching sender is dropped by the filter.
        session.messages().push(MessageEvent::new(1, 1, 7, "hello"));
        assert_eq!(session.status(), CoroState::Wait);

        session.messages().push(MessageEvent::new(2, 1, 42, "hello"));
        assert_eq!(session.status(), CoroState::Ready);

        while session.try_resume().unwrap() {}
        assert_eq!(session.status(), CoroState::Done);
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_resume_disables_own_filter() {
        let (session, _) = session_with_hooks(Box::new(|handle: SessionHandle| {
            Box::pin(async move {
                let _msg = handle.next_message(EventFilter::accept_all()).await;
                Ok(())
            })
        }));

        assert!(session.try_resume().unwrap());
        session.messages().push(MessageEvent::new(1, 1, 1, "hi"));
        while session.try_resume().unwrap() {}

        // Filter restored to the rejecting default on resume.
        assert!(!session.messages().get_filter().is_enabled());
        assert!(session.messages().has_changes());
    }

    #[test]
    fn test_callback_prefix_filter() {
        let (session, _) = session_with_hooks(Box::new(|handle: SessionHandle| {
            Box::pin(async move {
                let query = handle.callback_prefixed("buy:").await;
                assert_eq!(query.data, "buy:42");
                Ok(())
            })
        }));

        assert!(session.try_resume().unwrap());
        assert_eq!(session.status(), CoroState::Wait);

        session.callbacks().push(CallbackQuery::new("q1", 1, 10, "sell:1"));
        assert_eq!(session.status(), CoroState::Wait);
        assert!(session.callbacks().is_empty());

        session.callbacks().push(CallbackQuery::new("q2", 1, 10, "buy:42"));
        while session.try_resume().unwrap() {}
        assert_eq!(session.status(), CoroState::Done);
    }

    #[test]
    fn test_give_up_at_aborts_coroutine() {
        use std::time::Duration;

        let (session, _) = session_with_hooks(Box::new(|handle: SessionHandle| {
            Box::pin(async move {
                let _msg = handle
                    .message_from(42)
                    .give_up_at(Instant::now() - Duration::from_millis(1))
                    .await;
                unreachable!("the deadline is already past");
            })
        }));

        assert!(session.try_resume().unwrap());
        // Deadline filter armed on the timer inbox for the driver to see.
        assert!(session.timers().get_filter().is_enabled());
        // Abort predicate already true: next refresh finishes the coroutine.
        assert_eq!(session.status(), CoroState::Done);
    }
}
