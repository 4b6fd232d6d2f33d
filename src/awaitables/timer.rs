//! Deadline waiting via the timer inbox

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use crate::event::TimerFilter;
use crate::session::Session;

/// Future completing once the wall clock reaches its deadline.
///
/// Arms the timer inbox with a deadline filter; the scheduler's timer driver
/// routes a tick at (or shortly after) the deadline, which the filter admits
/// and the resume predicate observes. A deadline already in the past never
/// suspends.
pub struct Sleep {
    session: Arc<Session>,
    deadline: Instant,
    installed: bool,
}

impl Sleep {
    pub(crate) fn new(session: Arc<Session>, deadline: Instant) -> Self {
        Self {
            session,
            deadline,
            installed: false,
        }
    }

    fn park(&self) {
        let session = Arc::clone(&self.session);
        self.session
            .park(Box::new(move || !session.timers().is_empty()), None);
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();

        if !this.installed {
            if Instant::now() >= this.deadline {
                return Poll::Ready(());
            }
            this.session
                .timers()
                .set_filter(TimerFilter::due_at(this.deadline));
            this.park();
            this.installed = true;
            return Poll::Pending;
        }

        match this.session.timers().pop() {
            Some(_tick) => {
                this.session.timers().set_filter(TimerFilter::new());
                Poll::Ready(())
            }
            None => {
                this.park();
                Poll::Pending
            }
        }
    }
}
