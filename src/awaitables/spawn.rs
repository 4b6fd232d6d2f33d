//! Spawning child coroutines from inside a coroutine body

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::session::{Session, SessionTask};

/// Future handing a new coroutine to the scheduler via the session's adopt
/// upcall.
///
/// Yields exactly once: the hand-off happens on the first poll, then the
/// coroutine parks behind an always-true predicate so the worker's drive
/// loop continues it immediately.
pub struct SpawnTask {
    session: Arc<Session>,
    task: Option<SessionTask>,
}

impl SpawnTask {
    pub(crate) fn new(session: Arc<Session>, task: SessionTask) -> Self {
        Self {
            session,
            task: Some(task),
        }
    }
}

impl Future for SpawnTask {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        match this.task.take() {
            Some(task) => {
                this.session.spawn(task);
                this.session.park(Box::new(|| true), None);
                Poll::Pending
            }
            None => Poll::Ready(()),
        }
    }
}
