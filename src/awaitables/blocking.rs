//! Offloading blocking work to a dedicated thread

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};

use tracing::warn;

use crate::session::Session;

type ResultSlot<R> = Arc<Mutex<Option<thread::Result<R>>>>;

/// Future running a closure on its own thread and resolving to the result.
///
/// The first poll launches the thread and parks the coroutine behind
/// "result present"; the thread stores its result under the slot mutex and
/// wakes the session. The resuming poll joins the thread and returns the
/// value. At most one call is in flight per await point and the call cannot
/// be cancelled once started. A panic inside the closure is re-raised at the
/// await site, where the executor turns it into a coroutine failure.
pub struct RunBlocking<R> {
    session: Arc<Session>,
    job: Option<Box<dyn FnOnce() -> R + Send + 'static>>,
    result: ResultSlot<R>,
    worker: Option<JoinHandle<()>>,
}

impl<R> RunBlocking<R>
where
    R: Send + 'static,
{
    pub(crate) fn new<F>(session: Arc<Session>, job: F) -> Self
    where
        F: FnOnce() -> R + Send + 'static,
    {
        Self {
            session,
            job: Some(Box::new(job)),
            result: Arc::new(Mutex::new(None)),
            worker: None,
        }
    }

    fn park(&self) {
        let slot = Arc::clone(&self.result);
        self.session
            .park(Box::new(move || slot.lock().unwrap().is_some()), None);
    }
}

impl<R> Future for RunBlocking<R>
where
    R: Send + 'static,
{
    type Output = R;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<R> {
        let this = self.get_mut();

        if let Some(job) = this.job.take() {
            let slot = Arc::clone(&this.result);
            let session = Arc::clone(&this.session);
            this.worker = Some(thread::spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(job));
                *slot.lock().unwrap() = Some(outcome);
                session.wake();
            }));
            this.park();
            return Poll::Pending;
        }

        let outcome = this.result.lock().unwrap().take();
        match outcome {
            Some(outcome) => {
                if let Some(worker) = this.worker.take()
                    && worker.join().is_err()
                {
                    warn!("blocking worker thread terminated abnormally");
                }
                match outcome {
                    Ok(value) => Poll::Ready(value),
                    Err(payload) => panic::resume_unwind(payload),
                }
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
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn drive_to_completion(session: &Arc<Session>) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            while session.try_resume().unwrap() {}
            match session.status() {
                CoroState::Done | CoroState::Failed => break,
                _ => {
                    assert!(std::time::Instant::now() < deadline, "blocking call never finished");
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }

    #[test]
    fn test_returns_value_and_wakes_session() {
        let observed = Arc::new(Mutex::new(None));
        let probe = Arc::clone(&observed);

        let (session, hooks) = session_with_hooks(Box::new(move |handle: SessionHandle| {
            Box::pin(async move {
                let value = handle.run_blocking(|| 5).await;
                *probe.lock().unwrap() = Some(value);
                Ok(())
            })
        }));

        assert_eq!(session.status(), CoroState::Ready);
        assert!(session.try_resume().unwrap());

        drive_to_completion(&session);
        assert_eq!(*observed.lock().unwrap(), Some(5));
        assert!(hooks.wakes.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_side_effect_runs_exactly_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let probe = Arc::clone(&count);

        let (session, _) = session_with_hooks(Box::new(move |handle: SessionHandle| {
            Box::pin(async move {
                handle
                    .run_blocking(move || {
                        probe.fetch_add(1, Ordering::SeqCst);
                    })
                    .await;
                Ok(())
            })
        }));

        drive_to_completion(&session);
        assert_eq!(session.status(), CoroState::Done);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_job_fails_the_coroutine() {
        let (session, _) = session_with_hooks(Box::new(|handle: SessionHandle| {
            Box::pin(async move {
                handle.run_blocking(|| -> u32 { panic!("job blew up") }).await;
                Ok(())
            })
        }));

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let report = loop {
            match session.try_resume() {
                Ok(_) => {
                    assert!(std::time::Instant::now() < deadline, "failure never surfaced");
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(report) => break report,
            }
        };
        assert!(report.to_string().contains("job blew up"));
        assert_eq!(session.status(), CoroState::Failed);
    }
}
