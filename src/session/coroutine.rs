//! Resumable task state machine driven by manual polling

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};

use eyre::{Report, eyre};

/// Boxed future making up a coroutine body.
pub type TaskFuture = Pin<Box<dyn Future<Output = eyre::Result<()>> + Send + 'static>>;

/// Suspension predicate registered by an awaitable.
pub type WaitPredicate = Box<dyn Fn() -> bool + Send + 'static>;

/// Lifecycle states of a [`Coroutine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroState {
    /// No body installed.
    Null,
    /// Runnable; the next poll continues the body.
    Ready,
    /// Suspended on an awaitable; predicates decide when to leave.
    Wait,
    /// Ran to completion, or its abort predicate fired.
    Done,
    /// The body returned an error or panicked.
    Failed,
}

/// What a single poll of the body produced.
#[derive(Debug)]
pub(crate) enum PollOutcome {
    Completed,
    Suspended,
    Failed,
}

/// A cooperative, resumable task.
///
/// Created `Ready`; moves to `Wait` when an awaitable installs its predicates
/// via [`pause`](Coroutine::pause); leaves `Wait` lazily on the next
/// [`state`](Coroutine::state) refresh: `Done` if the abort predicate fires,
/// `Ready` if the resume predicate does. Completion yields `Done`; an error
/// yields `Failed` with the report retained until the driving worker
/// collects it.
pub struct Coroutine {
    future: Option<TaskFuture>,
    state: CoroState,
    resume_when: Option<WaitPredicate>,
    abort_when: Option<WaitPredicate>,
    failure: Option<Report>,
}

impl Coroutine {
    pub fn new(future: TaskFuture) -> Self {
        Self {
            future: Some(future),
            state: CoroState::Ready,
            resume_when: None,
            abort_when: None,
            failure: None,
        }
    }

    /// Coroutine with no body; permanently `Null`.
    pub fn empty() -> Self {
        Self {
            future: None,
            state: CoroState::Null,
            resume_when: None,
            abort_when: None,
            failure: None,
        }
    }

    /// Current state, refreshing a `Wait` against its predicates first.
    ///
    /// # Panics
    ///
    /// If the coroutine is in `Wait` with no resume predicate installed.
    /// That can only happen when a body awaits a foreign future that
    /// suspends without going through this crate's awaitables, which the
    /// execution model cannot support.
    pub fn state(&mut self) -> CoroState {
        self.refresh();
        self.state
    }

    fn refresh(&mut self) {
        if self.state != CoroState::Wait {
            return;
        }
        if self.resume_when.is_none() {
            panic!("coroutine is suspended but has no resume predicate");
        }
        if let Some(abort) = &self.abort_when
            && abort()
        {
            self.state = CoroState::Done;
            self.future = None;
            self.resume_when = None;
            self.abort_when = None;
            return;
        }
        if let Some(resume) = &self.resume_when
            && resume()
        {
            self.state = CoroState::Ready;
        }
    }

    /// Install suspension predicates and move to `Wait`.
    pub fn pause(&mut self, resume_when: WaitPredicate, abort_when: Option<WaitPredicate>) {
        self.resume_when = Some(resume_when);
        self.abort_when = abort_when;
        self.state = CoroState::Wait;
    }

    /// Poll the body once. Callers must have observed `Ready` first.
    ///
    /// Panics inside the body are caught here and converted into a failure
    /// so a misbehaving coroutine cannot take its worker down.
    pub(crate) fn poll_once(&mut self, cx: &mut Context<'_>) -> PollOutcome {
        let mut future = self.future.take().expect("ready coroutine has no body");
        match panic::catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(cx))) {
            Ok(Poll::Ready(Ok(()))) => {
                self.state = CoroState::Done;
                self.resume_when = None;
                self.abort_when = None;
                PollOutcome::Completed
            }
            Ok(Poll::Ready(Err(report))) => {
                self.state = CoroState::Failed;
                self.failure = Some(report);
                PollOutcome::Failed
            }
            Ok(Poll::Pending) => {
                self.future = Some(future);
                PollOutcome::Suspended
            }
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "opaque panic payload".to_string());
                self.state = CoroState::Failed;
                self.failure = Some(eyre!("coroutine panicked: {msg}"));
                PollOutcome::Failed
            }
        }
    }

    /// Take the retained failure report, if any.
    pub fn take_failure(&mut self) -> Option<Report> {
        self.failure.take()
    }

    /// Drop the body without running it, leaving the coroutine `Null`.
    /// Used at shutdown so pending bodies run their destructors.
    pub fn discard(&mut self) {
        self.future = None;
        self.resume_when = None;
        self.abort_when = None;
        if self.state == CoroState::Ready || self.state == CoroState::Wait {
            self.state = CoroState::Null;
        }
    }
}

impl Default for Coroutine {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::task::Waker;

    fn poll_ctx_run(coro: &mut Coroutine) -> PollOutcome {
        let waker = Waker::noop();
        let mut cx = Context::from_waker(waker);
        coro.poll_once(&mut cx)
    }

    #[test]
    fn test_empty_coroutine_is_null() {
        let mut coro = Coroutine::empty();
        assert_eq!(coro.state(), CoroState::Null);
    }

    #[test]
    fn test_simple_body_completes() {
        let mut coro = Coroutine::new(Box::pin(async { Ok(()) }));
        assert_eq!(coro.state(), CoroState::Ready);
        assert!(matches!(poll_ctx_run(&mut coro), PollOutcome::Completed));
        assert_eq!(coro.state(), CoroState::Done);
    }

    #[test]
    fn test_error_body_fails_with_report() {
        let mut coro = Coroutine::new(Box::pin(async { Err(eyre!("boom")) }));
        assert!(matches!(poll_ctx_run(&mut coro), PollOutcome::Failed));
        assert_eq!(coro.state(), CoroState::Failed);
        let report = coro.take_failure().unwrap();
        assert!(report.to_string().contains("boom"));
    }

    #[test]
    fn test_panicking_body_fails_with_report() {
        let mut coro = Coroutine::new(Box::pin(async { panic!("kaboom") }));
        assert!(matches!(poll_ctx_run(&mut coro), PollOutcome::Failed));
        assert_eq!(coro.state(), CoroState::Failed);
        let report = coro.take_failure().unwrap();
        assert!(report.to_string().contains("kaboom"));
    }

    #[test]
    fn test_pause_and_resume_predicate() {
        let flag = Arc::new(AtomicBool::new(false));
        let probe = Arc::clone(&flag);

        let mut coro = Coroutine::new(Box::pin(async { Ok(()) }));
        coro.pause(Box::new(move || probe.load(Ordering::SeqCst)), None);
        assert_eq!(coro.state(), CoroState::Wait);

        flag.store(true, Ordering::SeqCst);
        assert_eq!(coro.state(), CoroState::Ready);
    }

    #[test]
    fn test_abort_predicate_wins_over_resume() {
        let mut coro = Coroutine::new(Box::pin(async { Ok(()) }));
        coro.pause(Box::new(|| true), Some(Box::new(|| true)));
        assert_eq!(coro.state(), CoroState::Done);
    }

    #[test]
    #[should_panic(expected = "no resume predicate")]
    fn test_wait_without_predicate_is_fatal() {
        let mut coro = Coroutine::new(Box::pin(async { Ok(()) }));
        coro.pause(Box::new(|| false), None);
        coro.resume_when = None;
        coro.state();
    }

    #[test]
    fn test_discard_drops_body() {
        let dropped = Arc::new(AtomicBool::new(false));
        let probe = Arc::clone(&dropped);

        struct DropFlag(Arc<AtomicBool>);
        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let guard = DropFlag(probe);
        let mut coro = Coroutine::new(Box::pin(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
            Ok(())
        }));
        coro.discard();
        assert_eq!(coro.state(), CoroState::Null);
        assert!(dropped.load(Ordering::SeqCst));
    }
}
