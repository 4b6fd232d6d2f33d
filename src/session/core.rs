//! Session implementation: coroutine slot, inboxes, scheduler upcalls

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Wake, Waker};

use tracing::debug;

use super::coroutine::{CoroState, Coroutine, PollOutcome, TaskFuture, WaitPredicate};
use super::handle::SessionHandle;
use crate::event::{CallbackQueue, MessageQueue, TimerQueue};

/// A coroutine body not yet adopted by a session: given the handle of the
/// session that will own it, it produces the boxed body.
pub type SessionTask = Box<dyn FnOnce(SessionHandle) -> TaskFuture + Send + 'static>;

/// Upcalls a session makes into its scheduler.
///
/// `wake` enqueues the session onto the ready queue; `adopt` registers a
/// freshly created coroutine as a new session. Tests substitute counting
/// implementations to observe both.
pub trait SchedulerHooks: Send + Sync + 'static {
    fn wake(&self, session: &Arc<Session>);
    fn adopt(&self, task: SessionTask);
}

/// Predicates handed over by an awaitable mid-poll, picked up by
/// [`Session::try_resume`] once the poll returns `Pending`.
struct Park {
    resume_when: WaitPredicate,
    abort_when: Option<WaitPredicate>,
}

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Per-coroutine execution context.
///
/// Owns the coroutine, one inbox per event kind, and the upcalls back into
/// the scheduler. The coroutine mutex guarantees at most one resumption in
/// flight; each inbox carries its own lock so routers can push while the
/// session is being driven.
pub struct Session {
    id: u64,
    coroutine: Mutex<Coroutine>,
    park: Mutex<Option<Park>>,
    queued: AtomicBool,
    messages: MessageQueue,
    callbacks: CallbackQueue,
    timers: TimerQueue,
    hooks: Arc<dyn SchedulerHooks>,
}

impl Session {
    /// Build a session around `task`, handing it this session's handle.
    pub fn create(task: SessionTask, hooks: Arc<dyn SchedulerHooks>) -> Arc<Self> {
        debug!("Session::create: called");
        let session = Arc::new(Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            coroutine: Mutex::new(Coroutine::empty()),
            park: Mutex::new(None),
            queued: AtomicBool::new(false),
            messages: MessageQueue::new(),
            callbacks: CallbackQueue::new(),
            timers: TimerQueue::new(),
            hooks,
        });
        let body = task(SessionHandle::new(Arc::clone(&session)));
        *session.coroutine.lock().unwrap() = Coroutine::new(body);
        session
    }

    pub fn id(&self) -> u64 {
        debug!(session = %self.id, "Session::id: called");
        self.id
    }

    /// Current coroutine state, refreshed against its predicates.
    pub fn status(&self) -> CoroState {
        debug!(session = %self.id, "Session::status: called");
        self.coroutine.lock().unwrap().state()
    }

    /// Drive the coroutine one step.
    ///
    /// Returns `Ok(false)` when the coroutine was not `Ready` on entry (the
    /// caller should stop driving), `Ok(true)` after a successful resumption,
    /// and `Err` exactly once when the body just failed; the worker logs the
    /// report and tears the session down.
    pub fn try_resume(self: &Arc<Self>) -> eyre::Result<bool> {
        debug!(session = %self.id, "Session::try_resume: called");
        let mut coro = self.coroutine.lock().unwrap();
        if coro.state() != CoroState::Ready {
            return Ok(false);
        }

        self.park.lock().unwrap().take();
        let waker = Waker::from(Arc::new(SessionWaker(Arc::clone(self))));
        let mut cx = Context::from_waker(&waker);

        match coro.poll_once(&mut cx) {
            PollOutcome::Completed => Ok(true),
            PollOutcome::Failed => {
                let report = coro
                    .take_failure()
                    .unwrap_or_else(|| eyre::eyre!("coroutine failed without a report"));
                Err(report)
            }
            PollOutcome::Suspended => {
                match self.park.lock().unwrap().take() {
                    Some(park) => coro.pause(park.resume_when, park.abort_when),
                    None => panic!("coroutine suspended without installing a resume predicate"),
                }
                Ok(true)
            }
        }
    }

    /// Enqueue this session onto the scheduler's ready queue.
    ///
    /// Idempotent while the session is already pending: the queued flag is
    /// cleared by the worker that eventually pops it.
    pub fn wake(self: &Arc<Self>) {
        debug!(session = %self.id, "Session::wake: called");
        if !self.queued.swap(true, Ordering::AcqRel) {
            self.hooks.wake(self);
        }
    }

    /// Hand a new coroutine to the scheduler for adoption.
    pub fn spawn(&self, task: SessionTask) {
        debug!(session = %self.id, "Session::spawn: called");
        self.hooks.adopt(task);
    }

    /// Register suspension predicates for the poll currently in progress.
    /// Called by awaitables from inside the coroutine body.
    pub fn park(&self, resume_when: WaitPredicate, abort_when: Option<WaitPredicate>) {
        debug!(session = %self.id, "Session::park: called");
        *self.park.lock().unwrap() = Some(Park {
            resume_when,
            abort_when,
        });
    }

    /// Clear the ready-queue dedup flag; called by the worker that popped
    /// this session, before driving it.
    pub fn clear_queued(&self) {
        debug!(session = %self.id, "Session::clear_queued: called");
        self.queued.store(false, Ordering::Release);
    }

    /// Drop the coroutine body without resuming it. Destructors of anything
    /// the body owns run here.
    pub fn discard(&self) {
        debug!(session = %self.id, "Session::discard: called");
        self.coroutine.lock().unwrap().discard();
    }

    pub fn messages(&self) -> &MessageQueue {
        debug!(session = %self.id, "Session::messages: called");
        &self.messages
    }

    pub fn callbacks(&self) -> &CallbackQueue {
        debug!(session = %self.id, "Session::callbacks: called");
        &self.callbacks
    }

    pub fn timers(&self) -> &TimerQueue {
        debug!(session = %self.id, "Session::timers: called");
        &self.timers
    }
}

/// Adapter so foreign futures polled inside a coroutine can still request a
/// wakeup through the session.
struct SessionWaker(Arc<Session>);

impl Wake for SessionWaker {
    fn wake(self: Arc<Self>) {
        self.0.wake();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.0.wake();
    }
}
