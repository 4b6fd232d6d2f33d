//! Scheduler implementation

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::event::{
    CallbackQuery, EventFilter, EventRouter, MessageEvent, TimerEvent, TimerFilter,
};
use crate::session::{CoroState, SchedulerHooks, Session, SessionHandle, SessionTask};

/// State shared between the facade, the workers and the timer driver.
struct Shared {
    /// Sessions awaiting worker attention, deduplicated by the per-session
    /// queued flag
    ready: Mutex<VecDeque<Arc<Session>>>,
    ready_notify: Notify,

    /// Every live session
    sessions: Mutex<Vec<Arc<Session>>>,

    /// One router per event kind
    message_router: EventRouter<MessageEvent, EventFilter<MessageEvent>>,
    callback_router: EventRouter<CallbackQuery, EventFilter<CallbackQuery>>,
    timer_router: EventRouter<TimerEvent, TimerFilter>,

    /// Pending timer deadlines gathered during reconciliation
    deadlines: Mutex<BinaryHeap<Reverse<Instant>>>,
    timer_notify: Notify,

    shutdown: CancellationToken,

    /// Back-reference handed to sessions as their hooks object.
    self_ref: Weak<Shared>,
}

impl Shared {
    fn spawn_task(&self, task: SessionTask) -> Result<(), SchedulerError> {
        if self.shutdown.is_cancelled() {
            return Err(SchedulerError::ShutDown);
        }
        let hooks = Arc::new(SharedHooks(self.self_ref.clone()));
        let session = Session::create(task, hooks as Arc<dyn SchedulerHooks>);
        debug!(session = %session.id(), "scheduler: adopting session");
        self.sessions.lock().unwrap().push(Arc::clone(&session));
        self.reconcile(&session);
        session.wake();
        Ok(())
    }

    /// Drive one session until it parks or terminates, then either tear it
    /// down or reconcile its router subscriptions.
    fn drive(&self, session: &Arc<Session>) {
        loop {
            match session.try_resume() {
                Ok(true) => continue,
                Ok(false) => break,
                Err(report) => {
                    error!(
                        session = %session.id(),
                        "coroutine failed; removing session: {report:#}"
                    );
                    self.remove_session(session);
                    return;
                }
            }
        }

        match session.status() {
            CoroState::Null | CoroState::Done | CoroState::Failed => {
                self.remove_session(session);
            }
            _ => self.reconcile(session),
        }
    }

    /// Reconcile every router's subscription entry for this session and
    /// feed any new timer deadline to the driver.
    fn reconcile(&self, session: &Arc<Session>) {
        self.message_router.update(session);
        self.callback_router.update(session);

        let timer_dirty = session.timers().has_changes();
        self.timer_router.update(session);
        if timer_dirty
            && let Some(due) = session.timers().get_filter().due()
        {
            self.deadlines.lock().unwrap().push(Reverse(due));
            self.timer_notify.notify_one();
        }
    }

    fn remove_session(&self, session: &Arc<Session>) {
        debug!(session = %session.id(), status = ?session.status(), "scheduler: removing session");
        self.message_router.remove(session);
        self.callback_router.remove(session);
        self.timer_router.remove(session);
        self.sessions
            .lock()
            .unwrap()
            .retain(|s| s.id() != session.id());
    }
}

/// Upcall adapter handed to sessions. Holds the scheduler weakly so a
/// session kept alive by user code cannot keep a dropped scheduler alive,
/// and upcalls after teardown become no-ops.
struct SharedHooks(Weak<Shared>);

impl SchedulerHooks for SharedHooks {
    fn wake(&self, session: &Arc<Session>) {
        if let Some(shared) = self.0.upgrade() {
            shared.ready.lock().unwrap().push_back(Arc::clone(session));
            shared.ready_notify.notify_one();
        }
    }

    fn adopt(&self, task: SessionTask) {
        let Some(shared) = self.0.upgrade() else {
            return;
        };
        if let Err(err) = shared.spawn_task(task) {
            debug!(error = %err, "scheduler: dropping task spawned during shutdown");
        }
    }
}

/// Snapshot of scheduler state for observability and tests.
#[derive(Debug, Clone)]
pub struct SchedulerStats {
    pub sessions: usize,
    pub message_subscribers: usize,
    pub callback_subscribers: usize,
    pub timer_subscribers: usize,
}

/// Cooperative scheduler: owns the sessions, the ready queue, a pool of
/// worker tasks and one router per event kind.
///
/// Must be created inside a tokio runtime; workers and the timer driver are
/// spawned onto it. The host's update loop feeds events through the
/// `handle_*` methods; [`shutdown`](Scheduler::shutdown) stops the workers
/// and drops pending coroutines without resuming them.
pub struct Scheduler {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Start a scheduler with `config.workers` worker tasks and the timer
    /// driver.
    pub fn new(config: SchedulerConfig) -> Self {
        debug!(?config, "Scheduler::new: called");
        let shared = Arc::new_cyclic(|self_ref| Shared {
            ready: Mutex::new(VecDeque::with_capacity(config.ready_capacity)),
            ready_notify: Notify::new(),
            sessions: Mutex::new(Vec::new()),
            message_router: EventRouter::new(Session::messages),
            callback_router: EventRouter::new(Session::callbacks),
            timer_router: EventRouter::new(Session::timers),
            deadlines: Mutex::new(BinaryHeap::new()),
            timer_notify: Notify::new(),
            shutdown: CancellationToken::new(),
            self_ref: self_ref.clone(),
        });

        let mut workers = Vec::with_capacity(config.workers + 1);
        for worker in 0..config.workers {
            workers.push(tokio::spawn(worker_loop(Arc::clone(&shared), worker)));
        }
        workers.push(tokio::spawn(timer_driver(Arc::clone(&shared), config.clone())));

        info!(workers = config.workers, tick_ms = config.tick_interval_ms, "scheduler started");
        Self {
            shared,
            workers: Mutex::new(workers),
        }
    }

    /// Adopt a new coroutine: `f` receives the handle of the session created
    /// around it.
    pub fn spawn<F, Fut>(&self, f: F) -> Result<(), SchedulerError>
    where
        F: FnOnce(SessionHandle) -> Fut + Send + 'static,
        Fut: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        debug!("Scheduler::spawn: called");
        self.shared
            .spawn_task(Box::new(move |handle| Box::pin(f(handle))))
    }

    /// Route an incoming message to every subscribed session.
    pub fn handle_message(&self, message: MessageEvent) {
        debug!(message_id = message.message_id, "Scheduler::handle_message: called");
        self.shared.message_router.route(&message);
    }

    /// Route an incoming callback query to every subscribed session.
    pub fn handle_callback_query(&self, query: CallbackQuery) {
        debug!(query_id = %query.id, "Scheduler::handle_callback_query: called");
        self.shared.callback_router.route(&query);
    }

    /// Route a timer tick. Emitted internally by the timer driver; exposed
    /// so hosts and tests can inject ticks of their own.
    pub fn handle_timer(&self, event: TimerEvent) {
        debug!(fired_at = ?event.fired_at, "Scheduler::handle_timer: called");
        self.shared.timer_router.route(&event);
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        debug!("Scheduler::session_count: called");
        self.shared.sessions.lock().unwrap().len()
    }

    /// Current session and router-subscription counts.
    pub fn stats(&self) -> SchedulerStats {
        debug!("Scheduler::stats: called");
        SchedulerStats {
            sessions: self.session_count(),
            message_subscribers: self.shared.message_router.subscriber_count(),
            callback_subscribers: self.shared.callback_router.subscriber_count(),
            timer_subscribers: self.shared.timer_router.subscriber_count(),
        }
    }

    /// Stop the workers and the timer driver, then drop every pending
    /// coroutine without resuming it.
    pub async fn shutdown(self) {
        debug!("Scheduler::shutdown: called");
        info!("scheduler shutting down");
        self.shared.shutdown.cancel();
        self.shared.ready_notify.notify_waiters();
        self.shared.timer_notify.notify_waiters();

        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        for worker in workers {
            if let Err(err) = worker.await {
                error!(error = %err, "scheduler worker terminated abnormally");
            }
        }

        let sessions = std::mem::take(&mut *self.shared.sessions.lock().unwrap());
        for session in &sessions {
            self.shared.message_router.remove(session);
            self.shared.callback_router.remove(session);
            self.shared.timer_router.remove(session);
            session.discard();
        }
        self.shared.ready.lock().unwrap().clear();
        info!(dropped = sessions.len(), "scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
        self.shared.ready_notify.notify_waiters();
        self.shared.timer_notify.notify_waiters();

        // Break the session -> body -> handle -> session cycle so pending
        // coroutines are freed even when shutdown() was never awaited.
        let sessions = std::mem::take(&mut *self.shared.sessions.lock().unwrap());
        for session in &sessions {
            session.discard();
        }
        self.shared.ready.lock().unwrap().clear();
    }
}

/// Pop ready sessions and drive them until shutdown.
async fn worker_loop(shared: Arc<Shared>, worker: usize) {
    debug!(worker, "scheduler worker started");
    loop {
        if shared.shutdown.is_cancelled() {
            break;
        }

        let session = shared.ready.lock().unwrap().pop_front();
        match session {
            Some(session) => {
                session.clear_queued();
                shared.drive(&session);
            }
            None => {
                tokio::select! {
                    _ = shared.ready_notify.notified() => {}
                    _ = shared.shutdown.cancelled() => break,
                }
            }
        }
    }
    debug!(worker, "scheduler worker stopped");
}

/// Emit timer ticks: at the fallback cadence, and early whenever a session
/// deadline from the heap comes due sooner.
async fn timer_driver(shared: Arc<Shared>, config: SchedulerConfig) {
    let tick = config.tick_interval();
    debug!(tick_ms = config.tick_interval_ms, "timer driver started");

    loop {
        let now = Instant::now();
        let wake_at = {
            let mut deadlines = shared.deadlines.lock().unwrap();
            while let Some(Reverse(due)) = deadlines.peek() {
                if *due <= now {
                    deadlines.pop();
                } else {
                    break;
                }
            }
            deadlines
                .peek()
                .map_or(now + tick, |Reverse(due)| (*due).min(now + tick))
        };

        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            // A new deadline was registered; recompute the sleep target.
            _ = shared.timer_notify.notified() => {}
            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(wake_at)) => {
                shared.timer_router.route(&TimerEvent::now());
            }
        }
    }
    debug!("timer driver stopped");
}
