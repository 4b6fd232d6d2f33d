//! Dispatcher implementation

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::event::{CallbackQuery, MessageEvent};
use crate::scheduler::Scheduler;
use crate::session::{SessionHandle, TaskFuture};

/// Host-facing update envelope; the host maps its platform's payloads into
/// these before feeding the dispatcher.
#[derive(Debug, Clone)]
pub enum Update {
    Message(MessageEvent),
    CallbackQuery(CallbackQuery),
}

type MessageTask = Arc<dyn Fn(SessionHandle, MessageEvent) -> TaskFuture + Send + Sync>;
type CallbackTask = Arc<dyn Fn(SessionHandle, CallbackQuery) -> TaskFuture + Send + Sync>;

/// Front door between the host's update loop and the scheduler.
///
/// Every incoming update is first routed to suspended sessions through the
/// scheduler; messages are then matched against the registered commands and
/// each match spawns a fresh coroutine. Optional top-level handlers spawn
/// for every update of their kind.
pub struct Dispatcher {
    scheduler: Scheduler,
    commands: HashMap<String, MessageTask>,
    message_handler: Option<MessageTask>,
    callback_handler: Option<CallbackTask>,
}

impl Dispatcher {
    pub fn new(scheduler: Scheduler) -> Self {
        debug!("Dispatcher::new: called");
        Self {
            scheduler,
            commands: HashMap::new(),
            message_handler: None,
            callback_handler: None,
        }
    }

    /// Register a coroutine spawned whenever a message matches `command`:
    /// the text is the command itself, or starts with the command followed
    /// by a single space.
    pub fn add_command<F, Fut>(&mut self, command: impl Into<String>, handler: F)
    where
        F: Fn(SessionHandle, MessageEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        let command = command.into();
        debug!(%command, "Dispatcher::add_command: called");
        self.commands.insert(
            command,
            Arc::new(move |handle, msg| Box::pin(handler(handle, msg))),
        );
    }

    /// Register a coroutine spawned for every incoming message.
    pub fn set_message_handler<F, Fut>(&mut self, handler: F)
    where
        F: Fn(SessionHandle, MessageEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        debug!("Dispatcher::set_message_handler: called");
        self.message_handler = Some(Arc::new(move |handle, msg| Box::pin(handler(handle, msg))));
    }

    /// Register a coroutine spawned for every incoming callback query.
    pub fn set_callback_handler<F, Fut>(&mut self, handler: F)
    where
        F: Fn(SessionHandle, CallbackQuery) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        debug!("Dispatcher::set_callback_handler: called");
        self.callback_handler = Some(Arc::new(move |handle, query| Box::pin(handler(handle, query))));
    }

    /// Feed one update from the host's long-poll loop.
    pub fn dispatch(&self, update: Update) {
        debug!("Dispatcher::dispatch: called");
        match update {
            Update::Message(message) => self.on_message(message),
            Update::CallbackQuery(query) => self.on_callback_query(query),
        }
    }

    /// Consume updates from a channel until the host closes it.
    pub async fn run(&self, mut updates: mpsc::Receiver<Update>) {
        debug!("Dispatcher::run: called");
        info!("dispatcher started");
        while let Some(update) = updates.recv().await {
            self.dispatch(update);
        }
        info!("dispatcher stopped: update stream closed");
    }

    pub fn scheduler(&self) -> &Scheduler {
        debug!("Dispatcher::scheduler: called");
        &self.scheduler
    }

    /// Give the scheduler back, e.g. to shut it down.
    pub fn into_scheduler(self) -> Scheduler {
        debug!("Dispatcher::into_scheduler: called");
        self.scheduler
    }

    fn on_message(&self, message: MessageEvent) {
        debug!(message_id = message.message_id, "Dispatcher::on_message: called");
        self.scheduler.handle_message(message.clone());

        if let Some(handler) = &self.message_handler {
            self.spawn_message_task(handler, message.clone());
        }

        if message.text.is_empty() {
            return;
        }
        for (command, handler) in &self.commands {
            if command_matches(command, &message.text) {
                debug!(%command, "dispatcher: command matched");
                self.spawn_message_task(handler, message.clone());
            }
        }
    }

    fn on_callback_query(&self, query: CallbackQuery) {
        debug!(query_id = %query.id, "Dispatcher::on_callback_query: called");
        self.scheduler.handle_callback_query(query.clone());

        if let Some(handler) = &self.callback_handler {
            let handler = Arc::clone(handler);
            let spawned = self
                .scheduler
                .spawn(move |handle| handler(handle, query));
            if let Err(err) = spawned {
                warn!(error = %err, "dispatcher: dropping callback handler");
            }
        }
    }

    fn spawn_message_task(&self, handler: &MessageTask, message: MessageEvent) {
        let handler = Arc::clone(handler);
        if let Err(err) = self.scheduler.spawn(move |handle| handler(handle, message)) {
            warn!(error = %err, "dispatcher: dropping message handler");
        }
    }
}

/// The text triggers a command when it is exactly the command string or
/// starts with it followed by a single space.
fn command_matches(command: &str, text: &str) -> bool {
    match text.strip_prefix(command) {
        Some(rest) => rest.is_empty() || rest.starts_with(' '),
        None => false,
    }
}
