//! The task descriptor: the contract between callers and the manager.
//!
//! A [`Task`] couples an initial display message with an asynchronous work
//! function. The work function receives an [`Updater`] for the row message
//! and the session [`CancellationToken`], and resolves with a
//! [`TaskOutcome`]: done, done-with-a-value, or a continuation task the
//! manager schedules next.

use std::future::Future;

use anyhow::Result;
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::manager::Updater;
use crate::theme::{PartialStatusSymbols, SymbolOverride};

/// What a work function resolved with.
pub enum TaskOutcome {
    /// Finished with nothing to report.
    Done,
    /// Finished with a value handed to status observers.
    Value(String),
    /// Finished by becoming another task; the manager schedules it as a new
    /// tracked task with its own row.
    Continuation(Box<Task>),
}

/// Boxed work function. Invoked at most once, when the task starts.
pub type TaskFn =
    Box<dyn FnOnce(Updater, CancellationToken) -> BoxFuture<'static, Result<TaskOutcome>> + Send>;

/// A unit of asynchronous work plus its display metadata.
pub struct Task {
    pub(crate) initial_message: String,
    pub(crate) work: TaskFn,
    pub(crate) disabled: bool,
    pub(crate) hidden: bool,
    pub(crate) symbol: Option<SymbolOverride>,
    pub(crate) index: Option<usize>,
}

impl Task {
    pub fn new<F, Fut>(initial_message: impl Into<String>, work: F) -> Self
    where
        F: FnOnce(Updater, CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<TaskOutcome>> + Send + 'static,
    {
        Self {
            initial_message: initial_message.into(),
            work: Box::new(move |updater, cancel| Box::pin(work(updater, cancel))),
            disabled: false,
            hidden: false,
            symbol: None,
            index: None,
        }
    }

    /// A row that just shows `message` and completes immediately.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(message, |_updater, _cancel| async { Ok(TaskOutcome::Done) })
    }

    /// Excludes the task entirely: no spinner is created and the work
    /// function never runs.
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Runs and tracks the task without rendering its row.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Pins the task to an explicit slot. An existing spinner at that slot is
    /// overwritten, so collisions are the caller's responsibility.
    pub fn at_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// One glyph shown for every lifecycle state of this task.
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(SymbolOverride::Static(symbol.into()));
        self
    }

    /// Per-status glyph overrides for this task only.
    pub fn with_symbols(mut self, symbols: PartialStatusSymbols) -> Self {
        self.symbol = Some(SymbolOverride::PerStatus(symbols));
        self
    }

    pub fn initial_message(&self) -> &str {
        &self.initial_message
    }

    /// Creates a task driven from outside its own work function.
    ///
    /// The task pends until the returned [`TaskHandle`] closes it, fails it,
    /// or is dropped; cancellation resolves it quietly. This is the seam
    /// widgets use to stream text into a row.
    pub fn handle(initial_message: impl Into<String>) -> (Self, TaskHandle) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = Self::new(initial_message, move |updater, cancel| async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => return Ok(TaskOutcome::Done),
                    msg = rx.recv() => match msg {
                        Some(HandleMsg::Update(text)) => updater.set(text),
                        Some(HandleMsg::Close(Some(value))) => return Ok(TaskOutcome::Value(value)),
                        Some(HandleMsg::Close(None)) | None => return Ok(TaskOutcome::Done),
                        Some(HandleMsg::Fail(error)) => return Err(error),
                    },
                }
            }
        });
        (task, TaskHandle { tx })
    }
}

enum HandleMsg {
    Update(String),
    Close(Option<String>),
    Fail(anyhow::Error),
}

/// Push-style driver for a task created with [`Task::handle`].
#[derive(Clone)]
pub struct TaskHandle {
    tx: mpsc::UnboundedSender<HandleMsg>,
}

impl TaskHandle {
    /// Replaces the row message. Ignored after the task settles.
    pub fn update(&self, message: impl Into<String>) {
        let _ = self.tx.send(HandleMsg::Update(message.into()));
    }

    /// Resolves the task successfully.
    pub fn close(&self) {
        let _ = self.tx.send(HandleMsg::Close(None));
    }

    /// Resolves the task successfully with a payload value.
    pub fn close_with(&self, value: impl Into<String>) {
        let _ = self.tx.send(HandleMsg::Close(Some(value.into())));
    }

    /// Fails the task with `error`.
    pub fn fail(&self, error: anyhow::Error) {
        let _ = self.tx.send(HandleMsg::Fail(error));
    }
}
