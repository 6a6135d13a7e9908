//! The task manager: scheduling, concurrent execution, lifecycle tracking,
//! and the render loop.
//!
//! One manager owns a session's spinners. Tasks are spawned the moment they
//! are accepted; a periodic render task repaints the block until nothing is
//! pending, and a shared [`CancellationToken`] carries cooperative stop
//! requests into work functions. All shared mutation is serialized behind a
//! single mutex that is never held across an await.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use crossterm::{cursor, execute};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::interrupt;
use crate::render::{self, PrefixFn};
use crate::spinner::{Spinner, TaskPayload, TaskStatus};
use crate::task::{Task, TaskFn, TaskOutcome};
use crate::theme::{self, PartialStatusSymbols, StatusSymbols};

/// Once any manager instance has rendered its header, no later instance
/// renders one again.
static HAS_RENDERED_TITLE: AtomicBool = AtomicBool::new(false);

pub const DEFAULT_RENDER_INTERVAL: Duration = Duration::from_millis(80);

type HeaderFn = dyn Fn(&str) -> String + Send + Sync;

/// Construction-time configuration for a [`TaskManager`].
pub struct ManagerOptions {
    stream: Box<dyn Write + Send>,
    title: Option<String>,
    symbols: StatusSymbols,
    keep_alive: bool,
    render_interval: Duration,
    task_separator: String,
    content_padding: String,
    task_prefix: Box<PrefixFn>,
    header_formatter: Box<HeaderFn>,
    rows: Option<u16>,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        use crossterm::style::Stylize;
        Self {
            stream: Box::new(io::stdout()),
            title: None,
            symbols: StatusSymbols::default(),
            keep_alive: false,
            render_interval: DEFAULT_RENDER_INTERVAL,
            task_separator: format!("{}\n", theme::bar()),
            content_padding: "  ".into(),
            task_prefix: Box::new(|separator, symbol, padding| {
                format!("{separator}{symbol}{padding}")
            }),
            header_formatter: Box::new(|title| {
                format!("{} {}\n", theme::bar_start(), title.negative())
            }),
            rows: None,
        }
    }
}

impl ManagerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Destination for rendered output. Defaults to stdout.
    pub fn stream(mut self, stream: impl Write + Send + 'static) -> Self {
        self.stream = Box::new(stream);
        self
    }

    /// Header text rendered once per process, above the first session.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Per-status glyph overrides applied over the defaults.
    pub fn symbols(mut self, overrides: &PartialStatusSymbols) -> Self {
        self.symbols = StatusSymbols::default().merged(overrides);
        self
    }

    /// Adds a hidden always-pending sentinel so the manager never reaches
    /// idle until explicitly stopped. Requires a tokio runtime at
    /// construction time.
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Render tick period. Defaults to 80ms.
    pub fn render_interval(mut self, interval: Duration) -> Self {
        self.render_interval = interval;
        self
    }

    /// Text emitted before each row's status glyph.
    pub fn task_separator(mut self, separator: impl Into<String>) -> Self {
        self.task_separator = separator.into();
        self
    }

    /// Text emitted between the status glyph and the message.
    pub fn content_padding(mut self, padding: impl Into<String>) -> Self {
        self.content_padding = padding.into();
        self
    }

    /// Full control over the `separator + symbol + padding` row prefix.
    pub fn task_prefix<F>(mut self, prefix: F) -> Self
    where
        F: Fn(&str, &str, &str) -> String + Send + Sync + 'static,
    {
        self.task_prefix = Box::new(prefix);
        self
    }

    /// Formats the one-time header from the title.
    pub fn header_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.header_formatter = Box::new(formatter);
        self
    }

    /// Fixed terminal height instead of querying the terminal; useful for
    /// tests and non-tty streams.
    pub fn rows(mut self, rows: u16) -> Self {
        self.rows = Some(rows);
        self
    }
}

struct ManagerState {
    spinners: BTreeMap<usize, Spinner>,
    is_running: bool,
    cursor_hidden: bool,
    previous_rendered_lines: usize,
    cancel: CancellationToken,
    idle_tx: watch::Sender<bool>,
    stream: Box<dyn Write + Send>,
}

struct ManagerInner {
    title: Option<String>,
    symbols: StatusSymbols,
    keep_alive: bool,
    render_interval: Duration,
    task_separator: String,
    content_padding: String,
    task_prefix: Box<PrefixFn>,
    header_formatter: Box<HeaderFn>,
    rows: Option<u16>,
    state: Mutex<ManagerState>,
}

/// Cloneable handle to the orchestrator. Construct one at program entry and
/// pass it to collaborators.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<ManagerInner>,
}

/// Callback handle handed to work functions for updating their row message.
///
/// Cheap to clone; becomes a no-op once the manager is gone or the slot has
/// been reset.
#[derive(Clone)]
pub struct Updater {
    slot: usize,
    inner: Weak<ManagerInner>,
}

impl Updater {
    /// Replaces the row message. Silently does nothing for missing slots.
    pub fn set(&self, message: impl Into<String>) {
        if let Some(inner) = self.inner.upgrade() {
            inner.update(self.slot, message.into());
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl TaskManager {
    /// Creates a manager. Must run inside a tokio runtime when
    /// [`ManagerOptions::keep_alive`] is set.
    pub fn new(options: ManagerOptions) -> Self {
        let (idle_tx, _idle_rx) = watch::channel(true);
        let inner = Arc::new(ManagerInner {
            title: options.title,
            symbols: options.symbols,
            keep_alive: options.keep_alive,
            render_interval: options.render_interval,
            task_separator: options.task_separator,
            content_padding: options.content_padding,
            task_prefix: options.task_prefix,
            header_formatter: options.header_formatter,
            rows: options.rows,
            state: Mutex::new(ManagerState {
                spinners: BTreeMap::new(),
                is_running: false,
                cursor_hidden: false,
                previous_rendered_lines: 0,
                cancel: CancellationToken::new(),
                idle_tx,
                stream: options.stream,
            }),
        });
        let manager = Self { inner };
        if manager.inner.keep_alive {
            manager.run(vec![crate::helpers::keep_alive()]);
        }
        manager
    }

    /// Stops the current session and builds a fresh manager, the explicit
    /// replacement for forced singleton recreation.
    pub fn recreate(&self, options: ManagerOptions) -> Self {
        self.stop();
        Self::new(options)
    }

    /// Accepts tasks and starts executing them immediately, activating the
    /// render loop if it is not already running.
    ///
    /// Calling this on a fully stopped manager silently begins a fresh
    /// session; spinners from the previous session are discarded. Returns the
    /// slot of each accepted task in call order. Must run inside a tokio
    /// runtime.
    pub fn run(&self, tasks: Vec<Task>) -> Vec<usize> {
        let mut to_spawn = Vec::new();
        let mut slots = Vec::new();
        {
            let mut state = self.inner.lock();
            if !state.is_running {
                // Fresh session: never mix stale spinners with new tasks.
                Self::reset_state(&mut state);
                state.idle_tx.send_replace(false);
            }
            for task in tasks {
                if task.disabled {
                    continue;
                }
                let slot = task.index.unwrap_or(state.spinners.len());
                debug!(slot, message = %task.initial_message, "task scheduled");
                state.spinners.insert(
                    slot,
                    Spinner::new(task.initial_message, task.hidden, task.symbol),
                );
                slots.push(slot);
                to_spawn.push((slot, task.work, state.cancel.clone()));
            }
            if !state.is_running {
                self.start_rendering(&mut state);
            }
        }
        for (slot, work, cancel) in to_spawn {
            self.spawn_task(slot, work, cancel);
        }
        slots
    }

    /// Adds tasks to an already-active (or idle) manager. Identical to
    /// [`TaskManager::run`].
    pub fn add(&self, tasks: Vec<Task>) -> Vec<usize> {
        self.run(tasks)
    }

    /// Cancels everything still pending, renders a final frame, halts the
    /// render loop, and resets for reuse. Safe to call repeatedly.
    pub fn stop(&self) {
        let fired = {
            let mut state = self.inner.lock();
            if !state.is_running {
                return;
            }
            debug!("stopping task manager");
            let mut fired = Vec::new();
            for spinner in state.spinners.values_mut() {
                if spinner.is_pending() {
                    spinner.message.push_str(" (Cancelled)");
                    if let Some(firing) =
                        spinner.transition(TaskStatus::Cancelled, TaskPayload::None)
                    {
                        fired.push(firing);
                    }
                }
            }
            self.inner.render_locked(&mut state);
            state.is_running = false;
            state.cancel.cancel();
            if state.cursor_hidden {
                let _ = execute!(state.stream, cursor::Show);
                state.cursor_hidden = false;
            }
            let _ = state.stream.write_all(b"\n");
            let _ = state.stream.flush();
            if self.inner.title.is_some() {
                HAS_RENDERED_TITLE.store(true, Ordering::Relaxed);
            }
            Self::reset_state(&mut state);
            state.idle_tx.send_replace(true);
            fired
        };
        for (observers, status, payload) in fired {
            for observer in &observers {
                observer(status, &payload);
            }
        }
    }

    /// Resolves once every tracked spinner has a terminal status. A manager
    /// with no session in flight counts as idle.
    pub async fn idle(&self) {
        let mut rx = self.inner.lock().idle_tx.subscribe();
        let _ = rx.wait_for(|idle| *idle).await;
    }

    /// Replaces a task's displayed message. Silent no-op for missing slots.
    pub fn update(&self, slot: usize, message: impl Into<String>) {
        self.inner.update(slot, message.into());
    }

    /// Registers an observer fired exactly once per status transition of the
    /// spinner at `slot`, with the new status and its payload. Silent no-op
    /// for missing slots.
    pub fn on_status_change<F>(&self, slot: usize, handler: F)
    where
        F: Fn(TaskStatus, &TaskPayload) + Send + Sync + 'static,
    {
        let mut state = self.inner.lock();
        if let Some(spinner) = state.spinners.get_mut(&slot) {
            spinner.observe(Arc::new(handler));
        }
    }

    fn reset_state(state: &mut ManagerState) {
        state.spinners.clear();
        state.previous_rendered_lines = 0;
        state.cancel = CancellationToken::new();
    }

    fn start_rendering(&self, state: &mut ManagerState) {
        state.is_running = true;
        interrupt::init();
        interrupt::reset();
        interrupt::set_restore_hook(|| {
            let _ = execute!(io::stdout(), cursor::Show);
        });

        // First paint happens before any task gets a chance to settle.
        self.inner.render_locked(state);

        let weak = Arc::downgrade(&self.inner);
        let cancel = state.cancel.clone();
        let period = self.inner.render_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await; // the immediate tick; already painted above
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        inner.render();
                    }
                }
            }
        });

        // One watcher per activation: the first Ctrl+C stops this session.
        let manager = self.clone();
        let cancel = state.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = interrupt::wait_for_interrupt() => manager.stop(),
            }
        });
    }

    fn spawn_task(&self, slot: usize, work: TaskFn, cancel: CancellationToken) {
        {
            let state = self.inner.lock();
            if !state.spinners.contains_key(&slot) {
                // Scheduling created the spinner before us; a missing slot
                // means the session was already torn down.
                return;
            }
        }
        let manager = self.clone();
        let updater = Updater {
            slot,
            inner: Arc::downgrade(&self.inner),
        };
        tokio::spawn(async move {
            let result = work(updater, cancel.clone()).await;
            if cancel.is_cancelled() {
                trace!(slot, "task settled after cancellation");
                return;
            }
            match result {
                Ok(TaskOutcome::Continuation(next)) => {
                    let message = next.initial_message().to_owned();
                    // Schedule the follow-up before finalizing the parent so
                    // the idle check sees it pending.
                    manager.run(vec![*next]);
                    manager.finish(slot, TaskStatus::Success, TaskPayload::Chained(message));
                }
                Ok(TaskOutcome::Value(value)) => {
                    manager.finish(slot, TaskStatus::Success, TaskPayload::Value(value));
                }
                Ok(TaskOutcome::Done) => {
                    manager.finish(slot, TaskStatus::Success, TaskPayload::None);
                }
                Err(error) => {
                    debug!(slot, %error, "task failed");
                    manager.finish(slot, TaskStatus::Error, TaskPayload::Error(Arc::new(error)));
                }
            }
        });
    }

    fn finish(&self, slot: usize, status: TaskStatus, payload: TaskPayload) {
        let fired = {
            let mut state = self.inner.lock();
            let Some(spinner) = state.spinners.get_mut(&slot) else {
                // A reset raced this completion; nothing left to record.
                return;
            };
            spinner.transition(status, payload)
        };
        if let Some((observers, status, payload)) = fired {
            for observer in &observers {
                observer(status, &payload);
            }
        }
        self.check_idle();
    }

    /// Runs after every individual task settles; whichever settle finds zero
    /// pending spinners triggers the session teardown.
    fn check_idle(&self) {
        let done = {
            let state = self.inner.lock();
            state.is_running && !state.spinners.values().any(Spinner::is_pending)
        };
        if done {
            debug!("all tasks settled");
            self.stop();
        }
    }
}

impl ManagerInner {
    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, slot: usize, message: String) {
        let mut state = self.lock();
        if let Some(spinner) = state.spinners.get_mut(&slot) {
            spinner.message = message;
        }
    }

    fn render(&self) {
        let mut state = self.lock();
        self.render_locked(&mut state);
    }

    fn render_locked(&self, state: &mut ManagerState) {
        if !state.is_running {
            return;
        }
        if !state.cursor_hidden && execute!(state.stream, cursor::Hide).is_ok() {
            state.cursor_hidden = true;
        }

        let header = if HAS_RENDERED_TITLE.load(Ordering::Relaxed) {
            String::new()
        } else {
            self.title
                .as_deref()
                .map(|title| (self.header_formatter)(title))
                .unwrap_or_default()
        };
        let output = render::compose(
            &mut state.spinners,
            &self.symbols,
            &*self.task_prefix,
            &self.task_separator,
            &self.content_padding,
            &header,
        );
        let rows = self
            .rows
            .unwrap_or_else(|| crossterm::terminal::size().map_or(0, |(_, rows)| rows));
        match render::draw(
            &mut state.stream,
            &output,
            state.previous_rendered_lines,
            rows,
        ) {
            Ok(lines) => state.previous_rendered_lines = lines,
            Err(error) => warn!(%error, "render write failed"),
        }
    }
}
