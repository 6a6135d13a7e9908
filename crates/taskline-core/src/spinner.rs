//! Per-task render state and the status state machine.
//!
//! A [`Spinner`] is created the instant its task is accepted and lives until
//! the manager resets. Status moves monotonically away from `Pending`; a
//! same-status set is a strict no-op so racing finalizers cannot double-fire
//! observers.

use std::sync::Arc;

use crate::theme::SymbolOverride;

/// Lifecycle state of a tracked task.
///
/// `Pending` is the initial state; the other three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Success,
    Error,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

/// Data delivered to status observers alongside the new status.
#[derive(Debug, Clone, Default)]
pub enum TaskPayload {
    #[default]
    None,
    /// The value the work function resolved with.
    Value(String),
    /// The work function resolved into a follow-up task; carries that task's
    /// initial message.
    Chained(String),
    /// The error the work function failed with.
    Error(Arc<anyhow::Error>),
}

/// Callback fired once per status transition.
pub type StatusObserver = Arc<dyn Fn(TaskStatus, &TaskPayload) + Send + Sync>;

pub(crate) struct Spinner {
    pub frame: usize,
    pub message: String,
    pub hidden: bool,
    pub symbol: Option<SymbolOverride>,
    status: TaskStatus,
    payload: TaskPayload,
    observers: Vec<StatusObserver>,
}

impl Spinner {
    pub fn new(message: String, hidden: bool, symbol: Option<SymbolOverride>) -> Self {
        Self {
            frame: 0,
            message,
            hidden,
            symbol,
            status: TaskStatus::Pending,
            payload: TaskPayload::None,
            observers: Vec::new(),
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn observe(&mut self, observer: StatusObserver) {
        self.observers.push(observer);
    }

    /// Moves the spinner to `status`, storing `payload` first so observers
    /// always see data consistent with the status they are notified of.
    ///
    /// Returns the observers to fire (with the status and payload) once the
    /// caller has released its lock, or `None` when the status is unchanged.
    pub fn transition(
        &mut self,
        status: TaskStatus,
        payload: TaskPayload,
    ) -> Option<(Vec<StatusObserver>, TaskStatus, TaskPayload)> {
        if self.status == status {
            return None;
        }
        self.payload = payload;
        self.status = status;
        Some((self.observers.clone(), status, self.payload.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn recording_observer(log: &Arc<Mutex<Vec<TaskStatus>>>) -> StatusObserver {
        let log = Arc::clone(log);
        Arc::new(move |status, _payload| log.lock().unwrap().push(status))
    }

    #[test]
    fn transition_fires_once_per_change() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut spinner = Spinner::new("msg".into(), false, None);
        spinner.observe(recording_observer(&log));

        let fired = spinner.transition(TaskStatus::Success, TaskPayload::None);
        let (observers, status, payload) = fired.expect("first transition fires");
        for observer in &observers {
            observer(status, &payload);
        }
        assert_eq!(*log.lock().unwrap(), vec![TaskStatus::Success]);
    }

    #[test]
    fn same_status_set_is_a_no_op() {
        let mut spinner = Spinner::new("msg".into(), false, None);
        assert!(spinner.transition(TaskStatus::Pending, TaskPayload::None).is_none());
        assert!(spinner.transition(TaskStatus::Cancelled, TaskPayload::None).is_some());
        assert!(spinner.transition(TaskStatus::Cancelled, TaskPayload::None).is_none());
        assert_eq!(spinner.status(), TaskStatus::Cancelled);
    }

    #[test]
    fn payload_is_stored_before_status() {
        let mut spinner = Spinner::new("msg".into(), false, None);
        let fired = spinner.transition(TaskStatus::Success, TaskPayload::Value("done".into()));
        let (_, status, payload) = fired.expect("transition fires");
        assert_eq!(status, TaskStatus::Success);
        assert!(matches!(payload, TaskPayload::Value(v) if v == "done"));
    }
}
