//! Process-level Ctrl+C handling shared by all manager sessions.
//!
//! The signal handler only flips a flag and wakes waiters; the manager owns
//! every write to the output stream. A second Ctrl+C runs the restore hook
//! (cursor re-show) and force-exits with 130.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tracing::warn;

static INSTALLED: AtomicBool = AtomicBool::new(false);
static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static NOTIFY: OnceLock<Notify> = OnceLock::new();
static RESTORE_HOOK: OnceLock<Box<dyn Fn() + Send + Sync>> = OnceLock::new();

/// Installs the process Ctrl+C handler. Idempotent; later calls are no-ops.
pub fn init() {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }
    if let Err(error) = ctrlc::set_handler(trigger) {
        INSTALLED.store(false, Ordering::SeqCst);
        warn!(%error, "failed to install Ctrl+C handler");
    }
}

/// First interrupt wakes waiters; a second one restores the terminal and
/// force-exits, since process::exit bypasses Drop handlers.
pub fn trigger() {
    if INTERRUPTED.swap(true, Ordering::SeqCst) {
        if let Some(hook) = RESTORE_HOOK.get() {
            hook();
        }
        std::process::exit(130);
    }
    NOTIFY.get_or_init(Notify::new).notify_waiters();
}

pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Clears the interrupt flag, typically at the start of a new session.
pub fn reset() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

/// Waits until an interrupt is triggered.
pub async fn wait_for_interrupt() {
    loop {
        if is_interrupted() {
            return;
        }
        NOTIFY.get_or_init(Notify::new).notified().await;
    }
}

/// Registers the hook called on the second Ctrl+C before exit. First caller
/// wins; later registrations are ignored.
pub fn set_restore_hook<F>(hook: F)
where
    F: Fn() + Send + Sync + 'static,
{
    let _ = RESTORE_HOOK.set(Box::new(hook));
}
