//! Live multi-task progress for the terminal.
//!
//! A [`TaskManager`] owns a set of concurrently running tasks, each with its
//! own line in a repainted status block: spinner while pending, fixed glyph
//! once it succeeds, fails, or is cancelled. Tasks can update their message
//! mid-flight, chain into follow-up tasks, and observe each other's status
//! transitions; Ctrl+C cancels the whole session cooperatively.
//!
//! ```ignore
//! let manager = TaskManager::new(ManagerOptions::new().title(" build "));
//! manager.run(vec![Task::new("compiling", |update, _cancel| async move {
//!     update.set("compiling: core");
//!     Ok(TaskOutcome::Done)
//! })]);
//! manager.idle().await;
//! ```

pub mod helpers;
pub mod interrupt;
pub mod manager;
mod render;
pub mod spinner;
pub mod task;
pub mod theme;

pub use helpers::{add_message, keep_alive, sequence, taskify};
pub use manager::{DEFAULT_RENDER_INTERVAL, ManagerOptions, TaskManager, Updater};
pub use spinner::{TaskPayload, TaskStatus};
pub use task::{Task, TaskHandle, TaskOutcome};
pub use theme::{PartialStatusSymbols, StatusSymbols, SymbolOverride};
