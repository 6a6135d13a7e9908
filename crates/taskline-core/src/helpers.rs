//! Task combinators layered on the manager: one-shot messages, directly
//! awaitable tasks, sequencing, and the keep-alive sentinel.

use std::future::Future;

use anyhow::{Context, Result, anyhow};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::manager::{TaskManager, Updater};
use crate::task::{Task, TaskOutcome};

/// Adds a static message row that completes immediately.
pub fn add_message(manager: &TaskManager, message: impl Into<String>) {
    manager.run(vec![Task::message(message)]);
}

/// Runs `future` as a tracked task and returns its value directly.
///
/// The row shows `title` while the future runs; on failure the row message is
/// replaced with the error and the error is returned to the caller (the
/// spinner still records an `Error` status).
pub async fn taskify<T, Fut>(
    manager: &TaskManager,
    title: impl Into<String>,
    future: Fut,
) -> Result<T>
where
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let title = title.into();
    let label = title.clone();
    let (tx, rx) = oneshot::channel();
    let task = Task::new(title, move |updater, _cancel| async move {
        match future.await {
            Ok(value) => {
                let _ = tx.send(Ok(value));
                Ok(TaskOutcome::Done)
            }
            Err(error) => {
                updater.set(format!("{label} failed: {error}"));
                let summary = error.to_string();
                let _ = tx.send(Err(error));
                Err(anyhow!(summary))
            }
        }
    });
    manager.run(vec![task]);
    rx.await.context("task dropped before completing")?
}

/// Folds tasks into one continuation chain that runs them in order.
///
/// A `Continuation` resolved by a task mid-sequence is spliced in ahead of
/// the remaining tail. Returns `None` for an empty input.
pub fn sequence(tasks: Vec<Task>) -> Option<Task> {
    let mut iter = tasks.into_iter().rev();
    let mut chained = iter.next()?;
    for task in iter {
        chained = chain_into(task, chained);
    }
    Some(chained)
}

fn chain_into(task: Task, next: Task) -> Task {
    let Task {
        initial_message,
        work,
        disabled,
        hidden,
        symbol,
        index,
    } = task;
    Task {
        initial_message,
        work: Box::new(move |updater: Updater, cancel: CancellationToken| {
            let fut = work(updater, cancel);
            Box::pin(async move {
                match fut.await? {
                    TaskOutcome::Continuation(mid) => {
                        Ok(TaskOutcome::Continuation(Box::new(chain_into(*mid, next))))
                    }
                    TaskOutcome::Done | TaskOutcome::Value(_) => {
                        Ok(TaskOutcome::Continuation(Box::new(next)))
                    }
                }
            })
        }),
        disabled,
        hidden,
        symbol,
        index,
    }
}

/// Hidden sentinel that pends until the session token fires, keeping the
/// manager from reaching idle on its own.
pub fn keep_alive() -> Task {
    Task::new("keep-alive", |_updater, cancel| async move {
        cancel.cancelled().await;
        Ok(TaskOutcome::Done)
    })
    .hidden()
}
