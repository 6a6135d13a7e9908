//! CLI entry and the demo session it drives.

use std::io;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use taskline_core::{
    ManagerOptions, Task, TaskManager, TaskOutcome, TaskStatus, add_message, sequence, taskify,
};
use tokio::time::sleep;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "taskline")]
#[command(version)]
#[command(about = "Live multi-task progress in the terminal")]
struct Cli {
    /// Header shown above the task block
    #[arg(long, default_value = "taskline")]
    title: String,

    /// Number of concurrent worker rows
    #[arg(long, default_value_t = 3)]
    workers: u64,

    /// Repaint period in milliseconds
    #[arg(long = "interval-ms", default_value_t = 80)]
    interval_ms: u64,

    /// Include a task that fails
    #[arg(long)]
    fail: bool,

    /// Include a chained three-step sequence
    #[arg(long)]
    chain: bool,

    /// Cancel whatever is still running after this many milliseconds
    #[arg(long = "cancel-after-ms", value_name = "MS")]
    cancel_after_ms: Option<u64>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never land inside the repainted block.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();

    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let manager = TaskManager::new(
        ManagerOptions::new()
            .title(format!(" {} ", cli.title))
            .render_interval(Duration::from_millis(cli.interval_ms.max(1))),
    );

    add_message(&manager, "session started");

    let mut tasks = Vec::new();
    for n in 1..=cli.workers {
        tasks.push(worker(n));
    }
    if cli.chain {
        let steps = vec![
            step("fetch sources", 400),
            step("compile", 700),
            step("link", 300),
        ];
        if let Some(chained) = sequence(steps) {
            tasks.push(chained.with_symbol("#"));
        }
    }
    if cli.fail {
        tasks.push(Task::new("flaky step", |_update, _cancel| async move {
            sleep(Duration::from_millis(600)).await;
            Err(anyhow!("upstream returned 503"))
        }));
    }
    let slots = manager.run(tasks);
    if cli.fail
        && let Some(slot) = slots.last()
    {
        manager.on_status_change(*slot, |status, _payload| {
            if status == TaskStatus::Error {
                warn!("flaky step failed; the rest keep running");
            }
        });
    }

    // A row driven from outside its own work function.
    let (download, handle) = Task::handle("download: waiting");
    manager.add(vec![download]);
    tokio::spawn(async move {
        for percent in [12, 48, 77, 95] {
            sleep(Duration::from_millis(250)).await;
            handle.update(format!("download: {percent}%"));
        }
        sleep(Duration::from_millis(200)).await;
        handle.close_with("4.2 MB");
    });

    if let Some(ms) = cli.cancel_after_ms {
        let manager = manager.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(ms)).await;
            manager.stop();
        });
    }

    let checked = taskify(&manager, "verify checksums", async {
        sleep(Duration::from_millis(500)).await;
        Ok(3)
    })
    .await?;

    // Overwrite the banner row in place once everything else is wrapping up.
    manager.add(vec![
        Task::message("session winding down").at_index(0).with_symbol("~"),
    ]);

    manager.idle().await;
    info!(checked, "session finished");
    Ok(())
}

fn worker(n: u64) -> Task {
    Task::new(format!("worker {n}: starting"), move |update, cancel| {
        async move {
            for stage in 1..=4u64 {
                let pause = Duration::from_millis(120 * n + 90 * stage);
                tokio::select! {
                    () = cancel.cancelled() => return Ok(TaskOutcome::Done),
                    () = sleep(pause) => {}
                }
                update.set(format!("worker {n}: stage {stage}/4"));
            }
            update.set(format!("worker {n}: done"));
            Ok(TaskOutcome::Done)
        }
    })
}

fn step(name: &'static str, millis: u64) -> Task {
    Task::new(name, move |update, cancel| async move {
        tokio::select! {
            () = cancel.cancelled() => {}
            () = sleep(Duration::from_millis(millis)) => update.set(format!("{name}: ok")),
        }
        Ok(TaskOutcome::Done)
    })
}
