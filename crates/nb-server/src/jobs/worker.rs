//! Conversion worker pool.
//!
//! `N` tasks share one receiver. A worker holds the receiver lock only while
//! waiting for the next task, so the others keep converting in the
//! meantime. Each conversion runs in its own task, so a panicking converter
//! fails its job instead of taking the worker down. Cancellation stops
//! workers between jobs; a job already running is finished first.

use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::jobs::manager::JobManager;
use crate::jobs::queue::{ConversionTask, TaskReceiver};

/// Spawn `workers` conversion workers.
pub fn spawn_workers(
    manager: Arc<JobManager>,
    rx: TaskReceiver,
    workers: usize,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let workers = workers.max(1);
    tracing::info!(workers, "Starting conversion workers");
    (0..workers)
        .map(|n| {
            let manager = manager.clone();
            let rx = rx.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { run_worker(n, manager, rx, cancel).await })
        })
        .collect()
}

async fn run_worker(
    n: usize,
    manager: Arc<JobManager>,
    rx: TaskReceiver,
    cancel: CancellationToken,
) {
    tracing::debug!(worker = n, "Worker started");
    while let Some(task) = next_task(&rx, &cancel).await {
        run_isolated(&manager, task).await;
    }
    tracing::debug!(worker = n, "Worker stopped");
}

async fn run_isolated(manager: &Arc<JobManager>, task: ConversionTask) {
    let runner = manager.clone();
    let owned = task.clone();
    if let Err(e) = tokio::spawn(async move { runner.run_task(owned).await }).await {
        let reason = abort_reason(e);
        tracing::error!(job_id = %task.job_id, reason = %reason, "Conversion task aborted");
        manager.abandon_task(&task, &reason).await;
    }
}

fn abort_reason(e: JoinError) -> String {
    let payload = match e.try_into_panic() {
        Ok(payload) => payload,
        Err(_) => return "conversion task was cancelled".to_string(),
    };
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned());
    match message {
        Some(m) => format!("converter panicked: {m}"),
        None => "converter panicked".to_string(),
    }
}

async fn next_task(rx: &TaskReceiver, cancel: &CancellationToken) -> Option<ConversionTask> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        task = async { rx.lock().await.recv().await } => task,
    }
}
