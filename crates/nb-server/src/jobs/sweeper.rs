//! Periodic housekeeping: purge expired artifact files and apply the job
//! retention policy.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::jobs::manager::JobManager;

/// Sweeper timing and retention.
#[derive(Debug, Clone, Copy)]
pub struct SweepPolicy {
    pub interval: Duration,
    /// `None` keeps finished jobs forever.
    pub retention: Option<Duration>,
}

impl SweepPolicy {
    pub fn from_config(config: &nb_core::config::Config) -> Self {
        Self {
            interval: Duration::from_secs(config.artifacts.sweep_interval_secs.max(1)),
            retention: config
                .jobs
                .retention_hours
                .map(|h| Duration::from_secs(h.saturating_mul(3600))),
        }
    }
}

/// Run one sweep. Errors are logged; the next sweep tries again.
pub async fn sweep_once(manager: &JobManager, policy: &SweepPolicy) {
    if let Err(e) = manager.purge_expired().await {
        tracing::error!("Artifact sweep failed: {e}");
    }
    if let Some(retention) = policy.retention {
        if let Err(e) = manager.prune_jobs(retention).await {
            tracing::error!("Job retention sweep failed: {e}");
        }
    }
}

/// Sweep every `policy.interval` until cancelled.
pub async fn run_sweeper(manager: Arc<JobManager>, policy: SweepPolicy, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = policy.interval.as_secs(),
        retention_secs = policy.retention.map(|r| r.as_secs()),
        "Artifact sweeper started"
    );

    let mut ticker = tokio::time::interval(policy.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => sweep_once(&manager, &policy).await,
            _ = cancel.cancelled() => break,
        }
    }

    tracing::info!("Artifact sweeper stopped");
}
