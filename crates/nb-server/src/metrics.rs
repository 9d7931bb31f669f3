//! Prometheus metrics for the conversion pipeline.
//!
//! Recording goes through the `metrics` facade; when no recorder is
//! installed (tests, `formats` CLI) every call is a no-op.

use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use nb_convert::Capability;

/// Install the global Prometheus recorder.
///
/// Returns `None` (after logging) if a recorder is already installed.
pub fn install_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("Prometheus recorder not installed: {e}");
            None
        }
    }
}

pub fn record_submitted() {
    counter!("nodeblack_jobs_submitted_total").increment(1);
}

pub fn record_rejected(reason: &'static str) {
    counter!("nodeblack_jobs_rejected_total", "reason" => reason).increment(1);
}

/// Record a finished job. `capability` is `None` when the pair never
/// resolved.
pub fn record_finished(capability: Option<Capability>, outcome: &'static str, elapsed: Duration) {
    let capability = capability.map(|c| c.as_str()).unwrap_or("none");
    counter!(
        "nodeblack_jobs_finished_total",
        "capability" => capability,
        "outcome" => outcome
    )
    .increment(1);
    histogram!("nodeblack_conversion_duration_seconds", "capability" => capability)
        .record(elapsed.as_secs_f64());
}

pub fn set_queue_depth(depth: usize) {
    gauge!("nodeblack_queue_depth").set(depth as f64);
}

pub fn set_active_workers(active: usize) {
    gauge!("nodeblack_active_workers").set(active as f64);
}

pub fn record_purged(count: usize) {
    counter!("nodeblack_artifacts_purged_total").increment(count as u64);
}

pub fn record_pruned(count: usize) {
    counter!("nodeblack_jobs_pruned_total").increment(count as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_submitted();
        record_rejected("queue_full");
        record_finished(Some(Capability::Image), "completed", Duration::from_millis(5));
        record_finished(None, "failed", Duration::ZERO);
        set_queue_depth(3);
        set_active_workers(1);
        record_purged(2);
        record_pruned(0);
    }
}
