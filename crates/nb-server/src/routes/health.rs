//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::context::AppContext;
use crate::jobs::{JobCounts, QueueStats};
use crate::routes::formats::{capability_statuses, CapabilityStatus};

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    pub queue: QueueStats,
    pub workers: usize,
    /// Absent when the database is unreachable.
    pub jobs: Option<JobCounts>,
    pub capabilities: Vec<CapabilityStatus>,
}

/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service health", body = HealthResponse))
)]
pub async fn health_check(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    let jobs = match ctx.jobs.job_counts() {
        Ok(counts) => Some(counts),
        Err(e) => {
            tracing::warn!("Health check could not read job counts: {e}");
            None
        }
    };
    let database = jobs.is_some();
    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
        queue: ctx.jobs.queue_stats(),
        workers: ctx.config.jobs.workers.max(1),
        jobs,
        capabilities: capability_statuses(&ctx),
    })
}
