//! Route handlers for the HTTP API.

pub mod convert;
pub mod download;
pub mod files;
pub mod formats;
pub mod health;
pub mod metrics;
pub mod status;

use nb_core::JobId;

/// Parse a task id from a path segment. Malformed ids are simply unknown.
pub(crate) fn parse_task_id(raw: &str) -> Option<JobId> {
    raw.parse().ok()
}
