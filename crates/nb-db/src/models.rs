//! Typed row models.

use nb_core::{JobId, JobStatus};
use uuid::Uuid;

/// Parse a UUID-based ID from a text column.
fn parse_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    let uuid = Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(T::from(uuid))
}

fn parse_status(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<JobStatus> {
    let s: String = row.get(idx)?;
    s.parse().map_err(|e: nb_core::Error| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub source_filename: String,
    pub target_format: String,
    pub status: JobStatus,
    pub error: Option<String>,
    pub created_at: i64,
    pub finished_at: Option<i64>,
}

impl Job {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            source_filename: row.get(1)?,
            target_format: row.get(2)?,
            status: parse_status(row, 3)?,
            error: row.get(4)?,
            created_at: row.get(5)?,
            finished_at: row.get(6)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// Pointer to a converted output and its download deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub job_id: JobId,
    pub file_path: String,
    pub expires_at: i64,
    pub created_at: i64,
    pub purged_at: Option<i64>,
}

impl Artifact {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            job_id: parse_id(row, 0)?,
            file_path: row.get(1)?,
            expires_at: row.get(2)?,
            created_at: row.get(3)?,
            purged_at: row.get(4)?,
        })
    }

    /// Expired strictly after the deadline: at `now == expires_at` the
    /// artifact is still downloadable.
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}
