//! Keyed store of download artifacts.
//!
//! A thin layer over the `artifacts` table that also answers the one
//! question the API cares about: can this job's output be downloaded right
//! now? [`ArtifactStore::lookup`] separates "never existed", "expired",
//! "record present but file gone" and "available".

use std::path::{Path, PathBuf};

use nb_core::{JobId, Result};
use nb_db::models::Artifact;
use nb_db::pool::{get_conn, DbPool};
use nb_db::queries::artifacts;

/// Result of [`ArtifactStore::lookup`].
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// No artifact record for this job.
    Missing,
    /// The record exists and `now > expires_at`.
    Expired(Artifact),
    /// The record is live but its file is not on disk.
    FileMissing(Artifact),
    /// The record is live and the file exists.
    Available(Artifact),
}

#[derive(Clone)]
pub struct ArtifactStore {
    db: DbPool,
}

impl ArtifactStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Record an artifact outside of job completion. Job completion writes
    /// its record through `complete_job`, in the same transaction as the
    /// status change.
    pub fn put(&self, job_id: JobId, path: &Path, expires_at: i64, now: i64) -> Result<Artifact> {
        let conn = get_conn(&self.db)?;
        artifacts::insert_artifact(&conn, job_id, &path.to_string_lossy(), expires_at, now)
    }

    pub fn get(&self, job_id: JobId) -> Result<Option<Artifact>> {
        let conn = get_conn(&self.db)?;
        artifacts::get_artifact(&conn, job_id)
    }

    pub fn delete(&self, job_id: JobId) -> Result<bool> {
        let conn = get_conn(&self.db)?;
        artifacts::delete_artifact(&conn, job_id)
    }

    pub fn list(&self) -> Result<Vec<Artifact>> {
        let conn = get_conn(&self.db)?;
        artifacts::list_artifacts(&conn)
    }

    /// Expired artifacts whose files have not been purged yet.
    pub fn list_expired(&self, now: i64) -> Result<Vec<Artifact>> {
        let conn = get_conn(&self.db)?;
        artifacts::list_expired_unpurged(&conn, now)
    }

    pub fn mark_purged(&self, job_id: JobId, now: i64) -> Result<bool> {
        let conn = get_conn(&self.db)?;
        artifacts::mark_purged(&conn, job_id, now)
    }

    pub async fn lookup(&self, job_id: JobId, now: i64) -> Result<Lookup> {
        let Some(artifact) = self.get(job_id)? else {
            return Ok(Lookup::Missing);
        };
        if artifact.is_expired(now) {
            return Ok(Lookup::Expired(artifact));
        }
        if file_exists(Path::new(&artifact.file_path)).await {
            Ok(Lookup::Available(artifact))
        } else {
            Ok(Lookup::FileMissing(artifact))
        }
    }
}

pub(crate) async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Best-effort removal. A file that is already gone is not an error;
/// anything else is logged and swallowed.
pub(crate) async fn remove_quietly(path: impl Into<PathBuf>, what: &str) {
    let path = path.into();
    match tokio::fs::remove_file(&path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed {what}"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove {what}"),
    }
}
