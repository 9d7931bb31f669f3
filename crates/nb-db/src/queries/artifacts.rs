//! Download artifact records keyed by job id.

use nb_core::{Error, JobId, Result};
use rusqlite::Connection;

use crate::models::Artifact;

const COLS: &str = "job_id, file_path, expires_at, created_at, purged_at";

/// Insert an artifact record.
pub fn insert_artifact(
    conn: &Connection,
    job_id: JobId,
    file_path: &str,
    expires_at: i64,
    now: i64,
) -> Result<Artifact> {
    conn.execute(
        "INSERT INTO artifacts (job_id, file_path, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![job_id.to_string(), file_path, expires_at, now],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Artifact {
        job_id,
        file_path: file_path.to_string(),
        expires_at,
        created_at: now,
        purged_at: None,
    })
}

/// Get the artifact for a job.
pub fn get_artifact(conn: &Connection, job_id: JobId) -> Result<Option<Artifact>> {
    let q = format!("SELECT {COLS} FROM artifacts WHERE job_id = ?1");
    let result = conn.query_row(&q, [job_id.to_string()], Artifact::from_row);
    match result {
        Ok(a) => Ok(Some(a)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Delete the artifact record for a job. Returns true if a row was deleted.
pub fn delete_artifact(conn: &Connection, job_id: JobId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM artifacts WHERE job_id = ?1", [job_id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// List all artifacts, newest first.
pub fn list_artifacts(conn: &Connection) -> Result<Vec<Artifact>> {
    let q = format!("SELECT {COLS} FROM artifacts ORDER BY created_at DESC, job_id");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], Artifact::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Artifacts past their deadline whose files have not been purged yet.
pub fn list_expired_unpurged(conn: &Connection, now: i64) -> Result<Vec<Artifact>> {
    let q = format!(
        "SELECT {COLS} FROM artifacts WHERE expires_at < ?1 AND purged_at IS NULL
         ORDER BY expires_at"
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([now], Artifact::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Record that the artifact's file has been removed. The row stays so that
/// status lookups keep reporting `expired`.
pub fn mark_purged(conn: &Connection, job_id: JobId, now: i64) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE artifacts SET purged_at = ?1 WHERE job_id = ?2 AND purged_at IS NULL",
            rusqlite::params![now, job_id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}
