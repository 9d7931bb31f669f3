//! Conversion job state operations.
//!
//! Every transition is guarded by `status = 'processing'`, so a job leaves
//! that state at most once no matter how many callers race.

use nb_core::{Error, JobId, JobStatus, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::models::Job;
use crate::queries::artifacts;

const COLS: &str = "id, source_filename, target_format, status, error, created_at, finished_at";

/// Begin a write transaction that takes the write lock up front.
///
/// A deferred transaction that reads first cannot upgrade once another
/// connection has committed, and fails with `SQLITE_BUSY` without waiting
/// for the busy timeout.
fn write_transaction(conn: &Connection) -> Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(|e| Error::database(e.to_string()))
}

/// Create a job in the `processing` state.
pub fn create_job(
    conn: &Connection,
    id: JobId,
    source_filename: &str,
    target_format: &str,
    now: i64,
) -> Result<Job> {
    conn.execute(
        "INSERT INTO jobs (id, source_filename, target_format, status, created_at)
         VALUES (?1, ?2, ?3, 'processing', ?4)",
        rusqlite::params![id.to_string(), source_filename, target_format, now],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Job {
        id,
        source_filename: source_filename.to_string(),
        target_format: target_format.to_string(),
        status: JobStatus::Processing,
        error: None,
        created_at: now,
        finished_at: None,
    })
}

/// Get a job by ID.
pub fn get_job(conn: &Connection, id: JobId) -> Result<Option<Job>> {
    let q = format!("SELECT {COLS} FROM jobs WHERE id = ?1");
    let result = conn.query_row(&q, [id.to_string()], Job::from_row);
    match result {
        Ok(j) => Ok(Some(j)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Count jobs per status.
pub fn count_by_status(conn: &Connection) -> Result<Vec<(JobStatus, i64)>> {
    let mut stmt = conn
        .prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status ORDER BY status")
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    rows.into_iter()
        .map(|(s, n)| Ok((s.parse()?, n)))
        .collect()
}

/// Record the artifact and mark the job completed in one transaction.
///
/// The artifact row is written before the status flips. Returns `false`
/// (and writes nothing) when the job already left `processing`.
pub fn complete_job(
    conn: &Connection,
    id: JobId,
    file_path: &str,
    expires_at: i64,
    now: i64,
) -> Result<bool> {
    let tx = write_transaction(conn)?;

    let still_open: bool = tx
        .query_row(
            "SELECT COUNT(*) > 0 FROM jobs WHERE id = ?1 AND status = 'processing'",
            [id.to_string()],
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;
    if !still_open {
        return Ok(false);
    }

    artifacts::insert_artifact(&tx, id, file_path, expires_at, now)?;

    let n = tx
        .execute(
            "UPDATE jobs SET status = 'completed', finished_at = ?1
             WHERE id = ?2 AND status = 'processing'",
            rusqlite::params![now, id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    if n == 0 {
        return Ok(false);
    }

    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(true)
}

/// Mark a processing job as failed with `error`.
pub fn fail_job(conn: &Connection, id: JobId, error: &str, now: i64) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE jobs SET status = 'failed', error = ?1, finished_at = ?2
             WHERE id = ?3 AND status = 'processing'",
            rusqlite::params![error, now, id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Fail every job still `processing`. Used at startup, when no worker can
/// own such a job any more. Returns the jobs that were failed.
pub fn fail_orphaned_jobs(conn: &Connection, error: &str, now: i64) -> Result<Vec<Job>> {
    let tx = write_transaction(conn)?;

    let orphans = {
        let q = format!("SELECT {COLS} FROM jobs WHERE status = 'processing'");
        let mut stmt = tx.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
        let rows = stmt
            .query_map([], Job::from_row)
            .map_err(|e| Error::database(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::database(e.to_string()))?;
        rows
    };

    tx.execute(
        "UPDATE jobs SET status = 'failed', error = ?1, finished_at = ?2
         WHERE status = 'processing'",
        rusqlite::params![error, now],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    tx.commit().map_err(|e| Error::database(e.to_string()))?;

    Ok(orphans
        .into_iter()
        .map(|job| Job {
            status: JobStatus::Failed,
            error: Some(error.to_string()),
            finished_at: Some(now),
            ..job
        })
        .collect())
}

/// Outcome of [`prune_finished_before`].
#[derive(Debug, Default)]
pub struct PrunedJobs {
    pub jobs: usize,
    /// Artifact files whose rows were removed along with their jobs and
    /// that the sweep had not purged yet.
    pub artifact_paths: Vec<String>,
}

/// Delete terminal jobs (and, by cascade, their artifacts) that finished
/// before `cutoff`.
pub fn prune_finished_before(conn: &Connection, cutoff: i64) -> Result<PrunedJobs> {
    let tx = write_transaction(conn)?;

    let artifact_paths = {
        let mut stmt = tx
            .prepare(
                "SELECT a.file_path FROM artifacts a JOIN jobs j ON j.id = a.job_id
                 WHERE j.status != 'processing' AND j.finished_at < ?1
                   AND a.purged_at IS NULL",
            )
            .map_err(|e| Error::database(e.to_string()))?;
        let paths = stmt
            .query_map([cutoff], |row| row.get::<_, String>(0))
            .map_err(|e| Error::database(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::database(e.to_string()))?;
        paths
    };

    let jobs = tx
        .execute(
            "DELETE FROM jobs WHERE status != 'processing' AND finished_at < ?1",
            [cutoff],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    tx.commit().map_err(|e| Error::database(e.to_string()))?;

    Ok(PrunedJobs {
        jobs,
        artifact_paths,
    })
}
