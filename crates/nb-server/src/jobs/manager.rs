//! Job lifecycle: submission, status, download and the conversion task.
//!
//! [`JobManager`] owns every write to the `jobs` and `artifacts` tables.
//! A job is created `processing` and leaves that state exactly once, either
//! through `complete_job` (artifact row and status flip in one transaction)
//! or through `fail_job`. Both are guarded in SQL, so a duplicate or late
//! transition is a no-op.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nb_convert::{extension_of, Capability, ConversionRequest, Converter, Dispatcher};
use nb_core::config::Config;
use nb_core::{Clock, Error, JobId, JobStatus, Result};
use nb_db::models::{Artifact, Job};
use nb_db::pool::{get_conn, DbPool};
use nb_db::queries::jobs;
use serde::Serialize;

use crate::artifacts::{file_exists, remove_quietly, ArtifactStore, Lookup};
use crate::jobs::queue::{ConversionTask, QueueStats, TaskReceiver, WorkQueue};
use crate::metrics;

/// Longest accepted target format.
const MAX_TARGET_LEN: usize = 10;

/// Status as reported to API clients.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobView {
    NotFound,
    Expired,
    Ready { download_url: String },
    Processing { file_missing: bool },
    Failed { error: String },
}

impl JobView {
    pub fn message(&self) -> &str {
        match self {
            JobView::NotFound => "Task ID not found in database",
            JobView::Expired => "File has expired",
            JobView::Ready { .. } => "File ready for download",
            JobView::Processing { file_missing: false } => "File is being processed",
            JobView::Processing { file_missing: true } => {
                "File is being processed or conversion failed"
            }
            JobView::Failed { error } => error.as_str(),
        }
    }
}

/// A downloadable artifact.
#[derive(Debug, Clone)]
pub struct Download {
    pub path: PathBuf,
    /// `converted_{id}.{ext}`.
    pub filename: String,
    pub content_type: String,
}

/// One row of the file listing.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct FileEntry {
    pub task_id: String,
    pub file_path: String,
    pub expires_at: i64,
    /// `available` or `expired`.
    pub status: String,
    pub file_exists: bool,
    pub download_url: Option<String>,
}

/// Number of job records per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct JobCounts {
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

/// Coordinates persistence, the work queue and the converter.
pub struct JobManager {
    db: DbPool,
    artifacts: ArtifactStore,
    clock: Arc<dyn Clock>,
    dispatcher: Dispatcher,
    converter: Arc<dyn Converter>,
    queue: WorkQueue,
    /// Held so the queue stays open even if every worker is gone.
    _receiver: TaskReceiver,
    input_dir: PathBuf,
    output_dir: PathBuf,
    ttl_secs: i64,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("ttl_secs", &self.ttl_secs)
            .field("queue", &self.queue.stats())
            .finish_non_exhaustive()
    }
}

impl JobManager {
    /// Build a manager and the receiving end of its work queue.
    pub fn new(
        config: &Config,
        db: DbPool,
        clock: Arc<dyn Clock>,
        dispatcher: Dispatcher,
        converter: Arc<dyn Converter>,
    ) -> (Self, TaskReceiver) {
        let (queue, rx) = WorkQueue::channel(config.jobs.queue_capacity);
        let manager = Self {
            artifacts: ArtifactStore::new(db.clone()),
            db,
            clock,
            dispatcher,
            converter,
            queue,
            _receiver: rx.clone(),
            input_dir: config.storage.input_dir.clone(),
            output_dir: config.storage.output_dir.clone(),
            ttl_secs: i64::try_from(config.artifacts.ttl_secs).unwrap_or(i64::MAX),
            timeout: config.jobs.timeout(),
        };
        (manager, rx)
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn output_path(&self, id: JobId, target_format: &str) -> PathBuf {
        self.output_dir.join(format!("{id}.{target_format}"))
    }

    pub fn input_path(&self, id: JobId, filename: &str) -> PathBuf {
        self.input_dir.join(format!("{id}_{filename}"))
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Persist an upload, create its job and queue the conversion.
    ///
    /// Convertibility is not checked here; an impossible pair becomes a
    /// failed job. Only a malformed request or a full queue is rejected.
    pub async fn submit(&self, bytes: &[u8], filename: &str, target_format: &str) -> Result<JobId> {
        let target = normalize_target(target_format)?;
        let filename = sanitize_filename(filename);

        let slot = self.queue.reserve().inspect_err(|_| {
            metrics::record_rejected("queue_full");
        })?;

        let id = JobId::new();
        let input = self.input_path(id, &filename);
        tokio::fs::create_dir_all(&self.input_dir).await?;
        if let Err(e) = tokio::fs::write(&input, bytes).await {
            remove_quietly(&input, "partial input file").await;
            return Err(e.into());
        }

        let created = get_conn(&self.db)
            .and_then(|conn| jobs::create_job(&conn, id, &filename, &target, self.now()));
        if let Err(e) = created {
            remove_quietly(&input, "input file").await;
            return Err(e);
        }

        slot.send(ConversionTask {
            job_id: id,
            input,
            source_extension: extension_of(&filename),
            target_format: target.clone(),
        });
        metrics::record_submitted();
        metrics::set_queue_depth(self.queue.depth());

        tracing::info!(
            job_id = %id,
            filename = %filename,
            target = %target,
            bytes = bytes.len(),
            "Job submitted"
        );
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        let conn = get_conn(&self.db)?;
        jobs::get_job(&conn, id)
    }

    pub fn job_counts(&self) -> Result<JobCounts> {
        let conn = get_conn(&self.db)?;
        let mut counts = JobCounts::default();
        for (status, n) in jobs::count_by_status(&conn)? {
            match status {
                JobStatus::Processing => counts.processing = n,
                JobStatus::Completed => counts.completed = n,
                JobStatus::Failed => counts.failed = n,
            }
        }
        Ok(counts)
    }

    pub async fn status(&self, id: JobId) -> Result<JobView> {
        let job = self.get_job(id)?;
        let view = match self.artifacts.lookup(id, self.now()).await? {
            Lookup::Expired(_) => JobView::Expired,
            Lookup::Available(_) => JobView::Ready {
                download_url: download_url(id),
            },
            Lookup::FileMissing(_) => JobView::Processing { file_missing: true },
            Lookup::Missing => match job {
                None => JobView::NotFound,
                Some(job) => match job.status {
                    JobStatus::Failed => JobView::Failed {
                        error: job.error.unwrap_or_default(),
                    },
                    JobStatus::Processing | JobStatus::Completed => {
                        JobView::Processing { file_missing: false }
                    }
                },
            },
        };
        Ok(view)
    }

    /// Resolve a download. An expired artifact's file is deleted on the way
    /// out.
    pub async fn download(&self, id: JobId) -> Result<Download> {
        match self.artifacts.lookup(id, self.now()).await? {
            Lookup::Missing => Err(Error::not_found("file", id)),
            Lookup::Expired(artifact) => {
                remove_quietly(&artifact.file_path, "expired artifact").await;
                Err(Error::Expired { id: id.to_string() })
            }
            Lookup::FileMissing(_) => Err(Error::FileMissing { id: id.to_string() }),
            Lookup::Available(artifact) => Ok(describe_download(id, &artifact)),
        }
    }

    pub async fn list_files(&self) -> Result<Vec<FileEntry>> {
        let now = self.now();
        let mut entries = Vec::new();
        for artifact in self.artifacts.list()? {
            let expired = artifact.is_expired(now);
            let exists = file_exists(Path::new(&artifact.file_path)).await;
            entries.push(FileEntry {
                task_id: artifact.job_id.to_string(),
                download_url: (!expired && exists).then(|| download_url(artifact.job_id)),
                file_path: artifact.file_path,
                expires_at: artifact.expires_at,
                status: if expired { "expired" } else { "available" }.to_string(),
                file_exists: exists,
            });
        }
        Ok(entries)
    }

    // -----------------------------------------------------------------------
    // Conversion task
    // -----------------------------------------------------------------------

    /// Run one queued conversion to a terminal state. Never returns an
    /// error: every failure is recorded on the job.
    pub async fn run_task(&self, task: ConversionTask) {
        let _busy = self.queue.busy();
        metrics::set_queue_depth(self.queue.depth());

        let started = Instant::now();
        let id = task.job_id;
        tracing::info!(job_id = %id, target = %task.target_format, "Conversion started");

        let mut capability = None;
        let outcome = self.convert(&task, &mut capability).await;

        let recorded = match outcome {
            Ok(output) => match self.finish_completed(id, &output).await {
                Err(e) => {
                    tracing::error!(job_id = %id, error = %e, "Failed to record completion");
                    remove_quietly(&output, "unrecorded output").await;
                    self.finish_failed(id, &e)
                }
                done => done,
            },
            Err(e) => {
                remove_quietly(self.output_path(id, &task.target_format), "partial output").await;
                self.finish_failed(id, &e)
            }
        };

        let label = match &recorded {
            Ok(JobStatus::Completed) => "completed",
            _ => "failed",
        };
        if let Err(e) = recorded {
            tracing::error!(job_id = %id, error = %e, "Failed to record job outcome");
        }
        metrics::record_finished(capability, label, started.elapsed());

        remove_quietly(&task.input, "input file").await;
    }

    async fn convert(
        &self,
        task: &ConversionTask,
        capability: &mut Option<Capability>,
    ) -> Result<PathBuf> {
        let resolved = self
            .dispatcher
            .resolve(&task.source_extension, &task.target_format)?;
        *capability = Some(resolved);

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let request = ConversionRequest {
            input: task.input.clone(),
            output: self.output_path(task.job_id, &task.target_format),
            source_extension: task.source_extension.clone(),
            target_format: task.target_format.clone(),
        };

        let conversion = self.converter.convert(resolved, &request);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, conversion)
                .await
                .map_err(|_| Error::Timeout {
                    secs: limit.as_secs(),
                })??,
            None => conversion.await?,
        }

        if !file_exists(&request.output).await {
            return Err(Error::OutputMissing {
                path: request.output.display().to_string(),
            });
        }
        Ok(request.output)
    }

    async fn finish_completed(&self, id: JobId, output: &Path) -> Result<JobStatus> {
        let now = self.now();
        let expires_at = now.saturating_add(self.ttl_secs);
        let conn = get_conn(&self.db)?;
        if jobs::complete_job(&conn, id, &output.to_string_lossy(), expires_at, now)? {
            tracing::info!(job_id = %id, expires_at, "Conversion completed");
            Ok(JobStatus::Completed)
        } else {
            drop(conn);
            tracing::warn!(job_id = %id, "Job already finished; discarding output");
            remove_quietly(output, "orphaned output").await;
            Ok(JobStatus::Failed)
        }
    }

    fn finish_failed(&self, id: JobId, error: &Error) -> Result<JobStatus> {
        let message = error.to_string();
        tracing::warn!(job_id = %id, error = %message, "Conversion failed");
        let conn = get_conn(&self.db)?;
        if !jobs::fail_job(&conn, id, &message, self.now())? {
            tracing::warn!(job_id = %id, "Job already finished; failure not recorded");
        }
        Ok(JobStatus::Failed)
    }

    /// Fail a job whose conversion task died before recording an outcome,
    /// and clean up after it.
    pub async fn abandon_task(&self, task: &ConversionTask, reason: &str) {
        let id = task.job_id;
        remove_quietly(self.output_path(id, &task.target_format), "partial output").await;

        let capability = self
            .dispatcher
            .resolve(&task.source_extension, &task.target_format)
            .ok();
        let error = match capability {
            Some(c) => Error::conversion(c, reason),
            None => Error::conversion("unknown", reason),
        };
        if let Err(e) = self.finish_failed(id, &error) {
            tracing::error!(job_id = %id, error = %e, "Failed to record job outcome");
        }
        metrics::record_finished(capability, "failed", Duration::ZERO);

        remove_quietly(&task.input, "input file").await;
    }

    // -----------------------------------------------------------------------
    // Housekeeping
    // -----------------------------------------------------------------------

    /// Fail jobs left `processing` by a previous process and delete their
    /// uploads.
    pub async fn fail_orphaned(&self) -> Result<usize> {
        let orphans = {
            let conn = get_conn(&self.db)?;
            jobs::fail_orphaned_jobs(&conn, "Interrupted by server restart", self.now())?
        };
        for job in &orphans {
            remove_quietly(self.input_path(job.id, &job.source_filename), "orphaned input").await;
        }
        Ok(orphans.len())
    }

    /// Delete files of expired artifacts. Records stay, so status keeps
    /// reporting `expired`. Returns the number of artifacts purged.
    pub async fn purge_expired(&self) -> Result<usize> {
        let now = self.now();
        let expired = self.artifacts.list_expired(now)?;
        let mut purged = 0;
        for artifact in expired {
            remove_quietly(&artifact.file_path, "expired artifact").await;
            if self.artifacts.mark_purged(artifact.job_id, now)? {
                purged += 1;
            }
        }
        if purged > 0 {
            tracing::info!(purged, "Purged expired artifacts");
            metrics::record_purged(purged);
        }
        Ok(purged)
    }

    /// Delete finished job records older than `retention`, with any
    /// remaining artifact files.
    pub async fn prune_jobs(&self, retention: Duration) -> Result<usize> {
        let secs = i64::try_from(retention.as_secs()).unwrap_or(i64::MAX);
        let cutoff = self.now().saturating_sub(secs);
        let pruned = {
            let conn = get_conn(&self.db)?;
            jobs::prune_finished_before(&conn, cutoff)?
        };
        for path in &pruned.artifact_paths {
            remove_quietly(path, "pruned artifact").await;
        }
        if pruned.jobs > 0 {
            tracing::info!(jobs = pruned.jobs, "Pruned finished jobs past retention");
            metrics::record_pruned(pruned.jobs);
        }
        Ok(pruned.jobs)
    }
}

pub fn download_url(id: JobId) -> String {
    format!("/api/download/{id}")
}

fn describe_download(id: JobId, artifact: &Artifact) -> Download {
    let path = PathBuf::from(&artifact.file_path);
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let content_type = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    Download {
        filename: format!("converted_{id}{ext}"),
        content_type,
        path,
    }
}

/// Lowercase and check a target format: 1 to 10 ASCII letters or digits.
pub fn normalize_target(target: &str) -> Result<String> {
    let target = target.trim().trim_start_matches('.').to_ascii_lowercase();
    let valid = (1..=MAX_TARGET_LEN).contains(&target.len())
        && target.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    if valid {
        Ok(target)
    } else {
        Err(Error::Validation(format!(
            "target_format must be 1-{MAX_TARGET_LEN} letters or digits"
        )))
    }
}

/// Strip any directory components from a client-supplied filename.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    match base {
        "" | "." | ".." => "upload".to_string(),
        name => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_normalization() {
        assert_eq!(normalize_target("JPG").unwrap(), "jpg");
        assert_eq!(normalize_target(".mp3").unwrap(), "mp3");
        assert!(normalize_target("").is_err());
        assert!(normalize_target("../etc").is_err());
        assert!(normalize_target("abcdefghijk").is_err());
    }

    #[test]
    fn filenames_lose_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\photo.PNG"), "photo.PNG");
        assert_eq!(sanitize_filename("dir/"), "upload");
        assert_eq!(sanitize_filename(".."), "upload");
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
    }

    #[test]
    fn view_messages() {
        assert_eq!(JobView::NotFound.message(), "Task ID not found in database");
        let failed = JobView::Failed {
            error: "Unsupported conversion: pdf -> mp4".into(),
        };
        assert_eq!(failed.message(), "Unsupported conversion: pdf -> mp4");
    }

    #[test]
    fn view_serializes_with_status_tag() {
        let v = serde_json::to_value(JobView::Ready {
            download_url: "/api/download/x".into(),
        })
        .unwrap();
        assert_eq!(v["status"], "ready");
        assert_eq!(v["download_url"], "/api/download/x");
        assert_eq!(
            serde_json::to_value(JobView::NotFound).unwrap()["status"],
            "not_found"
        );
    }

    #[test]
    fn download_naming() {
        let id = JobId::new();
        let artifact = Artifact {
            job_id: id,
            file_path: "/out/abc.jpg".into(),
            expires_at: 0,
            created_at: 0,
            purged_at: None,
        };
        let d = describe_download(id, &artifact);
        assert_eq!(d.filename, format!("converted_{id}.jpg"));
        assert_eq!(d.content_type, "image/jpeg");
    }
}
