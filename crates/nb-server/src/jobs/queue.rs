//! Bounded hand-off between request handlers and conversion workers.
//!
//! The channel capacity is the number of jobs that may wait for a worker.
//! Submission reserves a slot *before* anything is persisted, so a full
//! queue rejects a request without leaving an input file or a job row
//! behind.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nb_core::{Error, JobId, Result};
use tokio::sync::{mpsc, Mutex};

/// Everything a worker needs to run one conversion.
#[derive(Debug, Clone)]
pub struct ConversionTask {
    pub job_id: JobId,
    pub input: PathBuf,
    pub source_extension: String,
    pub target_format: String,
}

/// Receiving side, shared by all workers.
pub type TaskReceiver = Arc<Mutex<mpsc::Receiver<ConversionTask>>>;

/// A reserved queue slot. Dropping it without sending releases the slot.
pub struct Slot(mpsc::OwnedPermit<ConversionTask>);

impl Slot {
    pub fn send(self, task: ConversionTask) {
        self.0.send(task);
    }
}

/// Sending side of the work queue plus its live statistics.
#[derive(Debug)]
pub struct WorkQueue {
    tx: mpsc::Sender<ConversionTask>,
    active: AtomicUsize,
}

/// Point-in-time view of the queue.
#[derive(Debug, Clone, Copy, serde::Serialize, utoipa::ToSchema)]
pub struct QueueStats {
    /// Tasks waiting for a worker (including reserved slots).
    pub depth: usize,
    pub capacity: usize,
    /// Workers currently running a conversion.
    pub active_workers: usize,
}

impl WorkQueue {
    /// Create a queue holding at most `capacity` waiting tasks.
    pub fn channel(capacity: usize) -> (Self, TaskReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let queue = Self {
            tx,
            active: AtomicUsize::new(0),
        };
        (queue, Arc::new(Mutex::new(rx)))
    }

    /// Reserve a slot, or fail with [`Error::QueueFull`].
    pub fn reserve(&self) -> Result<Slot> {
        match self.tx.clone().try_reserve_owned() {
            Ok(permit) => Ok(Slot(permit)),
            Err(mpsc::error::TrySendError::Full(_)) => Err(Error::QueueFull {
                capacity: self.tx.max_capacity(),
            }),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(Error::Internal("work queue is closed".into()))
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            depth: self.depth(),
            capacity: self.tx.max_capacity(),
            active_workers: self.active.load(Ordering::SeqCst),
        }
    }

    /// Mark a worker busy for as long as the guard lives.
    pub(crate) fn busy(&self) -> BusyGuard<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        crate::metrics::set_active_workers(now);
        BusyGuard(&self.active)
    }
}

pub(crate) struct BusyGuard<'a>(&'a AtomicUsize);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let now = self.0.fetch_sub(1, Ordering::SeqCst) - 1;
        crate::metrics::set_active_workers(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> ConversionTask {
        ConversionTask {
            job_id: JobId::new(),
            input: PathBuf::from("/in/x.png"),
            source_extension: "png".into(),
            target_format: "jpg".into(),
        }
    }

    #[tokio::test]
    async fn full_queue_rejects() {
        let (queue, _rx) = WorkQueue::channel(2);
        let a = queue.reserve().unwrap();
        let _b = queue.reserve().unwrap();
        assert!(matches!(queue.reserve(), Err(Error::QueueFull { capacity: 2 })));
        assert_eq!(queue.depth(), 2);

        drop(a);
        assert_eq!(queue.depth(), 1);
        assert!(queue.reserve().is_ok());
    }

    #[tokio::test]
    async fn sent_tasks_count_until_received() {
        let (queue, rx) = WorkQueue::channel(4);
        queue.reserve().unwrap().send(task());
        assert_eq!(queue.depth(), 1);

        let received = rx.lock().await.recv().await.unwrap();
        assert_eq!(received.target_format, "jpg");
        assert_eq!(queue.depth(), 0);
    }

    #[test]
    fn busy_guard_tracks_active_workers() {
        let (queue, _rx) = WorkQueue::channel(1);
        {
            let _g1 = queue.busy();
            let _g2 = queue.busy();
            assert_eq!(queue.stats().active_workers, 2);
        }
        assert_eq!(queue.stats().active_workers, 0);
    }

    #[tokio::test]
    async fn closed_queue_is_internal_error() {
        let (queue, rx) = WorkQueue::channel(1);
        drop(rx);
        assert!(matches!(queue.reserve(), Err(Error::Internal(_))));
    }
}
