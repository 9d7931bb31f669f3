//! Conversion jobs: lifecycle, worker pool and housekeeping.

pub mod manager;
pub mod queue;
pub mod sweeper;
pub mod worker;

pub use manager::{Download, FileEntry, JobCounts, JobManager, JobView};
pub use queue::{ConversionTask, QueueStats, WorkQueue};
pub use sweeper::SweepPolicy;
