//! Queue and job store seams.
//!
//! Both are injected into the submission side and the worker pool as
//! `Arc<dyn Broker>` / `Arc<dyn JobStore>`; there is no global instance.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use zipper_core::result::AppResult;
use zipper_core::types::{JobId, WorkerId};
use zipper_entity::{ArchiveResult, Job, Progress, QueueEntry};

/// At-least-once delivery channel between submitters and workers.
///
/// Acknowledgment happens after completion: [`Broker::dequeue`] parks the
/// entry in the claiming worker's in-flight set, [`Broker::ack`] drops it
/// once the job's result is recorded, and [`Broker::recover`] puts anything
/// still parked for a worker back on the pending queue.
#[async_trait]
pub trait Broker: Send + Sync + std::fmt::Debug + 'static {
    /// Append an entry to the pending queue.
    async fn enqueue(&self, entry: QueueEntry) -> AppResult<()>;

    /// Claim the next pending entry for `worker`, waiting up to `wait`.
    /// Returns `None` if nothing arrived in time.
    async fn dequeue(&self, worker: &WorkerId, wait: Duration) -> AppResult<Option<QueueEntry>>;

    /// Acknowledge that `worker` finished with `entry`.
    async fn ack(&self, worker: &WorkerId, entry: &QueueEntry) -> AppResult<()>;

    /// Requeue every unacknowledged entry held by `worker`. Returns the
    /// number of entries requeued.
    async fn recover(&self, worker: &WorkerId) -> AppResult<usize>;

    /// Number of entries waiting to be claimed.
    async fn pending_len(&self) -> AppResult<u64>;
}

/// Record of job identity, state, and latest progress.
///
/// Entries are partitioned by job ID. Only the worker holding a job mutates
/// it, so implementations need not serialize writes to a single entry, but
/// must tolerate concurrent calls for distinct entries.
#[async_trait]
pub trait JobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Create a PENDING job with a fresh identifier.
    async fn create(&self, input_path: &Path, output_path: &Path) -> AppResult<Job>;

    /// Fetch the current snapshot of a job. Fails with `NotFound`.
    async fn get(&self, job_id: JobId) -> AppResult<Job>;

    /// Mark the job RUNNING under `worker`.
    async fn mark_running(&self, job_id: JobId, worker: &WorkerId) -> AppResult<Job>;

    /// Replace the job's progress snapshot.
    async fn update_progress(&self, job_id: JobId, progress: Progress) -> AppResult<()>;

    /// Record the terminal result of a job.
    async fn complete(&self, job_id: JobId, result: ArchiveResult) -> AppResult<Job>;
}
