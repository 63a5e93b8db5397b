//! Archive job handler. Runs one queue entry through the executor and
//! records every state change in the job store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use zipper_archive::{ArchiveError, ArchiveExecutor, ArchivePlan};
use zipper_broker::JobStore;
use zipper_core::result::AppResult;
use zipper_core::types::{JobId, WorkerId};
use zipper_entity::{ArchiveResult, Job, Progress, QueueEntry};

/// Executes archive jobs on behalf of a worker slot.
#[derive(Debug)]
pub struct ArchiveJobHandler {
    /// Job store receiving state, progress, and results.
    store: Arc<dyn JobStore>,
    /// Archive executor.
    executor: ArchiveExecutor,
    /// Optional per-job deadline for the archive writing phase.
    job_timeout: Option<Duration>,
}

impl ArchiveJobHandler {
    /// Create a new archive job handler
    pub fn new(
        store: Arc<dyn JobStore>,
        executor: ArchiveExecutor,
        job_timeout: Option<Duration>,
    ) -> Self {
        Self {
            store,
            executor,
            job_timeout,
        }
    }

    /// Run the job behind `entry` to a terminal state.
    ///
    /// Per-job failures end up as a FAILED record and are not returned as
    /// errors. An `Err` means the store could not be read or written.
    pub async fn process(&self, entry: &QueueEntry, worker: &WorkerId) -> AppResult<Job> {
        let job_id = entry.job_id;
        let job = self.store.get(job_id).await?;
        if job.state.is_terminal() {
            info!("Job {} is already {}, skipping redelivered entry", job_id, job.state);
            return Ok(job);
        }

        let plan = match self.prepare(entry).await {
            Ok(plan) => plan,
            Err(message) => return self.fail(job_id, String::new(), message).await,
        };

        if plan.is_empty() {
            info!(
                "Job {}: no files under '{}', nothing to archive",
                job_id,
                plan.root().display()
            );
            return self.store.complete(job_id, plan.empty_result()).await;
        }

        let job = self.store.mark_running(job_id, worker).await?;
        info!(
            "Job {} running on '{}' (attempt {}): {} files -> '{}'",
            job_id,
            worker,
            job.attempts,
            plan.files_total(),
            plan.archive_path().display()
        );

        let archive_path = plan.archive_path().to_string_lossy().into_owned();
        match self.write(job_id, plan).await {
            Ok(result) => {
                info!("Job {} archived {} files", job_id, result.files_archived);
                self.store.complete(job_id, result).await
            }
            Err(message) => self.fail(job_id, archive_path, message).await,
        }
    }

    /// Validate, create the output directory, and enumerate on a blocking thread.
    async fn prepare(&self, entry: &QueueEntry) -> Result<ArchivePlan, String> {
        let executor = self.executor.clone();
        let input = entry.input_path.clone();
        let output = entry.output_path.clone();

        match tokio::task::spawn_blocking(move || executor.prepare(&input, &output)).await {
            Ok(Ok(plan)) => Ok(plan),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("Archive preparation aborted: {e}")),
        }
    }

    /// Write the archive on a blocking thread while forwarding progress.
    async fn write(&self, job_id: JobId, plan: ArchivePlan) -> Result<ArchiveResult, String> {
        let (tx, rx) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(forward_progress(Arc::clone(&self.store), job_id, rx));

        let cancel = Arc::new(AtomicBool::new(false));
        let mut task = {
            let cancel = Arc::clone(&cancel);
            tokio::task::spawn_blocking(move || {
                plan.write(
                    move |progress: Progress| {
                        // Only fails once the forwarder is gone.
                        let _ = tx.send(progress);
                    },
                    &cancel,
                )
            })
        };

        let mut timed_out = false;
        let joined = match self.job_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("Job {} exceeded its {:?} deadline, cancelling", job_id, limit);
                    timed_out = true;
                    cancel.store(true, Ordering::Relaxed);
                    task.await
                }
            },
            None => task.await,
        };

        // All progress must land before the terminal result.
        if let Err(e) = forwarder.await {
            warn!("Progress forwarder for job {} aborted: {}", job_id, e);
        }

        match joined {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(ArchiveError::Cancelled { .. })) if timed_out => Err(format!(
                "Timeout: archiving exceeded {}s",
                self.job_timeout.unwrap_or_default().as_secs()
            )),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("Archive task aborted: {e}")),
        }
    }

    async fn fail(&self, job_id: JobId, archive_path: String, message: String) -> AppResult<Job> {
        warn!("Job {} failed: {}", job_id, message);
        self.store
            .complete(job_id, ArchiveResult::failed(archive_path, message))
            .await
    }
}

/// Push progress snapshots into the store in emission order.
async fn forward_progress(
    store: Arc<dyn JobStore>,
    job_id: JobId,
    mut rx: mpsc::UnboundedReceiver<Progress>,
) {
    while let Some(mut progress) = rx.recv().await {
        // Collapse a backlog into its newest snapshot.
        while let Ok(newer) = rx.try_recv() {
            progress = newer;
        }
        debug!(
            job_id = %job_id,
            processed = progress.files_processed,
            total = progress.files_total,
            "Progress"
        );
        if let Err(e) = store.update_progress(job_id, progress).await {
            warn!("Dropped progress update for job {}: {}", job_id, e);
        }
    }
}
