//! Batch submission and status lookup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use zipper_broker::{Broker, JobStore};
use zipper_core::error::AppError;
use zipper_core::result::AppResult;
use zipper_core::types::JobId;
use zipper_entity::{ArchiveResult, Job};

/// Submission-level failures. No job is created when one of the
/// precondition variants is returned.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The parent path is missing or is not a directory.
    #[error("{path} is not an existing directory")]
    InvalidParent {
        /// The rejected parent path.
        path: PathBuf,
    },

    /// The parent directory has no immediate subdirectories.
    #[error("No subfolders found in {path} to archive")]
    NoSubfoldersFound {
        /// The parent directory that was scanned.
        path: PathBuf,
    },

    /// A job could not be submitted after the batch had started. Jobs
    /// submitted before it stay queued.
    #[error(
        "Batch submission stopped at '{name}' after {} queued jobs: {source}",
        .submitted.len()
    )]
    Incomplete {
        /// Subfolder whose job could not be submitted.
        name: String,
        /// Handles of the jobs queued before the failure.
        submitted: Vec<SubmittedJob>,
        /// The store or broker failure.
        source: AppError,
    },

    /// The store or broker failed.
    #[error(transparent)]
    App(#[from] AppError),
}

impl SubmitError {
    /// Handles of jobs that were queued before the error.
    pub fn submitted(&self) -> &[SubmittedJob] {
        match self {
            Self::Incomplete { submitted, .. } => submitted,
            _ => &[],
        }
    }
}

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::App(e) => e,
            SubmitError::Incomplete {
                name,
                submitted,
                source,
            } => AppError::with_source(
                source.kind,
                format!(
                    "Batch submission stopped at '{name}' after {} queued jobs",
                    submitted.len()
                ),
                source,
            ),
            other => AppError::validation(other.to_string()),
        }
    }
}

/// Handle returned for each submitted subfolder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedJob {
    /// Subfolder name, which is also the archive's base name.
    pub name: String,
    /// Job handle for status polling.
    pub job_id: JobId,
}

/// Creates jobs and enqueues them; never waits for execution.
#[derive(Debug, Clone)]
pub struct Submitter {
    /// Job store receiving new PENDING records.
    store: Arc<dyn JobStore>,
    /// Queue receiving one entry per job.
    broker: Arc<dyn Broker>,
}

impl Submitter {
    /// Create a new submitter
    pub fn new(store: Arc<dyn JobStore>, broker: Arc<dyn Broker>) -> Self {
        Self { store, broker }
    }

    /// Submit one job per immediate subdirectory of `parent_dir`, archiving
    /// into `output_dir`. Handles are returned in submission order, which is
    /// subfolder name order.
    ///
    /// If a job cannot be created or enqueued, submission stops and
    /// [`SubmitError::Incomplete`] carries the handles queued so far. The
    /// failing job, if it was created, is recorded as FAILED.
    pub async fn submit_batch(
        &self,
        parent_dir: &Path,
        output_dir: &Path,
    ) -> Result<Vec<SubmittedJob>, SubmitError> {
        let subfolders = list_subfolders(parent_dir).await?;
        let output_dir = std::path::absolute(output_dir).map_err(AppError::from)?;

        tracing::info!(
            "Queuing archive jobs for {} subfolders in '{}'",
            subfolders.len(),
            parent_dir.display()
        );

        let mut submitted = Vec::with_capacity(subfolders.len());
        for (name, path) in subfolders {
            match self.submit(&path, &output_dir).await {
                Ok(job_id) => submitted.push(SubmittedJob { name, job_id }),
                Err(source) => {
                    tracing::error!(
                        "Batch submission stopped at '{}' after {} jobs: {}",
                        name,
                        submitted.len(),
                        source
                    );
                    return Err(SubmitError::Incomplete {
                        name,
                        submitted,
                        source,
                    });
                }
            }
        }

        Ok(submitted)
    }

    /// Submit a single directory.
    pub async fn submit(&self, input_dir: &Path, output_dir: &Path) -> AppResult<JobId> {
        let job = self.store.create(input_dir, output_dir).await?;

        if let Err(e) = self.broker.enqueue(job.queue_entry()).await {
            let message = format!("Failed to enqueue job: {e}");
            if let Err(store_err) = self
                .store
                .complete(job.id, ArchiveResult::failed(String::new(), message))
                .await
            {
                tracing::error!(
                    "Job {} could not be enqueued or marked failed: {}",
                    job.id,
                    store_err
                );
            }
            return Err(e);
        }

        tracing::debug!("Submitted job {} for '{}'", job.id, input_dir.display());
        Ok(job.id)
    }

    /// Current snapshot of a job.
    pub async fn status(&self, job_id: JobId) -> AppResult<Job> {
        self.store.get(job_id).await
    }
}

/// Immediate subdirectories of `parent_dir` as `(name, absolute path)`,
/// sorted by name. Symlinks to directories count as subdirectories.
async fn list_subfolders(parent_dir: &Path) -> Result<Vec<(String, PathBuf)>, SubmitError> {
    let invalid = || SubmitError::InvalidParent {
        path: parent_dir.to_path_buf(),
    };

    let parent = tokio::fs::canonicalize(parent_dir)
        .await
        .map_err(|_| invalid())?;
    if !tokio::fs::metadata(&parent)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        return Err(invalid());
    }

    let mut entries = tokio::fs::read_dir(&parent).await.map_err(AppError::from)?;
    let mut subfolders = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(AppError::from)? {
        let path = entry.path();
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => {
                let name = entry.file_name().to_string_lossy().into_owned();
                subfolders.push((name, path));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Skipping unreadable entry '{}': {}", path.display(), e);
            }
        }
    }

    if subfolders.is_empty() {
        return Err(SubmitError::NoSubfoldersFound { path: parent });
    }

    subfolders.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(subfolders)
}
