//! Job entity model and its state machine.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use zipper_core::error::AppError;
use zipper_core::result::AppResult;
use zipper_core::types::{JobId, WorkerId};

use super::entry::QueueEntry;
use super::progress::Progress;
use super::state::JobState;

/// Final outcome of an archive job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveResult {
    /// Terminal state the job resolved to.
    pub state: JobState,
    /// Computed archive path (`<output>/<base>.<ext>`). May be empty when
    /// the job failed before the path could be derived.
    pub archive_path: String,
    /// Number of entries written into the archive.
    pub files_archived: u64,
    /// Error description for failed jobs.
    pub error_message: Option<String>,
}

impl ArchiveResult {
    /// A completely written archive.
    pub fn succeeded(archive_path: impl Into<String>, files_archived: u64) -> Self {
        Self {
            state: JobState::Succeeded,
            archive_path: archive_path.into(),
            files_archived,
            error_message: None,
        }
    }

    /// An input without regular files.
    pub fn empty(archive_path: impl Into<String>) -> Self {
        Self {
            state: JobState::Empty,
            archive_path: archive_path.into(),
            files_archived: 0,
            error_message: None,
        }
    }

    /// A failed job.
    pub fn failed(archive_path: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            state: JobState::Failed,
            archive_path: archive_path.into(),
            files_archived: 0,
            error_message: Some(error_message.into()),
        }
    }
}

/// One "archive this directory" job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Directory to archive.
    pub input_path: PathBuf,
    /// Directory receiving the archive.
    pub output_path: PathBuf,
    /// Current lifecycle state.
    pub state: JobState,
    /// Latest progress snapshot of the current attempt.
    pub progress: Option<Progress>,
    /// Final result, present only in terminal states.
    pub result: Option<ArchiveResult>,
    /// Number of times a worker started this job.
    pub attempts: u32,
    /// Worker currently (or last) holding the job.
    pub worker_id: Option<WorkerId>,
    /// When the job was submitted.
    pub created_at: DateTime<Utc>,
    /// When the current attempt started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new pending job with a fresh identifier.
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            id: JobId::new(),
            input_path: input_path.into(),
            output_path: output_path.into(),
            state: JobState::Pending,
            progress: None,
            result: None,
            attempts: 0,
            worker_id: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Build the queue payload for this job.
    pub fn queue_entry(&self) -> QueueEntry {
        QueueEntry {
            job_id: self.id,
            input_path: self.input_path.clone(),
            output_path: self.output_path.clone(),
        }
    }

    /// Transition to RUNNING under `worker`.
    ///
    /// A RUNNING job may be started again when its entry is redelivered;
    /// that begins a new attempt and clears the previous attempt's progress.
    pub fn mark_running(&mut self, worker: &WorkerId) -> AppResult<()> {
        self.ensure_not_terminal("start")?;
        self.state = JobState::Running;
        self.attempts += 1;
        self.worker_id = Some(worker.clone());
        self.started_at = Some(Utc::now());
        self.progress = None;
        Ok(())
    }

    /// Record a progress snapshot for the running attempt.
    pub fn apply_progress(&mut self, progress: Progress) -> AppResult<()> {
        self.ensure_not_terminal("update progress of")?;
        if self.state != JobState::Running {
            return Err(AppError::conflict(format!(
                "Job {} is {} and cannot report progress",
                self.id, self.state
            )));
        }
        if progress.files_processed > progress.files_total {
            return Err(AppError::validation(format!(
                "Progress for job {} exceeds total ({} > {})",
                self.id, progress.files_processed, progress.files_total
            )));
        }
        if let Some(current) = &self.progress {
            if progress.files_total != current.files_total {
                return Err(AppError::validation(format!(
                    "Total file count of job {} changed from {} to {}",
                    self.id, current.files_total, progress.files_total
                )));
            }
            if progress.files_processed < current.files_processed {
                return Err(AppError::validation(format!(
                    "Progress of job {} went backwards ({} < {})",
                    self.id, progress.files_processed, current.files_processed
                )));
            }
        }
        self.progress = Some(progress);
        Ok(())
    }

    /// Move the job into the terminal state carried by `result`.
    pub fn finish(&mut self, result: ArchiveResult) -> AppResult<()> {
        self.ensure_not_terminal("complete")?;
        match result.state {
            JobState::Failed | JobState::Empty => {}
            JobState::Succeeded if self.state == JobState::Running => {}
            JobState::Succeeded => {
                return Err(AppError::conflict(format!(
                    "Job {} cannot succeed without running",
                    self.id
                )));
            }
            other => {
                return Err(AppError::validation(format!(
                    "Result state '{other}' is not terminal"
                )));
            }
        }
        self.state = result.state;
        self.result = Some(result);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    fn ensure_not_terminal(&self, action: &str) -> AppResult<()> {
        if self.state.is_terminal() {
            return Err(AppError::conflict(format!(
                "Cannot {action} job {}: already {}",
                self.id, self.state
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zipper_core::error::ErrorKind;

    fn running_job() -> Job {
        let mut job = Job::new("/in/x", "/out");
        job.mark_running(&WorkerId::new("w")).unwrap();
        job
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = Job::new("/in/x", "/out");
        assert_eq!(job.state, JobState::Pending);
        assert!(job.result.is_none());
        assert_eq!(job.queue_entry().job_id, job.id);
    }

    #[test]
    fn test_happy_path() {
        let mut job = running_job();
        job.apply_progress(Progress::new(1, 2, "a.txt")).unwrap();
        job.apply_progress(Progress::new(2, 2, "sub/b.txt")).unwrap();
        job.finish(ArchiveResult::succeeded("/out/x.zip", 2)).unwrap();

        assert_eq!(job.state, JobState::Succeeded);
        assert_eq!(job.progress.as_ref().unwrap().percent, 100);
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_empty_and_failed_skip_running() {
        let mut empty = Job::new("/in/e", "/out");
        empty.finish(ArchiveResult::empty("/out/e.zip")).unwrap();
        assert_eq!(empty.state, JobState::Empty);
        assert_eq!(empty.attempts, 0);

        let mut failed = Job::new("/in/f", "/out");
        failed
            .finish(ArchiveResult::failed("", "not a directory"))
            .unwrap();
        assert_eq!(failed.state, JobState::Failed);
    }

    #[test]
    fn test_cannot_succeed_from_pending() {
        let mut job = Job::new("/in/x", "/out");
        let err = job
            .finish(ArchiveResult::succeeded("/out/x.zip", 1))
            .unwrap_err();
        assert!(err.is(ErrorKind::Conflict));
    }

    #[test]
    fn test_terminal_job_is_immutable() {
        let mut job = running_job();
        job.finish(ArchiveResult::succeeded("/out/x.zip", 1)).unwrap();

        assert!(job.mark_running(&WorkerId::new("w2")).is_err());
        assert!(job.apply_progress(Progress::new(1, 1, "a")).is_err());
        let err = job.finish(ArchiveResult::failed("", "late")).unwrap_err();
        assert!(err.is(ErrorKind::Conflict));
        assert_eq!(job.state, JobState::Succeeded);
    }

    #[test]
    fn test_progress_requires_running() {
        let mut job = Job::new("/in/x", "/out");
        let err = job.apply_progress(Progress::new(1, 2, "a")).unwrap_err();
        assert!(err.is(ErrorKind::Conflict));
    }

    #[test]
    fn test_progress_must_not_regress() {
        let mut job = running_job();
        job.apply_progress(Progress::new(2, 3, "b")).unwrap();
        let err = job.apply_progress(Progress::new(1, 3, "a")).unwrap_err();
        assert!(err.is(ErrorKind::Validation));
    }

    #[test]
    fn test_total_is_fixed() {
        let mut job = running_job();
        job.apply_progress(Progress::new(1, 3, "a")).unwrap();
        let err = job.apply_progress(Progress::new(2, 4, "b")).unwrap_err();
        assert!(err.is(ErrorKind::Validation));
    }

    #[test]
    fn test_redelivery_starts_new_attempt() {
        let mut job = running_job();
        job.apply_progress(Progress::new(2, 3, "b")).unwrap();

        job.mark_running(&WorkerId::new("w2")).unwrap();
        assert_eq!(job.attempts, 2);
        assert!(job.progress.is_none());
        job.apply_progress(Progress::new(1, 3, "a")).unwrap();
    }

    #[test]
    fn test_job_json_shape() {
        let mut job = running_job();
        job.apply_progress(Progress::new(1, 4, "a.txt")).unwrap();
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["state"], "running");
        assert_eq!(value["progress"]["percent"], 25);
        assert_eq!(value["progress"]["current_path"], "a.txt");
    }
}
