//! In-memory job store: a DashMap for live jobs and a moka cache for
//! finished ones.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use moka::future::Cache;
use tracing::debug;

use zipper_core::config::store::StoreConfig;
use zipper_core::error::AppError;
use zipper_core::result::AppResult;
use zipper_core::types::{JobId, WorkerId};
use zipper_entity::{ArchiveResult, Job, JobState, Progress};

use crate::traits::JobStore;

/// In-memory job store.
///
/// PENDING and RUNNING records are held until they finish. Terminal
/// records move to a cache bounded by `max_capacity` and expire after
/// `result_ttl_seconds`.
#[derive(Debug, Clone)]
pub struct MemoryJobStore {
    /// Non-terminal records by ID.
    active: Arc<DashMap<JobId, Job>>,
    /// Terminal records by ID.
    finished: Cache<JobId, Job>,
}

impl MemoryJobStore {
    /// Create a new in-memory store from configuration.
    pub fn new(config: &StoreConfig) -> Self {
        let finished = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.result_ttl_seconds))
            .build();
        Self {
            active: Arc::new(DashMap::new()),
            finished,
        }
    }

    /// Number of live records per state.
    pub fn counts(&self) -> HashMap<JobState, u64> {
        let mut counts: HashMap<JobState, u64> =
            JobState::ALL.iter().map(|state| (*state, 0)).collect();
        for entry in self.active.iter() {
            *counts.entry(entry.value().state).or_default() += 1;
        }
        for (_, job) in self.finished.iter() {
            *counts.entry(job.state).or_default() += 1;
        }
        counts
    }

    async fn load(&self, job_id: JobId) -> AppResult<Job> {
        let active = self.active.get(&job_id).map(|entry| entry.value().clone());
        if let Some(job) = active {
            return Ok(job);
        }
        self.finished
            .get(&job_id)
            .await
            .ok_or_else(|| AppError::not_found(format!("Job {job_id} not found")))
    }

    async fn modify(
        &self,
        job_id: JobId,
        apply: impl FnOnce(&mut Job) -> AppResult<()> + Send,
    ) -> AppResult<Job> {
        let mut job = self.load(job_id).await?;
        apply(&mut job)?;
        if job.state.is_terminal() {
            // Readable from `finished` before it leaves `active`.
            self.finished.insert(job_id, job.clone()).await;
            self.active.remove(&job_id);
        } else {
            self.active.insert(job_id, job.clone());
        }
        Ok(job)
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, input_path: &Path, output_path: &Path) -> AppResult<Job> {
        let job = Job::new(input_path, output_path);
        self.active.insert(job.id, job.clone());
        debug!(job_id = %job.id, input = %input_path.display(), "Created job");
        Ok(job)
    }

    async fn get(&self, job_id: JobId) -> AppResult<Job> {
        self.load(job_id).await
    }

    async fn mark_running(&self, job_id: JobId, worker: &WorkerId) -> AppResult<Job> {
        self.modify(job_id, |job| job.mark_running(worker)).await
    }

    async fn update_progress(&self, job_id: JobId, progress: Progress) -> AppResult<()> {
        self.modify(job_id, |job| job.apply_progress(progress))
            .await
            .map(|_| ())
    }

    async fn complete(&self, job_id: JobId, result: ArchiveResult) -> AppResult<Job> {
        self.modify(job_id, |job| job.finish(result)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use zipper_core::error::ErrorKind;

    fn make_store() -> MemoryJobStore {
        MemoryJobStore::new(&StoreConfig::default())
    }

    #[tokio::test]
    async fn test_create_get() {
        let store = make_store();
        let job = store
            .create(Path::new("/in/x"), Path::new("/out"))
            .await
            .unwrap();
        let fetched = store.get(job.id).await.unwrap();
        assert_eq!(fetched.state, JobState::Pending);
        assert_eq!(fetched.input_path, Path::new("/in/x"));
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let err = make_store().get(JobId::new()).await.unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let store = make_store();
        let worker = WorkerId::new("w");
        let job = store
            .create(Path::new("/in/x"), Path::new("/out"))
            .await
            .unwrap();

        store.mark_running(job.id, &worker).await.unwrap();
        store
            .update_progress(job.id, Progress::new(1, 1, "a.txt"))
            .await
            .unwrap();
        let done = store
            .complete(job.id, ArchiveResult::succeeded("/out/x.zip", 1))
            .await
            .unwrap();

        assert_eq!(done.state, JobState::Succeeded);
        assert_eq!(store.get(job.id).await.unwrap().attempts, 1);
        let err = store
            .complete(job.id, ArchiveResult::failed("", "again"))
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::Conflict));
    }

    #[tokio::test]
    async fn test_rejected_mutation_leaves_record_untouched() {
        let store = make_store();
        let job = store
            .create(Path::new("/in/x"), Path::new("/out"))
            .await
            .unwrap();
        assert!(store
            .update_progress(job.id, Progress::new(1, 2, "a"))
            .await
            .is_err());
        let fetched = store.get(job.id).await.unwrap();
        assert!(fetched.progress.is_none());
        assert_eq!(fetched.state, JobState::Pending);
    }

    #[tokio::test]
    async fn test_concurrent_distinct_jobs() {
        let store = Arc::new(make_store());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let worker = WorkerId::new(format!("w{i}"));
                let job = store
                    .create(Path::new("/in"), Path::new("/out"))
                    .await
                    .unwrap();
                store.mark_running(job.id, &worker).await.unwrap();
                for n in 1..=10 {
                    store
                        .update_progress(job.id, Progress::new(n, 10, format!("f{n}")))
                        .await
                        .unwrap();
                }
                store
                    .complete(job.id, ArchiveResult::succeeded("/out/x.zip", 10))
                    .await
                    .unwrap()
            }));
        }
        for h in handles {
            let job = h.await.unwrap();
            assert_eq!(job.progress.unwrap().files_processed, 10);
        }
        assert_eq!(store.counts()[&JobState::Succeeded], 16);
        assert_eq!(store.counts()[&JobState::Pending], 0);
    }

    #[tokio::test]
    async fn test_capacity_never_evicts_unfinished_jobs() {
        let store = MemoryJobStore::new(&StoreConfig {
            max_capacity: 2,
            ..StoreConfig::default()
        });
        let mut ids = Vec::new();
        for i in 0..50 {
            let job = store
                .create(Path::new(&format!("/in/{i}")), Path::new("/out"))
                .await
                .unwrap();
            ids.push(job.id);
        }
        store.finished.run_pending_tasks().await;

        for id in &ids {
            assert_eq!(store.get(*id).await.unwrap().state, JobState::Pending);
        }
        assert_eq!(store.counts()[&JobState::Pending], 50);

        for id in &ids {
            store
                .complete(*id, ArchiveResult::failed("", "stopped"))
                .await
                .unwrap();
        }
        store.finished.run_pending_tasks().await;

        assert!(store.active.is_empty());
        assert!(store.finished.entry_count() <= 2);
    }
}
