//! Redis job store keeping one JSON record per job.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use zipper_core::error::{AppError, ErrorKind};
use zipper_core::result::AppResult;
use zipper_core::types::{JobId, WorkerId};
use zipper_entity::{ArchiveResult, Job, Progress};

use super::client::RedisClient;
use crate::keys;
use crate::traits::JobStore;

/// Redis-backed job store. Every write refreshes the record's TTL.
#[derive(Debug, Clone)]
pub struct RedisJobStore {
    /// Redis client.
    client: RedisClient,
    /// Record retention.
    ttl: Duration,
}

impl RedisJobStore {
    /// Create a new Redis job store.
    pub fn new(client: RedisClient, result_ttl_seconds: u64) -> Self {
        Self {
            client,
            ttl: Duration::from_secs(result_ttl_seconds.max(1)),
        }
    }

    /// Map a Redis error to an AppError.
    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Store, format!("Redis error: {e}"), e)
    }

    async fn save(&self, job: &Job) -> AppResult<()> {
        let key = self.client.prefixed_key(&keys::job_record(job.id));
        let raw = serde_json::to_string(job)?;
        let mut conn = self.client.conn_mut();
        let _: () = conn
            .set_ex(&key, raw, self.ttl.as_secs())
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn modify(
        &self,
        job_id: JobId,
        apply: impl FnOnce(&mut Job) -> AppResult<()> + Send,
    ) -> AppResult<Job> {
        let mut job = self.get(job_id).await?;
        apply(&mut job)?;
        self.save(&job).await?;
        Ok(job)
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn create(&self, input_path: &Path, output_path: &Path) -> AppResult<Job> {
        let job = Job::new(input_path, output_path);
        let key = self.client.prefixed_key(&keys::job_record(job.id));
        let raw = serde_json::to_string(&job)?;
        let mut conn = self.client.conn_mut();

        let created: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(raw)
            .arg("EX")
            .arg(self.ttl.as_secs())
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        if created.is_none() {
            return Err(AppError::conflict(format!("Job {} already exists", job.id)));
        }
        debug!(job_id = %job.id, input = %input_path.display(), "Created job");
        Ok(job)
    }

    async fn get(&self, job_id: JobId) -> AppResult<Job> {
        let key = self.client.prefixed_key(&keys::job_record(job_id));
        let mut conn = self.client.conn_mut();
        let raw: Option<String> = conn.get(&key).await.map_err(Self::map_err)?;
        let raw = raw.ok_or_else(|| AppError::not_found(format!("Job {job_id} not found")))?;
        Ok(serde_json::from_str(&raw)?)
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
