//! Reliable queue over Redis lists.
//!
//! Producers `LPUSH` onto the pending list. A worker claims with
//! `LMOVE pending inflight:{worker} RIGHT LEFT`, so the entry is never
//! outside Redis while it is held, and acknowledges with `LREM`.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::time::Instant;
use tracing::debug;

use zipper_core::error::{AppError, ErrorKind};
use zipper_core::result::AppResult;
use zipper_core::types::WorkerId;
use zipper_entity::QueueEntry;

use super::client::RedisClient;
use crate::keys;
use crate::traits::Broker;

/// Redis-backed broker.
#[derive(Debug, Clone)]
pub struct RedisBroker {
    /// Redis client.
    client: RedisClient,
    /// Delay between polls of an empty pending list.
    poll_interval: Duration,
}

impl RedisBroker {
    /// Create a new Redis broker.
    pub fn new(client: RedisClient, poll_interval_ms: u64) -> Self {
        Self {
            client,
            poll_interval: Duration::from_millis(poll_interval_ms.max(1)),
        }
    }

    /// Map a Redis error to an AppError.
    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Broker, format!("Redis error: {e}"), e)
    }

    async fn try_claim(&self, worker: &WorkerId) -> AppResult<Option<QueueEntry>> {
        let pending = self.client.prefixed_key(&keys::pending_queue());
        let in_flight = self.client.prefixed_key(&keys::in_flight_queue(worker));
        let mut conn = self.client.conn_mut();

        let raw: Option<String> = redis::cmd("LMOVE")
            .arg(&pending)
            .arg(&in_flight)
            .arg("RIGHT")
            .arg("LEFT")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        match raw {
            Some(raw) => match QueueEntry::from_json(&raw) {
                Ok(entry) => Ok(Some(entry)),
                Err(e) => {
                    // Unparseable entries would be redelivered forever.
                    let _: i64 = conn.lrem(&in_flight, 1, &raw).await.map_err(Self::map_err)?;
                    Err(AppError::with_source(
                        ErrorKind::Serialization,
                        format!("Dropped malformed queue entry: {raw}"),
                        e,
                    ))
                }
            },
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn enqueue(&self, entry: QueueEntry) -> AppResult<()> {
        let key = self.client.prefixed_key(&keys::pending_queue());
        let raw = entry.to_json()?;
        let mut conn = self.client.conn_mut();
        let _: i64 = conn.lpush(&key, raw).await.map_err(Self::map_err)?;
        debug!(job_id = %entry.job_id, "Enqueued entry");
        Ok(())
    }

    async fn dequeue(&self, worker: &WorkerId, wait: Duration) -> AppResult<Option<QueueEntry>> {
        let deadline = Instant::now() + wait;

        loop {
            if let Some(entry) = self.try_claim(worker).await? {
                debug!(job_id = %entry.job_id, worker = %worker, "Dequeued entry");
                return Ok(Some(entry));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn ack(&self, worker: &WorkerId, entry: &QueueEntry) -> AppResult<()> {
        let key = self.client.prefixed_key(&keys::in_flight_queue(worker));
        let raw = entry.to_json()?;
        let mut conn = self.client.conn_mut();
        let removed: i64 = conn.lrem(&key, 1, raw).await.map_err(Self::map_err)?;
        debug!(job_id = %entry.job_id, worker = %worker, removed, "Acknowledged entry");
        Ok(())
    }

    async fn recover(&self, worker: &WorkerId) -> AppResult<usize> {
        let pending = self.client.prefixed_key(&keys::pending_queue());
        let in_flight = self.client.prefixed_key(&keys::in_flight_queue(worker));
        let mut conn = self.client.conn_mut();

        let mut count = 0;
        loop {
            // RIGHT end of pending is the next to be claimed.
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(&in_flight)
                .arg(&pending)
                .arg("LEFT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await
                .map_err(Self::map_err)?;
            if moved.is_none() {
                break;
            }
            count += 1;
        }

        if count > 0 {
            debug!(worker = %worker, count, "Requeued unacknowledged entries");
        }
        Ok(count)
    }

    async fn pending_len(&self) -> AppResult<u64> {
        let key = self.client.prefixed_key(&keys::pending_queue());
        let mut conn = self.client.conn_mut();
        let len: u64 = conn.llen(&key).await.map_err(Self::map_err)?;
        Ok(len)
    }
}
