//! In-memory broker using a tokio-guarded deque and per-worker in-flight sets.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;

use zipper_core::result::AppResult;
use zipper_core::types::WorkerId;
use zipper_entity::QueueEntry;

use crate::traits::Broker;

/// In-process FIFO broker.
#[derive(Debug, Default)]
pub struct MemoryBroker {
    /// Entries waiting to be claimed.
    pending: Mutex<VecDeque<QueueEntry>>,
    /// Wakes one waiting worker per enqueued entry.
    available: Notify,
    /// Claimed, unacknowledged entries by worker.
    in_flight: DashMap<WorkerId, Vec<QueueEntry>>,
}

impl MemoryBroker {
    /// Create an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries claimed by `worker` and not yet acknowledged.
    pub fn in_flight_len(&self, worker: &WorkerId) -> usize {
        self.in_flight.get(worker).map(|e| e.len()).unwrap_or(0)
    }

    async fn try_claim(&self, worker: &WorkerId) -> Option<QueueEntry> {
        let entry = self.pending.lock().await.pop_front()?;
        self.in_flight
            .entry(worker.clone())
            .or_default()
            .push(entry.clone());
        Some(entry)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn enqueue(&self, entry: QueueEntry) -> AppResult<()> {
        debug!(job_id = %entry.job_id, "Enqueued entry");
        self.pending.lock().await.push_back(entry);
        self.available.notify_one();
        Ok(())
    }

    async fn dequeue(&self, worker: &WorkerId, wait: Duration) -> AppResult<Option<QueueEntry>> {
        let deadline = Instant::now() + wait;

        loop {
            if let Some(entry) = self.try_claim(worker).await {
                debug!(job_id = %entry.job_id, worker = %worker, "Dequeued entry");
                return Ok(Some(entry));
            }
            if tokio::time::timeout_at(deadline, self.available.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }

    async fn ack(&self, worker: &WorkerId, entry: &QueueEntry) -> AppResult<()> {
        if let Some(mut held) = self.in_flight.get_mut(worker) {
            if let Some(pos) = held.iter().position(|e| e.job_id == entry.job_id) {
                held.remove(pos);
            }
        }
        debug!(job_id = %entry.job_id, worker = %worker, "Acknowledged entry");
        Ok(())
    }

    async fn recover(&self, worker: &WorkerId) -> AppResult<usize> {
        let Some((_, held)) = self.in_flight.remove(worker) else {
            return Ok(0);
        };

        let count = held.len();
        let mut pending = self.pending.lock().await;
        for entry in held.into_iter().rev() {
            pending.push_front(entry);
        }
        drop(pending);

        for _ in 0..count {
            self.available.notify_one();
        }
        if count > 0 {
            debug!(worker = %worker, count, "Requeued unacknowledged entries");
        }
        Ok(count)
    }

    async fn pending_len(&self) -> AppResult<u64> {
        Ok(self.pending.lock().await.len() as u64)
    }
}
