//! Worker pool: a fixed set of slots, each claiming and executing one job
//! at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;

use zipper_archive::ArchiveExecutor;
use zipper_broker::{Broker, JobStore};
use zipper_core::config::worker::WorkerConfig;
use zipper_core::error::ErrorKind;
use zipper_core::types::WorkerId;
use zipper_entity::QueueEntry;

use crate::handler::ArchiveJobHandler;

/// Back-off after a broker or store error before the slot polls again.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Pool of worker slots sharing one broker and one job store.
#[derive(Debug)]
pub struct WorkerPool {
    /// Queue the slots claim from.
    broker: Arc<dyn Broker>,
    /// Job handler shared by all slots.
    handler: Arc<ArchiveJobHandler>,
    /// Worker configuration.
    config: WorkerConfig,
    /// Worker identifier; slot IDs derive from it.
    worker_id: WorkerId,
}

impl WorkerPool {
    /// Create a new worker pool
    pub fn new(
        broker: Arc<dyn Broker>,
        store: Arc<dyn JobStore>,
        executor: ArchiveExecutor,
        config: WorkerConfig,
    ) -> Self {
        let worker_id = config
            .worker_id
            .clone()
            .map(WorkerId::new)
            .unwrap_or_else(WorkerId::generate);
        let job_timeout = config.job_timeout_seconds.map(Duration::from_secs);
        let handler = Arc::new(ArchiveJobHandler::new(store, executor, job_timeout));

        Self {
            broker,
            handler,
            config,
            worker_id,
        }
    }

    /// Run all slots until the cancel signal is received, then wait for
    /// in-flight jobs to finish.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        let concurrency = self.config.concurrency.max(1);
        tracing::info!(
            "Worker '{}' started with concurrency={}, dequeue_wait={}ms",
            self.worker_id,
            concurrency,
            self.config.dequeue_wait_ms
        );

        let mut slots = JoinSet::new();
        for index in 0..concurrency {
            let slot = WorkerSlot {
                id: self.worker_id.slot(index),
                broker: Arc::clone(&self.broker),
                handler: Arc::clone(&self.handler),
                wait: Duration::from_millis(self.config.dequeue_wait_ms),
            };
            slots.spawn(slot.run(cancel.clone()));
        }

        while !*cancel.borrow_and_update() {
            if cancel.changed().await.is_err() {
                break;
            }
        }

        tracing::info!(
            "Worker '{}' waiting for in-flight jobs to complete...",
            self.worker_id
        );

        let grace = Duration::from_secs(self.config.shutdown_grace_seconds);
        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = slots.join_next().await {
                if let Err(e) = joined {
                    tracing::error!("Worker slot panicked: {}", e);
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                "Worker '{}' abandoning jobs still running after {}s; they will be redelivered",
                self.worker_id,
                grace.as_secs()
            );
            slots.abort_all();
        }

        tracing::info!("Worker '{}' shut down complete", self.worker_id);
    }
}

/// One concurrent execution lane of the pool.
struct WorkerSlot {
    id: WorkerId,
    broker: Arc<dyn Broker>,
    handler: Arc<ArchiveJobHandler>,
    wait: Duration,
}

impl WorkerSlot {
    async fn run(self, mut cancel: watch::Receiver<bool>) {
        self.requeue_unacked().await;

        loop {
            if *cancel.borrow() {
                break;
            }

            let claimed = tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                claimed = self.broker.dequeue(&self.id, self.wait) => claimed,
            };

            match claimed {
                Ok(Some(entry)) => {
                    if !self.execute(entry).await {
                        tokio::select! {
                            _ = cancel.changed() => {}
                            _ = tokio::time::sleep(RETRY_DELAY) => {}
                        }
                        self.requeue_unacked().await;
                    }
                }
                Ok(None) => tracing::trace!("Slot '{}' found no work", self.id),
                Err(e) => {
                    tracing::error!("Slot '{}' failed to dequeue: {}", self.id, e);
                    tokio::select! {
                        _ = cancel.changed() => {}
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }

        tracing::debug!("Slot '{}' stopped", self.id);
    }

    /// Put this slot's unacknowledged entries back on the pending queue.
    async fn requeue_unacked(&self) {
        match self.broker.recover(&self.id).await {
            Ok(0) => {}
            Ok(count) => tracing::info!(
                "Slot '{}' requeued {} unacknowledged entries",
                self.id,
                count
            ),
            Err(e) => tracing::error!("Slot '{}' failed to recover entries: {}", self.id, e),
        }
    }

    /// Run one entry. Returns `false` when the entry was left unacknowledged.
    async fn execute(&self, entry: QueueEntry) -> bool {
        let job_id = entry.job_id;
        tracing::info!(
            "Processing job: id={}, input='{}'",
            job_id,
            entry.input_path.display()
        );

        match self.handler.process(&entry, &self.id).await {
            Ok(job) => {
                tracing::info!("Job {} finished as {}", job_id, job.state);
                self.ack(&entry).await;
                true
            }
            Err(e) if e.is(ErrorKind::NotFound) => {
                tracing::warn!("Job {} has no record, discarding entry", job_id);
                self.ack(&entry).await;
                true
            }
            Err(e) => {
                tracing::error!("Job {} could not be recorded: {}", job_id, e);
                false
            }
        }
    }

    async fn ack(&self, entry: &QueueEntry) {
        if let Err(e) = self.broker.ack(&self.id, entry).await {
            tracing::error!("Failed to acknowledge job {}: {}", entry.job_id, e);
        }
    }
}
