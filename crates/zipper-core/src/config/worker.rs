//! Worker pool configuration.

use serde::{Deserialize, Serialize};

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent worker loops.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// How long a single dequeue call waits for work, in milliseconds.
    #[serde(default = "default_dequeue_wait")]
    pub dequeue_wait_ms: u64,
    /// Per-job deadline in seconds. `None` disables the deadline.
    #[serde(default)]
    pub job_timeout_seconds: Option<u64>,
    /// Stable worker identifier. Generated when absent; required with a
    /// redis broker.
    #[serde(default)]
    pub worker_id: Option<String>,
    /// How long shutdown waits for in-flight jobs, in seconds.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            dequeue_wait_ms: default_dequeue_wait(),
            job_timeout_seconds: None,
            worker_id: None,
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_dequeue_wait() -> u64 {
    1000
}

fn default_shutdown_grace() -> u64 {
    30
}
