//! Key builders for all Redis keys used by the zipper backends.
//!
//! Keys are returned without the configured prefix; the Redis client adds
//! it.

use zipper_core::types::{JobId, WorkerId};

/// List holding entries waiting to be claimed.
pub fn pending_queue() -> String {
    "queue:pending".to_string()
}

/// List holding entries claimed but not yet acknowledged by `worker`.
pub fn in_flight_queue(worker: &WorkerId) -> String {
    format!("queue:inflight:{worker}")
}

/// JSON record of a job.
pub fn job_record(job_id: JobId) -> String {
    format!("job:{job_id}")
}
