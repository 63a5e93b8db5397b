//! Queue payload.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use zipper_core::types::JobId;

/// The minimal payload needed to re-derive a job's work.
///
/// Serialized as JSON when the broker is an external service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Job this entry belongs to.
    pub job_id: JobId,
    /// Directory to archive.
    pub input_path: PathBuf,
    /// Directory receiving the archive.
    pub output_path: PathBuf,
}

impl QueueEntry {
    /// Encode the entry as a JSON string.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Decode an entry from a JSON string.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
