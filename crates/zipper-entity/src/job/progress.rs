//! Progress snapshots emitted while an archive is written.

use serde::{Deserialize, Serialize};

/// Point-in-time count of files processed out of a known total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Files written into the archive so far.
    pub files_processed: u64,
    /// Regular files found during traversal. Fixed for the whole attempt.
    pub files_total: u64,
    /// `floor(files_processed / files_total * 100)`.
    pub percent: u8,
    /// In-archive path of the file written last.
    pub current_path: String,
}

impl Progress {
    /// Build a snapshot, deriving `percent` from the processed count.
    pub fn new(files_processed: u64, files_total: u64, current_path: impl Into<String>) -> Self {
        Self {
            files_processed,
            files_total,
            percent: percent_of(files_processed, files_total),
            current_path: current_path.into(),
        }
    }
}

/// Integer percentage, floored and clamped to 100. Zero when `total` is zero.
pub fn percent_of(processed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (u128::from(processed) * 100) / u128::from(total);
    pct.min(100) as u8
}
