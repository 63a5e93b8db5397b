//! Archive job domain entities.

pub mod entry;
pub mod model;
pub mod progress;
pub mod state;

pub use entry::QueueEntry;
pub use model::{ArchiveResult, Job};
pub use progress::Progress;
pub use state::JobState;
