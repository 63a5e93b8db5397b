//! # zipper-entity
//!
//! Domain models shared by the broker, the worker pool, and status readers.

pub mod job;

pub use job::{ArchiveResult, Job, JobState, Progress, QueueEntry};
