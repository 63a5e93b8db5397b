//! Archive job execution and submission for the zipper service.
//!
//! This crate provides:
//! - A worker pool whose slots claim queue entries and run them
//! - The archive job handler that drives the executor and records state
//! - The batch submission and status API used by front ends

pub mod handler;
pub mod runner;
pub mod submit;

pub use handler::ArchiveJobHandler;
pub use runner::WorkerPool;
pub use submit::{SubmitError, SubmittedJob, Submitter};
