//! # zipper-archive
//!
//! Archives one directory into a deflate-compressed zip file.
//!
//! Archiving is two-pass: [`ArchiveExecutor::prepare`] validates the input,
//! creates the output directory, and enumerates every regular file, then
//! [`ArchivePlan::write`] streams those files into the archive while
//! reporting progress to a [`ProgressSink`].
//!
//! Everything here is blocking I/O; async callers run it on a blocking
//! thread.

pub mod error;
pub mod executor;
pub mod sink;

pub use error::ArchiveError;
pub use executor::{ArchiveExecutor, ArchivePlan};
pub use sink::ProgressSink;
