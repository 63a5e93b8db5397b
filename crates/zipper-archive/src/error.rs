//! Archive error taxonomy.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use zipper_core::error::{AppError, ErrorKind};

/// Errors raised while preparing or writing one archive.
///
/// Every variant carries the path that caused it.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The input path is missing or is not a directory.
    #[error("Invalid input: {path} is not an existing directory")]
    InvalidInput {
        /// The rejected input path.
        path: PathBuf,
    },

    /// The output directory could not be created.
    #[error("Failed to create output directory {path}: {source}")]
    DirectoryCreate {
        /// The directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A directory could not be read while enumerating files.
    #[error("Failed to traverse {path}: {source}")]
    Traversal {
        /// The entry that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Reading a source file or writing the archive failed.
    #[error("Failed to archive {path}: {source}")]
    ArchiveWrite {
        /// The source file or archive file involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Archiving stopped because the cancellation flag was raised.
    #[error("Archiving cancelled before {path}")]
    Cancelled {
        /// The next file that would have been written.
        path: PathBuf,
    },
}

impl ArchiveError {
    /// The path that caused the error.
    pub fn path(&self) -> &Path {
        match self {
            Self::InvalidInput { path }
            | Self::DirectoryCreate { path, .. }
            | Self::Traversal { path, .. }
            | Self::ArchiveWrite { path, .. }
            | Self::Cancelled { path } => path,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ArchiveWrite {
            path: path.into(),
            source,
        }
    }
}

impl From<ArchiveError> for AppError {
    fn from(err: ArchiveError) -> Self {
        let kind = match &err {
            ArchiveError::InvalidInput { .. } => ErrorKind::Validation,
            ArchiveError::Cancelled { .. } => ErrorKind::Timeout,
            _ => ErrorKind::Storage,
        };
        let message = err.to_string();
        AppError::with_source(kind, message, err)
    }
}
