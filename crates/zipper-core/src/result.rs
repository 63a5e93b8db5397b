//! Convenience result type alias for the zipper service.

use crate::error::AppError;

/// A specialized `Result` type for zipper operations.
pub type AppResult<T> = Result<T, AppError>;
