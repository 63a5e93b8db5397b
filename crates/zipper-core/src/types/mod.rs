//! Shared strongly-typed values.

pub mod id;

pub use id::{JobId, WorkerId};
