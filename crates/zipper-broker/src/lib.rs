//! # zipper-broker
//!
//! Queue and job-status backends for the zipper service. Two backends are
//! available for each seam:
//!
//! - **memory**: in-process, using tokio primitives, [moka](https://crates.io/crates/moka)
//!   and [dashmap](https://crates.io/crates/dashmap)
//! - **redis**: a reliable queue over Redis lists plus JSON job records,
//!   using the [redis](https://crates.io/crates/redis) crate
//!
//! The backend is selected at runtime based on configuration.

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;
pub mod traits;

pub use provider::{connect_broker, connect_store};
pub use traits::{Broker, JobStore};
