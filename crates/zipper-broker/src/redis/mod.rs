//! Redis broker and job store.

pub mod client;
pub mod queue;
pub mod store;

pub use client::RedisClient;
pub use queue::RedisBroker;
pub use store::RedisJobStore;
