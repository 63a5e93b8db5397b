//! In-process broker and job store.

pub mod queue;
pub mod store;

pub use queue::MemoryBroker;
pub use store::MemoryJobStore;
