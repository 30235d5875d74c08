//! In-memory adapters for queue persistence.

mod queue;

pub use queue::InMemoryQueueRepository;
