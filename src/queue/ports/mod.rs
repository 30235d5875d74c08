//! Port contracts for the durable task queue.
//!
//! Ports define infrastructure-agnostic interfaces used by queue services.

pub mod repository;

pub use repository::{QueueRepository, QueueRepositoryError, QueueRepositoryResult};
