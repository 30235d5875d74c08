//! Durable, crash-tolerant task queue.
//!
//! Tasks are submitted as pending rows, claimed by workers through a
//! conditional compare-and-swap transition, and requeued when their worker
//! disappears. Waiting order is first-in-first-out per subject, where the
//! subject is the task's entity key, falling back to its component key.
//! The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
