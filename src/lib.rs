//! Conveyor: a durable, crash-tolerant task queue.
//!
//! Background compute tasks enter a persistent queue, are claimed
//! exclusively by workers through atomic conditional writes, and leave the
//! queue into a permanent activity archive. Exactly one worker processes a
//! task, tasks sharing a subject run one at a time in submission order,
//! and a crash never loses a task: orphaned claims are requeued with
//! their original position.
//!
//! # Architecture
//!
//! Conveyor follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (in-memory and
//!   `PostgreSQL`)
//!
//! # Modules
//!
//! - [`queue`]: Submission, claiming, and liveness reconciliation
//! - [`archive`]: Terminal outcomes and the latest-outcome index

pub mod archive;
pub mod queue;

#[cfg(test)]
pub(crate) mod test_support;
