//! `PostgreSQL` adapters for durable queue persistence.

mod models;
mod repository;
mod schema;

pub use repository::{PostgresQueueRepository, QueuePgPool};
