//! `PostgreSQL` adapters for durable archive persistence.

mod models;
mod repository;
mod schema;

pub use repository::{ArchivePgPool, PostgresArchiveRepository};
