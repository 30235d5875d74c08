//! Port contracts for the activity archive.

mod repository;

pub use repository::{ArchiveRepository, ArchiveRepositoryError, ArchiveRepositoryResult};
