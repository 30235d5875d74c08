//! In-memory adapters for archive persistence.

mod archive;

pub use archive::InMemoryArchiveRepository;
