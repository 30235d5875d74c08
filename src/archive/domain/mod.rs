//! Domain model for the activity archive.
//!
//! Archived records are the terminal state of queue tasks. They are
//! immutable apart from the latest-outcome flags, which the arrival of a
//! newer record for the same key clears.

mod activity;
mod error;
mod query;

pub use activity::{
    ActivityOutcome, ActivityRecord, ActivityStatus, ExecutionError, PersistedActivityData,
};
pub use error::{ArchiveDomainError, ParseActivityStatusError};
pub use query::ActivityQuery;
