//! Error types for the archive domain.

use crate::queue::domain::TaskId;
use thiserror::Error;

/// Violations of activity record invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchiveDomainError {
    /// A record carried an error payload without being failed, or was
    /// failed without one.
    #[error("activity {0} has an error payload inconsistent with its status")]
    InconsistentErrorPayload(TaskId),
    /// A cancelled record claimed to be the latest outcome for its key.
    #[error("cancelled activity {0} must not be flagged as latest")]
    InconsistentLatestFlag(TaskId),
}

/// Raised when parsing an unknown activity status string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown activity status: {0}")]
pub struct ParseActivityStatusError(pub String);
