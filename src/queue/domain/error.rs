//! Error types for queue domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing queue domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueDomainError {
    /// A component was given without its entity, or the other way round.
    #[error("component and entity identifiers must be set together or not at all")]
    InconsistentSubjectKeys,

    /// The task type tag is empty or too long to persist.
    #[error("invalid task type '{0}', expected a non-empty tag of at most 40 characters")]
    InvalidTaskType(String),

    /// The characteristic key is empty or too long to persist.
    #[error("invalid characteristic key '{0}', expected a non-empty key of at most 50 characters")]
    InvalidCharacteristicKey(String),

    /// A persisted row carried worker ownership fields inconsistent with
    /// its status.
    #[error("task {0} has worker/started-at fields inconsistent with status '{1}'")]
    InconsistentOwnership(super::TaskId, &'static str),
}

/// Error returned while parsing task statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);
