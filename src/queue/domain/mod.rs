//! Domain model for the durable task queue.
//!
//! The queue domain models submission, exclusive claiming, and liveness
//! recovery of background compute tasks while keeping all persistence
//! concerns outside the domain boundary.

mod characteristic;
mod error;
mod ids;
mod query;
mod task;

pub use characteristic::{
    BranchKind, BranchWorkload, CharacteristicKey, TaskCharacteristic, characteristic_keys,
};
pub use error::{ParseTaskStatusError, QueueDomainError};
pub use ids::{ComponentId, EntityId, SubmitterId, TaskId, WorkerId};
pub use query::{Page, TaskQuery};
pub use task::{
    EligibleTask, PersistedTaskData, QueuedTask, TaskStatus, TaskSubject, TaskSubmission,
    TaskTransition, TaskType, task_types,
};
