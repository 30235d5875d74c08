//! Key/value tags attached to tasks and branch workload projections.

use super::{ComponentId, EntityId, QueueDomainError, TaskId, TaskType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known characteristic keys.
pub mod characteristic_keys {
    /// Branch name the analysis ran on.
    pub const BRANCH: &str = "branch";
    /// Branch type discriminator.
    pub const BRANCH_TYPE: &str = "branchType";
    /// Pull request identifier.
    pub const PULL_REQUEST: &str = "pullRequest";
}

/// Validated characteristic key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacteristicKey(String);

impl CharacteristicKey {
    const MAX_LEN: usize = 50;

    /// Creates a validated key.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::InvalidCharacteristicKey`] when the key
    /// is empty after trimming or longer than the schema allows.
    pub fn new(value: impl Into<String>) -> Result<Self, QueueDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.len() > Self::MAX_LEN {
            return Err(QueueDomainError::InvalidCharacteristicKey(raw));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the key as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CharacteristicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable key/value tag owned by a task.
///
/// Characteristics live exactly as long as the owning task row and are
/// deleted with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCharacteristic {
    task_id: TaskId,
    key: CharacteristicKey,
    value: String,
}

impl TaskCharacteristic {
    /// Creates a characteristic for the given task.
    #[must_use]
    pub const fn new(task_id: TaskId, key: CharacteristicKey, value: String) -> Self {
        Self {
            task_id,
            key,
            value,
        }
    }

    /// Returns the owning task identifier.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the characteristic key.
    #[must_use]
    pub const fn key(&self) -> &CharacteristicKey {
        &self.key
    }

    /// Returns the characteristic value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Kind of branch an analysis task targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchKind {
    /// A long-lived or feature branch; the default when no
    /// `pullRequest` characteristic is attached.
    Branch,
    /// A pull request analysis.
    PullRequest,
}

/// Projection of an analysis task with its branch kind, used by callers
/// that throttle concurrent branch analyses per project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchWorkload {
    /// Task identifier.
    pub task_id: TaskId,
    /// Task type tag.
    pub task_type: TaskType,
    /// Component under analysis, if recorded.
    pub component: Option<ComponentId>,
    /// Owning entity, if recorded.
    pub entity: Option<EntityId>,
    /// Pull request when a `pullRequest` characteristic is attached,
    /// branch otherwise.
    pub branch_kind: BranchKind,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
}
