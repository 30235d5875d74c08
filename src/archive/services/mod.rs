//! Application services orchestrating archive operations.

mod finaliser;

pub use finaliser::{TaskFinalisationError, TaskFinalisationResult, TaskFinaliser};
