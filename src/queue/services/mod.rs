//! Application services orchestrating queue operations.

mod reconciler;
mod submitter;
mod worker_gate;

pub use reconciler::LivenessReconciler;
pub use submitter::{SubmitTaskRequest, TaskSubmissionError, TaskSubmissionResult, TaskSubmitter};
pub use worker_gate::WorkerGate;
