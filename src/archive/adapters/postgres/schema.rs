//! Diesel schema for activity archive persistence.

diesel::table! {
    /// Archived outcomes of finished tasks.
    task_activity (id) {
        /// Record identifier, inherited from the queue row.
        id -> Uuid,
        /// Task type tag.
        #[max_length = 40]
        task_type -> Varchar,
        /// Component the task worked on, if any.
        component_uuid -> Nullable<Uuid>,
        /// Root-branch component identity, if any.
        main_component_uuid -> Nullable<Uuid>,
        /// Terminal status.
        #[max_length = 15]
        status -> Varchar,
        /// Latest-outcome flag over the component key.
        is_last -> Bool,
        /// Latest-outcome grouping key over the component.
        #[max_length = 80]
        is_last_key -> Varchar,
        /// Latest-outcome flag over the main-component key.
        main_is_last -> Bool,
        /// Latest-outcome grouping key over the main component.
        #[max_length = 80]
        main_is_last_key -> Varchar,
        /// Submitting principal, if known.
        submitter_uuid -> Nullable<Uuid>,
        /// Worker that executed the task, if it ran.
        worker_uuid -> Nullable<Uuid>,
        /// When the task entered the queue.
        submitted_at -> Timestamptz,
        /// When a worker claimed the task, if it ran.
        started_at -> Nullable<Timestamptz>,
        /// When the task reached its terminal state.
        executed_at -> Timestamptz,
        /// Execution duration in milliseconds, if it ran.
        execution_time_ms -> Nullable<Int8>,
        /// Failure message, present exactly when failed.
        #[max_length = 1000]
        error_message -> Nullable<Varchar>,
        /// Failure classifier, if any.
        #[max_length = 20]
        error_kind -> Nullable<Varchar>,
        /// Captured stacktrace, if any.
        error_stacktrace -> Nullable<Text>,
        /// Number of warnings raised during execution.
        warning_count -> Int4,
        /// Row creation timestamp.
        created_at -> Timestamptz,
        /// Last mutation timestamp.
        updated_at -> Timestamptz,
    }
}
