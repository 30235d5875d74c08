//! Diesel schema for durable queue persistence.

diesel::table! {
    /// Queued and in-progress task rows.
    task_queue (id) {
        /// Task identifier.
        id -> Uuid,
        /// Task type tag.
        #[max_length = 40]
        task_type -> Varchar,
        /// Component under work, if any.
        component_uuid -> Nullable<Uuid>,
        /// Entity grouping the component, if any.
        entity_uuid -> Nullable<Uuid>,
        /// Queue status.
        #[max_length = 15]
        status -> Varchar,
        /// Submitting principal, if known.
        submitter_uuid -> Nullable<Uuid>,
        /// Owning worker while in progress.
        worker_uuid -> Nullable<Uuid>,
        /// Claim timestamp while in progress.
        started_at -> Nullable<Timestamptz>,
        /// Submission timestamp.
        created_at -> Timestamptz,
        /// Last mutation timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Key/value tags owned by task rows.
    task_characteristics (task_uuid, kee) {
        /// Owning task identifier.
        task_uuid -> Uuid,
        /// Characteristic key.
        #[max_length = 50]
        kee -> Varchar,
        /// Characteristic value.
        #[max_length = 255]
        text_value -> Varchar,
    }
}

diesel::allow_tables_to_appear_in_same_query!(task_queue, task_characteristics);
