//! Diesel schema for board persistence.

diesel::table! {
    /// Task and user story records.
    board_tasks (id) {
        /// Task identifier.
        id -> Uuid,
        /// Owning project.
        project_id -> Uuid,
        /// Task title.
        title -> Text,
        /// Optional description.
        description -> Nullable<Text>,
        /// Type tag; `NULL` on records written before the tag existed.
        #[max_length = 32]
        kind -> Nullable<Varchar>,
        /// Owning user story of a sub-task.
        parent_task_id -> Nullable<Uuid>,
        /// Sprint the task is committed to.
        sprint_id -> Nullable<Uuid>,
        /// Workflow status.
        #[max_length = 32]
        status -> Varchar,
        /// Assigned user identifiers as a JSON array.
        assignees -> Jsonb,
        /// Story point estimate.
        story_points -> Nullable<Int4>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
        /// Soft-deletion timestamp.
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Sprint records.
    board_sprints (id) {
        /// Sprint identifier.
        id -> Uuid,
        /// Owning project.
        project_id -> Uuid,
        /// Display name.
        #[max_length = 255]
        name -> Varchar,
        /// Lifecycle status.
        #[max_length = 32]
        status -> Varchar,
        /// Start timestamp.
        start_date -> Timestamptz,
        /// End timestamp once completed.
        end_date -> Nullable<Timestamptz>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(board_tasks, board_sprints);
