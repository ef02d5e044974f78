//! Error types for board domain validation and parsing.

use super::{ProjectId, SprintId, TaskId};
use thiserror::Error;

/// Errors returned when a board operation would violate a domain rule.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BoardDomainError {
    /// The task title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTaskTitle,

    /// The task title exceeds the configured limit.
    #[error("task title is {length} characters long, limit is {max}")]
    TaskTitleTooLong {
        /// Length of the rejected title in characters.
        length: usize,
        /// Configured maximum length.
        max: usize,
    },

    /// The sprint name is empty after trimming.
    #[error("sprint name must not be empty")]
    EmptySprintName,

    /// The story point estimate exceeds the configured limit.
    #[error("story point estimate {value} exceeds limit {max}")]
    StoryPointsOutOfRange {
        /// Rejected estimate.
        value: u32,
        /// Configured maximum estimate.
        max: u32,
    },

    /// Story points were set on an item that is not a user story.
    #[error("story points can only be set on user stories, {0} is a task")]
    StoryPointsOnSubTask(TaskId),

    /// The referenced parent task does not exist.
    #[error("parent task {0} not found")]
    ParentNotFound(TaskId),

    /// The referenced parent task is not a user story.
    #[error("parent task {0} is not a user story")]
    ParentNotUserStory(TaskId),

    /// The referenced parent task belongs to another project.
    #[error("parent task {parent_id} belongs to project {parent_project}, not {project_id}")]
    ParentInOtherProject {
        /// Rejected parent identifier.
        parent_id: TaskId,
        /// Project owning the parent.
        parent_project: ProjectId,
        /// Project of the child being created.
        project_id: ProjectId,
    },

    /// The referenced parent task is in the trash.
    #[error("parent task {0} is trashed")]
    ParentTrashed(TaskId),

    /// The task is in the trash and cannot be edited.
    #[error("task {0} is trashed")]
    TaskTrashed(TaskId),

    /// The task is already in the trash.
    #[error("task {0} is already trashed")]
    TaskAlreadyTrashed(TaskId),

    /// The task is not in the trash and cannot be restored.
    #[error("task {0} is not trashed")]
    TaskNotTrashed(TaskId),

    /// The project already has a running sprint.
    #[error("project {project_id} already has active sprint {sprint_id}")]
    ActiveSprintExists {
        /// Project that owns both sprints.
        project_id: ProjectId,
        /// Sprint that is currently active.
        sprint_id: SprintId,
    },

    /// The sprint has already been completed.
    #[error("sprint {0} is already completed")]
    SprintAlreadyCompleted(SprintId),

    /// The sprint belongs to a different project than the task.
    #[error("sprint {sprint_id} does not belong to project {project_id}")]
    SprintInOtherProject {
        /// Rejected sprint identifier.
        sprint_id: SprintId,
        /// Project of the task being assigned.
        project_id: ProjectId,
    },
}

/// Error returned while parsing task statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);

/// Error returned while parsing sprint statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown sprint status: {0}")]
pub struct ParseSprintStatusError(pub String);

/// Error returned while normalising persisted task type information.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseTaskKindError {
    /// The stored type value is not recognised.
    #[error("unknown task type: {0}")]
    UnknownKind(String),

    /// A record typed as a user story also carries a parent reference.
    #[error("user story cannot have parent task {0}")]
    StoryWithParent(TaskId),
}
