//! Domain model for the project board.
//!
//! Tasks, user stories, and sprints live here together with the status
//! propagation rules that keep them consistent. Nothing in this module
//! performs I/O.

mod error;
mod ids;
mod propagation;
mod sprint;
mod status;
mod task;

pub use error::{
    BoardDomainError, ParseSprintStatusError, ParseTaskKindError, ParseTaskStatusError,
};
pub use ids::{ProjectId, SprintId, TaskId, UserId};
pub use propagation::{SprintEndPlan, StatusChange, TaskHierarchyStatusEngine, TaskPatch};
pub use sprint::{PersistedSprintData, Sprint};
pub use status::{SprintStatus, TaskStatus};
pub use task::{
    NewTaskParams, PersistedTaskData, StoryPoints, TASK_KIND, Task, TaskKind, TaskTitle,
    USER_STORY_KIND,
};
