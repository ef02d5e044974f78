//! Application services for board orchestration.

mod sprint_lifecycle;
mod task_lifecycle;

pub use sprint_lifecycle::{
    SprintClosure, SprintLifecycleError, SprintLifecycleResult, SprintLifecycleService,
    StartSprintRequest,
};
pub use task_lifecycle::{
    CreateTaskRequest, TaskChangeOutcome, TaskLifecycleError, TaskLifecycleResult,
    TaskLifecycleService, TaskPurgeOutcome, UpdateTaskRequest,
};
