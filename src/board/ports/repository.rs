//! Repository port for task and sprint persistence.

use super::BoardSnapshot;
use crate::board::domain::{ProjectId, Sprint, SprintId, Task, TaskId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for board repository operations.
pub type BoardRepositoryResult<T> = Result<T, BoardRepositoryError>;

/// Task and sprint persistence contract.
///
/// All writes go through [`BoardRepository::transact`], which runs the
/// snapshot read, the caller's computation, and the write-back as one
/// atomic unit.
#[async_trait]
pub trait BoardRepository: Send + Sync {
    /// Runs `mutation` against a snapshot of the project and persists the
    /// records it changed.
    ///
    /// Nothing is written when `mutation` fails. No other transaction on the
    /// same project can interleave between the snapshot read and the
    /// write-back.
    ///
    /// # Errors
    ///
    /// Returns the mutation's own error, or a [`BoardRepositoryError`]
    /// converted into `E` when loading or persisting fails.
    async fn transact<T, E, F>(&self, project_id: ProjectId, mutation: F) -> Result<T, E>
    where
        F: FnOnce(&mut BoardSnapshot) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<BoardRepositoryError> + Send + 'static;

    /// Finds a task by identifier.
    ///
    /// Returns `None` when the task does not exist.
    async fn find_task(&self, id: TaskId) -> BoardRepositoryResult<Option<Task>>;

    /// Finds a sprint by identifier.
    ///
    /// Returns `None` when the sprint does not exist.
    async fn find_sprint(&self, id: SprintId) -> BoardRepositoryResult<Option<Sprint>>;

    /// Returns every task of a project, trashed ones included, in creation
    /// order.
    async fn list_project_tasks(&self, project_id: ProjectId) -> BoardRepositoryResult<Vec<Task>>;

    /// Returns every sprint of a project in start order.
    async fn list_project_sprints(
        &self,
        project_id: ProjectId,
    ) -> BoardRepositoryResult<Vec<Sprint>>;
}

/// Errors returned by board repository implementations.
#[derive(Debug, Clone, Error)]
pub enum BoardRepositoryError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// A sprint with the same identifier already exists.
    #[error("duplicate sprint identifier: {0}")]
    DuplicateSprint(SprintId),

    /// The task was not found.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The sprint was not found.
    #[error("sprint not found: {0}")]
    SprintNotFound(SprintId),

    /// A record was written into the snapshot of another project.
    #[error("record belongs to project {found}, transaction is scoped to {expected}")]
    ProjectMismatch {
        /// Project the transaction is scoped to.
        expected: ProjectId,
        /// Project of the rejected record.
        found: ProjectId,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl BoardRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
