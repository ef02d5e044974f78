//! Shared test helpers for in-memory board integration tests.

use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use taskboard::board::{
    adapters::memory::InMemoryBoardRepository,
    domain::{ProjectId, SprintId, TaskId, TaskStatus},
    services::{CreateTaskRequest, SprintLifecycleService, TaskLifecycleService},
};

/// Task service type used by integration tests.
pub type TestTaskService = TaskLifecycleService<InMemoryBoardRepository, DefaultClock>;

/// Sprint service type used by integration tests.
pub type TestSprintService = SprintLifecycleService<InMemoryBoardRepository, DefaultClock>;

/// Services sharing one repository, scoped to a single project.
pub struct Board {
    pub repository: Arc<InMemoryBoardRepository>,
    pub tasks: TestTaskService,
    pub sprints: TestSprintService,
    pub project_id: ProjectId,
}

impl Board {
    /// Wraps an existing repository.
    #[must_use]
    pub fn over(repository: Arc<InMemoryBoardRepository>, project_id: ProjectId) -> Self {
        let clock = Arc::new(DefaultClock);
        Self {
            tasks: TaskLifecycleService::new(Arc::clone(&repository), Arc::clone(&clock)),
            sprints: SprintLifecycleService::new(Arc::clone(&repository), clock),
            repository,
            project_id,
        }
    }

    /// Creates a user story with the given status.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails.
    pub async fn story(&self, title: &str, status: TaskStatus) -> eyre::Result<TaskId> {
        let outcome = self
            .tasks
            .create_task(
                CreateTaskRequest::user_story(self.project_id, title).with_status(status),
            )
            .await?;
        Ok(outcome.task.id())
    }

    /// Creates a sub-task of `parent` with the given status.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails.
    pub async fn sub_task(
        &self,
        parent: TaskId,
        title: &str,
        status: TaskStatus,
    ) -> eyre::Result<TaskId> {
        let outcome = self
            .tasks
            .create_task(
                CreateTaskRequest::sub_task(self.project_id, parent, title).with_status(status),
            )
            .await?;
        Ok(outcome.task.id())
    }

    /// Returns the stored status of a task.
    ///
    /// # Errors
    ///
    /// Returns an error if the task cannot be found.
    pub async fn status_of(&self, task_id: TaskId) -> eyre::Result<TaskStatus> {
        Ok(self.stored(task_id).await?.0)
    }

    /// Returns the stored status and sprint of a task.
    ///
    /// # Errors
    ///
    /// Returns an error if the task cannot be found.
    pub async fn stored(&self, task_id: TaskId) -> eyre::Result<(TaskStatus, Option<SprintId>)> {
        let task = self
            .tasks
            .find_task(task_id)
            .await?
            .ok_or_else(|| eyre::eyre!("task {task_id} not found"))?;
        Ok((task.status(), task.sprint_id()))
    }
}

/// Provides an empty board for a fresh project.
#[fixture]
pub fn board() -> Board {
    Board::over(Arc::new(InMemoryBoardRepository::new()), ProjectId::new())
}
