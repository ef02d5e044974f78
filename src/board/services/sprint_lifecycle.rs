//! Service layer for starting and closing sprints.

use crate::board::{
    domain::{
        BoardDomainError, ProjectId, Sprint, SprintEndPlan, SprintId, TaskHierarchyStatusEngine,
        TaskId,
    },
    ports::{BoardRepository, BoardRepositoryError},
};
use mockable::Clock;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Request payload for starting a sprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartSprintRequest {
    project_id: ProjectId,
    name: String,
}

impl StartSprintRequest {
    /// Creates a request for a named sprint.
    #[must_use]
    pub fn new(project_id: ProjectId, name: impl Into<String>) -> Self {
        Self {
            project_id,
            name: name.into(),
        }
    }
}

/// Report of a closed sprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SprintClosure {
    /// Sprint as stored after completion.
    pub sprint: Sprint,
    /// Incomplete items detached and returned to the backlog.
    pub released_to_backlog: Vec<TaskId>,
    /// Completed items detached with their status kept.
    pub detached_done: Vec<TaskId>,
    /// Incomplete sub-tasks of the sprint's stories reset to `todo`.
    pub reset_to_todo: Vec<TaskId>,
    /// Story points committed to the sprint.
    pub committed_points: u32,
    /// Story points of committed stories that were finished.
    pub completed_points: u32,
}

impl SprintClosure {
    fn new(sprint: Sprint, plan: SprintEndPlan) -> Self {
        Self {
            sprint,
            released_to_backlog: plan.released_to_backlog,
            detached_done: plan.detached_done,
            reset_to_todo: plan.reset_to_todo,
            committed_points: plan.committed_points,
            completed_points: plan.completed_points,
        }
    }
}

/// Service-level errors for sprint lifecycle operations.
#[derive(Debug, Error)]
pub enum SprintLifecycleError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] BoardDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] BoardRepositoryError),
    /// The sprint does not exist.
    #[error("sprint not found: {0}")]
    SprintNotFound(SprintId),
}

/// Result type for sprint lifecycle service operations.
pub type SprintLifecycleResult<T> = Result<T, SprintLifecycleError>;

/// Sprint lifecycle orchestration service.
#[derive(Clone)]
pub struct SprintLifecycleService<R, C>
where
    R: BoardRepository,
    C: Clock + Send + Sync + 'static,
{
    repository: Arc<R>,
    clock: Arc<C>,
}

impl<R, C> SprintLifecycleService<R, C>
where
    R: BoardRepository,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a new sprint lifecycle service.
    #[must_use]
    pub const fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self { repository, clock }
    }

    /// Starts a sprint.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::ActiveSprintExists`] through
    /// [`SprintLifecycleError::Domain`] when the project already has a
    /// running sprint, and [`BoardDomainError::EmptySprintName`] for blank
    /// names.
    pub async fn start_sprint(&self, request: StartSprintRequest) -> SprintLifecycleResult<Sprint> {
        let StartSprintRequest { project_id, name } = request;
        let clock = Arc::clone(&self.clock);
        let sprint = self
            .repository
            .transact(project_id, move |snapshot| {
                if let Some(active) = snapshot.active_sprint() {
                    return Err(SprintLifecycleError::from(
                        BoardDomainError::ActiveSprintExists {
                            project_id,
                            sprint_id: active.id(),
                        },
                    ));
                }
                let sprint = Sprint::start(project_id, name, &*clock)?;
                snapshot.insert_sprint(sprint.clone())?;
                Ok(sprint)
            })
            .await?;

        tracing::info!(
            sprint_id = %sprint.id(),
            project_id = %project_id,
            name = sprint.name(),
            "sprint started"
        );
        Ok(sprint)
    }

    /// Ends a sprint and returns its tasks to the backlog.
    ///
    /// Every task in the sprint is detached from it; incomplete ones go back
    /// to `backlog`. Incomplete sub-tasks of the sprint's user stories are
    /// reset to `todo`. The sprint is marked `completed`. All of it is
    /// written in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SprintLifecycleError::SprintNotFound`] for unknown sprints
    /// and [`BoardDomainError::SprintAlreadyCompleted`] through
    /// [`SprintLifecycleError::Domain`] when the sprint has already ended.
    /// Nothing is written in either case.
    pub async fn end_sprint(&self, sprint_id: SprintId) -> SprintLifecycleResult<SprintClosure> {
        let project_id = self
            .repository
            .find_sprint(sprint_id)
            .await?
            .ok_or(SprintLifecycleError::SprintNotFound(sprint_id))?
            .project_id();

        let clock = Arc::clone(&self.clock);
        let closure = self
            .repository
            .transact(project_id, move |snapshot| {
                let mut sprint = snapshot
                    .sprint(sprint_id)
                    .cloned()
                    .ok_or(SprintLifecycleError::SprintNotFound(sprint_id))?;
                sprint.complete(&*clock)?;

                let plan = TaskHierarchyStatusEngine::on_sprint_ended(sprint_id, snapshot.tasks());
                for patch in &plan.patches {
                    snapshot.apply_patch(patch, &*clock)?;
                }
                snapshot.replace_sprint(sprint.clone())?;
                Ok::<_, SprintLifecycleError>(SprintClosure::new(sprint, plan))
            })
            .await?;

        tracing::info!(
            sprint_id = %sprint_id,
            project_id = %project_id,
            released = closure.released_to_backlog.len(),
            detached_done = closure.detached_done.len(),
            reset_to_todo = closure.reset_to_todo.len(),
            committed_points = closure.committed_points,
            completed_points = closure.completed_points,
            "sprint ended"
        );
        Ok(closure)
    }

    /// Retrieves a sprint by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SprintLifecycleError::Repository`] when persistence lookup
    /// fails.
    pub async fn find_sprint(&self, sprint_id: SprintId) -> SprintLifecycleResult<Option<Sprint>> {
        Ok(self.repository.find_sprint(sprint_id).await?)
    }

    /// Returns the running sprint of a project, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SprintLifecycleError::Repository`] when persistence lookup
    /// fails.
    pub async fn active_sprint(&self, project_id: ProjectId) -> SprintLifecycleResult<Option<Sprint>> {
        let sprints = self.repository.list_project_sprints(project_id).await?;
        Ok(sprints.into_iter().find(Sprint::is_active))
    }

    /// Lists every sprint of a project in start order.
    ///
    /// # Errors
    ///
    /// Returns [`SprintLifecycleError::Repository`] when persistence lookup
    /// fails.
    pub async fn list_project_sprints(
        &self,
        project_id: ProjectId,
    ) -> SprintLifecycleResult<Vec<Sprint>> {
        Ok(self.repository.list_project_sprints(project_id).await?)
    }
}
