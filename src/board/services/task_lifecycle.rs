//! Service layer for task and user story lifecycle operations.

use crate::board::{
    domain::{
        BoardDomainError, NewTaskParams, ProjectId, SprintId, StatusChange, StoryPoints, Task,
        TaskHierarchyStatusEngine, TaskId, TaskKind, TaskPatch, TaskStatus, TaskTitle, UserId,
    },
    ports::{BoardRepository, BoardRepositoryError, BoardSnapshot},
};
use crate::config::BoardConfig;
use mockable::Clock;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// Request payload for creating a user story or task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    project_id: ProjectId,
    title: String,
    kind: TaskKind,
    description: Option<String>,
    status: Option<TaskStatus>,
    assignees: BTreeSet<UserId>,
    story_points: Option<u32>,
}

impl CreateTaskRequest {
    /// Creates a request for a top-level user story.
    #[must_use]
    pub fn user_story(project_id: ProjectId, title: impl Into<String>) -> Self {
        Self::with_kind(project_id, title, TaskKind::UserStory)
    }

    /// Creates a request for a standalone task.
    #[must_use]
    pub fn task(project_id: ProjectId, title: impl Into<String>) -> Self {
        Self::with_kind(project_id, title, TaskKind::standalone_task())
    }

    /// Creates a request for a sub-task of `parent`.
    #[must_use]
    pub fn sub_task(project_id: ProjectId, parent: TaskId, title: impl Into<String>) -> Self {
        Self::with_kind(project_id, title, TaskKind::sub_task_of(parent))
    }

    fn with_kind(project_id: ProjectId, title: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            project_id,
            title: title.into(),
            kind,
            description: None,
            status: None,
            assignees: BTreeSet::new(),
            story_points: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the initial status instead of the configured default.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the assigned users.
    #[must_use]
    pub fn with_assignees(mut self, assignees: impl IntoIterator<Item = UserId>) -> Self {
        self.assignees = assignees.into_iter().collect();
        self
    }

    /// Sets the story point estimate.
    #[must_use]
    pub const fn with_story_points(mut self, story_points: u32) -> Self {
        self.story_points = Some(story_points);
        self
    }
}

/// Request payload for editing an existing item.
///
/// Only the fields set on the request are changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTaskRequest {
    task_id: TaskId,
    title: Option<String>,
    description: Option<Option<String>>,
    status: Option<TaskStatus>,
    assignees: Option<BTreeSet<UserId>>,
    story_points: Option<Option<u32>>,
}

impl UpdateTaskRequest {
    /// Creates an empty edit for a task.
    #[must_use]
    pub const fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            title: None,
            description: None,
            status: None,
            assignees: None,
            story_points: None,
        }
    }

    /// Replaces the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Replaces the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(Some(description.into()));
        self
    }

    /// Clears the description.
    #[must_use]
    pub fn without_description(mut self) -> Self {
        self.description = Some(None);
        self
    }

    /// Sets the workflow status.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Replaces the assigned users.
    #[must_use]
    pub fn with_assignees(mut self, assignees: impl IntoIterator<Item = UserId>) -> Self {
        self.assignees = Some(assignees.into_iter().collect());
        self
    }

    /// Sets the story point estimate.
    #[must_use]
    pub const fn with_story_points(mut self, story_points: u32) -> Self {
        self.story_points = Some(Some(story_points));
        self
    }

    /// Clears the story point estimate.
    #[must_use]
    pub const fn without_story_points(mut self) -> Self {
        self.story_points = Some(None);
        self
    }

    /// Returns the task being edited.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }
}

/// Task written by an operation, with the status change it caused on its
/// parent story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskChangeOutcome {
    /// Task as stored after the operation.
    pub task: Task,
    /// Status change applied to the parent story, if any.
    pub parent_change: Option<StatusChange>,
}

/// Tasks removed by a purge, with the status change it caused on the
/// parent story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPurgeOutcome {
    /// Removed identifiers, the requested task first.
    pub purged: Vec<TaskId>,
    /// Status change applied to the parent story, if any.
    pub parent_change: Option<StatusChange>,
}

/// Service-level errors for task lifecycle operations.
#[derive(Debug, Error)]
pub enum TaskLifecycleError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] BoardDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] BoardRepositoryError),
    /// The task does not exist.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    /// The sprint does not exist.
    #[error("sprint not found: {0}")]
    SprintNotFound(SprintId),
}

/// Result type for task lifecycle service operations.
pub type TaskLifecycleResult<T> = Result<T, TaskLifecycleError>;

/// Task lifecycle orchestration service.
///
/// Every write runs inside one repository transaction together with the
/// status propagation it triggers.
#[derive(Clone)]
pub struct TaskLifecycleService<R, C>
where
    R: BoardRepository,
    C: Clock + Send + Sync + 'static,
{
    repository: Arc<R>,
    clock: Arc<C>,
    config: BoardConfig,
}

impl<R, C> TaskLifecycleService<R, C>
where
    R: BoardRepository,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a new task lifecycle service with the default configuration.
    #[must_use]
    pub fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self::with_config(repository, clock, BoardConfig::default())
    }

    /// Creates a new task lifecycle service with an explicit configuration.
    #[must_use]
    pub const fn with_config(repository: Arc<R>, clock: Arc<C>, config: BoardConfig) -> Self {
        Self {
            repository,
            clock,
            config,
        }
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Creates a user story or task.
    ///
    /// A sub-task reopens its parent story when the story is `done` and the
    /// new sub-task is not.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] when the title, estimate, or
    /// parent is invalid, and [`TaskLifecycleError::Repository`] when
    /// persistence fails.
    pub async fn create_task(
        &self,
        request: CreateTaskRequest,
    ) -> TaskLifecycleResult<TaskChangeOutcome> {
        let title = TaskTitle::new(request.title)?;
        self.config.check_title(&title)?;
        let story_points = request.story_points.map(StoryPoints::new);
        self.config.check_story_points(story_points)?;
        if let Some(parent_id) = request.kind.parent() {
            self.ensure_parent_in_project(parent_id, request.project_id)
                .await?;
        }

        let params = NewTaskParams {
            project_id: request.project_id,
            title,
            description: request.description,
            kind: request.kind,
            status: request
                .status
                .unwrap_or_else(|| self.config.default_status_for(request.kind)),
            assignees: request.assignees,
            story_points,
        };
        let clock = Arc::clone(&self.clock);
        let outcome = self
            .repository
            .transact(request.project_id, move |snapshot| {
                let task = Task::new(params, &*clock)?;
                if let Some(parent_id) = task.parent_id() {
                    ensure_parent_accepts_children(snapshot, parent_id)?;
                }
                let parent_change =
                    TaskHierarchyStatusEngine::on_child_task_created(&task, snapshot.tasks());
                snapshot.insert_task(task.clone())?;
                apply_parent_change(snapshot, parent_change, &*clock)?;
                Ok::<_, TaskLifecycleError>(TaskChangeOutcome {
                    task,
                    parent_change,
                })
            })
            .await?;

        tracing::debug!(
            task_id = %outcome.task.id(),
            kind = %outcome.task.kind(),
            status = %outcome.task.status(),
            "task created"
        );
        log_parent_change(outcome.parent_change);
        Ok(outcome)
    }

    /// Applies field edits to a live task and recomputes its parent story.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::TaskNotFound`] for unknown tasks,
    /// [`TaskLifecycleError::Domain`] for trashed tasks or invalid values,
    /// and [`TaskLifecycleError::Repository`] when persistence fails.
    pub async fn update_task(
        &self,
        request: UpdateTaskRequest,
    ) -> TaskLifecycleResult<TaskChangeOutcome> {
        let task_id = request.task_id;
        let project_id = self.require_task(task_id).await?.project_id();
        let title = request.title.map(TaskTitle::new).transpose()?;
        if let Some(title) = &title {
            self.config.check_title(title)?;
        }
        let story_points = request
            .story_points
            .map(|points| points.map(StoryPoints::new));
        if let Some(points) = story_points {
            self.config.check_story_points(points)?;
        }
        let UpdateTaskRequest {
            description,
            status,
            assignees,
            ..
        } = request;

        let clock = Arc::clone(&self.clock);
        let outcome = self
            .repository
            .transact(project_id, move |snapshot| {
                let mut task = live_task(snapshot, task_id)?;
                if let Some(title) = title {
                    task.rename(title, &*clock);
                }
                if let Some(description) = description {
                    task.set_description(description, &*clock);
                }
                if let Some(assignees) = assignees {
                    task.set_assignees(assignees, &*clock);
                }
                if let Some(points) = story_points {
                    task.set_story_points(points, &*clock)?;
                }
                if let Some(status) = status {
                    task.set_status(status, &*clock);
                }

                let parent_change =
                    TaskHierarchyStatusEngine::on_child_task_updated(&task, snapshot.tasks());
                snapshot.replace_task(task.clone())?;
                apply_parent_change(snapshot, parent_change, &*clock)?;
                Ok::<_, TaskLifecycleError>(TaskChangeOutcome {
                    task,
                    parent_change,
                })
            })
            .await?;

        tracing::debug!(
            task_id = %outcome.task.id(),
            status = %outcome.task.status(),
            "task updated"
        );
        log_parent_change(outcome.parent_change);
        Ok(outcome)
    }

    /// Commits a live task to its project's active sprint.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::SprintNotFound`] for unknown sprints and
    /// [`TaskLifecycleError::Domain`] when the sprint belongs to another
    /// project, is already completed, or the task is trashed.
    pub async fn assign_to_sprint(
        &self,
        task_id: TaskId,
        sprint_id: SprintId,
    ) -> TaskLifecycleResult<Task> {
        let project_id = self.require_task(task_id).await?.project_id();
        let sprint = self
            .repository
            .find_sprint(sprint_id)
            .await?
            .ok_or(TaskLifecycleError::SprintNotFound(sprint_id))?;
        if sprint.project_id() != project_id {
            return Err(BoardDomainError::SprintInOtherProject {
                sprint_id,
                project_id,
            }
            .into());
        }

        let clock = Arc::clone(&self.clock);
        let task = self
            .repository
            .transact(project_id, move |snapshot| {
                let sprint = snapshot
                    .sprint(sprint_id)
                    .ok_or(TaskLifecycleError::SprintNotFound(sprint_id))?;
                if !sprint.is_active() {
                    return Err(TaskLifecycleError::from(
                        BoardDomainError::SprintAlreadyCompleted(sprint_id),
                    ));
                }
                let mut task = live_task(snapshot, task_id)?;
                task.assign_to_sprint(sprint_id, &*clock);
                snapshot.replace_task(task.clone())?;
                Ok::<_, TaskLifecycleError>(task)
            })
            .await?;

        tracing::debug!(task_id = %task_id, sprint_id = %sprint_id, "task committed to sprint");
        Ok(task)
    }

    /// Detaches a task from its sprint, keeping its status.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::TaskNotFound`] for unknown tasks and
    /// [`TaskLifecycleError::Repository`] when persistence fails.
    pub async fn remove_from_sprint(&self, task_id: TaskId) -> TaskLifecycleResult<Task> {
        self.modify_task(task_id, |task, clock| {
            task.detach_from_sprint(clock);
            Ok(())
        })
        .await
    }

    /// Moves a task to the trash and recomputes its parent story from the
    /// sub-tasks still live.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::TaskAlreadyTrashed`] through
    /// [`TaskLifecycleError::Domain`] when the task is already trashed.
    pub async fn trash_task(&self, task_id: TaskId) -> TaskLifecycleResult<TaskChangeOutcome> {
        let project_id = self.require_task(task_id).await?.project_id();
        let clock = Arc::clone(&self.clock);
        let outcome = self
            .repository
            .transact(project_id, move |snapshot| {
                let mut task = stored_task(snapshot, task_id)?;
                task.trash(&*clock)?;
                let parent_change =
                    TaskHierarchyStatusEngine::on_child_task_removed(&task, snapshot.tasks());
                snapshot.replace_task(task.clone())?;
                apply_parent_change(snapshot, parent_change, &*clock)?;
                Ok::<_, TaskLifecycleError>(TaskChangeOutcome {
                    task,
                    parent_change,
                })
            })
            .await?;

        tracing::debug!(task_id = %task_id, "task trashed");
        log_parent_change(outcome.parent_change);
        Ok(outcome)
    }

    /// Restores a task from the trash and recomputes its parent story with
    /// the task counted again.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::TaskNotTrashed`] through
    /// [`TaskLifecycleError::Domain`] when the task is live.
    pub async fn restore_task(&self, task_id: TaskId) -> TaskLifecycleResult<TaskChangeOutcome> {
        let project_id = self.require_task(task_id).await?.project_id();
        let clock = Arc::clone(&self.clock);
        let outcome = self
            .repository
            .transact(project_id, move |snapshot| {
                let mut task = stored_task(snapshot, task_id)?;
                task.restore(&*clock)?;
                let parent_change =
                    TaskHierarchyStatusEngine::on_child_task_updated(&task, snapshot.tasks());
                snapshot.replace_task(task.clone())?;
                apply_parent_change(snapshot, parent_change, &*clock)?;
                Ok::<_, TaskLifecycleError>(TaskChangeOutcome {
                    task,
                    parent_change,
                })
            })
            .await?;

        tracing::debug!(task_id = %task_id, "task restored");
        log_parent_change(outcome.parent_change);
        Ok(outcome)
    }

    /// Permanently removes a task and every sub-task it owns.
    ///
    /// Purging a sub-task recomputes its parent story from the sub-tasks
    /// that remain.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::TaskNotFound`] for unknown tasks and
    /// [`TaskLifecycleError::Repository`] when persistence fails.
    pub async fn purge_task(&self, task_id: TaskId) -> TaskLifecycleResult<TaskPurgeOutcome> {
        let project_id = self.require_task(task_id).await?.project_id();
        let clock = Arc::clone(&self.clock);
        let outcome = self
            .repository
            .transact(project_id, move |snapshot| {
                let task = stored_task(snapshot, task_id)?;
                let parent_change =
                    TaskHierarchyStatusEngine::on_child_task_removed(&task, snapshot.tasks());
                let children: Vec<TaskId> = snapshot
                    .tasks()
                    .iter()
                    .filter(|child| child.parent_id() == Some(task_id))
                    .map(Task::id)
                    .collect();
                snapshot
                    .remove_task(task_id)
                    .ok_or(TaskLifecycleError::TaskNotFound(task_id))?;
                let mut purged = vec![task_id];
                for child in children {
                    if snapshot.remove_task(child).is_some() {
                        purged.push(child);
                    }
                }
                apply_parent_change(snapshot, parent_change, &*clock)?;
                Ok::<_, TaskLifecycleError>(TaskPurgeOutcome {
                    purged,
                    parent_change,
                })
            })
            .await?;

        tracing::debug!(task_id = %task_id, purged = outcome.purged.len(), "task purged");
        log_parent_change(outcome.parent_change);
        Ok(outcome)
    }

    /// Recomputes the parent story of a sub-task from its current siblings.
    ///
    /// Returns `None` when the task has no live parent or the parent status
    /// already matches.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::TaskNotFound`] for unknown tasks and
    /// [`TaskLifecycleError::Domain`] for trashed tasks.
    pub async fn recompute_parent_status(
        &self,
        task_id: TaskId,
    ) -> TaskLifecycleResult<Option<StatusChange>> {
        let project_id = self.require_task(task_id).await?.project_id();
        let clock = Arc::clone(&self.clock);
        let change = self
            .repository
            .transact(project_id, move |snapshot| {
                let task = live_task(snapshot, task_id)?;
                let change =
                    TaskHierarchyStatusEngine::on_child_task_updated(&task, snapshot.tasks());
                apply_parent_change(snapshot, change, &*clock)?;
                Ok::<_, TaskLifecycleError>(change)
            })
            .await?;
        log_parent_change(change);
        Ok(change)
    }

    /// Retrieves a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when persistence lookup
    /// fails.
    pub async fn find_task(&self, task_id: TaskId) -> TaskLifecycleResult<Option<Task>> {
        Ok(self.repository.find_task(task_id).await?)
    }

    /// Lists every task of a project, trashed ones included.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when persistence lookup
    /// fails.
    pub async fn list_project_tasks(&self, project_id: ProjectId) -> TaskLifecycleResult<Vec<Task>> {
        Ok(self.repository.list_project_tasks(project_id).await?)
    }

    async fn require_task(&self, task_id: TaskId) -> TaskLifecycleResult<Task> {
        self.repository
            .find_task(task_id)
            .await?
            .ok_or(TaskLifecycleError::TaskNotFound(task_id))
    }

    async fn ensure_parent_in_project(
        &self,
        parent_id: TaskId,
        project_id: ProjectId,
    ) -> TaskLifecycleResult<()> {
        match self.repository.find_task(parent_id).await? {
            Some(parent) if parent.project_id() != project_id => {
                Err(BoardDomainError::ParentInOtherProject {
                    parent_id,
                    parent_project: parent.project_id(),
                    project_id,
                }
                .into())
            }
            Some(_) => Ok(()),
            None => Err(BoardDomainError::ParentNotFound(parent_id).into()),
        }
    }

    async fn modify_task<F>(&self, task_id: TaskId, change: F) -> TaskLifecycleResult<Task>
    where
        F: FnOnce(&mut Task, &C) -> Result<(), BoardDomainError> + Send + 'static,
    {
        let project_id = self.require_task(task_id).await?.project_id();
        let clock = Arc::clone(&self.clock);
        self.repository
            .transact(project_id, move |snapshot| {
                let mut task = stored_task(snapshot, task_id)?;
                change(&mut task, &*clock)?;
                snapshot.replace_task(task.clone())?;
                Ok::<_, TaskLifecycleError>(task)
            })
            .await
    }
}

fn stored_task(snapshot: &BoardSnapshot, task_id: TaskId) -> TaskLifecycleResult<Task> {
    snapshot
        .task(task_id)
        .cloned()
        .ok_or(TaskLifecycleError::TaskNotFound(task_id))
}

fn live_task(snapshot: &BoardSnapshot, task_id: TaskId) -> TaskLifecycleResult<Task> {
    let task = stored_task(snapshot, task_id)?;
    task.ensure_live()?;
    Ok(task)
}

fn ensure_parent_accepts_children(
    snapshot: &BoardSnapshot,
    parent_id: TaskId,
) -> Result<(), BoardDomainError> {
    let parent = snapshot
        .task(parent_id)
        .ok_or(BoardDomainError::ParentNotFound(parent_id))?;
    if parent.is_trashed() {
        return Err(BoardDomainError::ParentTrashed(parent_id));
    }
    if !parent.is_user_story() {
        return Err(BoardDomainError::ParentNotUserStory(parent_id));
    }
    Ok(())
}

fn apply_parent_change(
    snapshot: &mut BoardSnapshot,
    change: Option<StatusChange>,
    clock: &impl Clock,
) -> Result<(), BoardRepositoryError> {
    if let Some(change) = change {
        snapshot.apply_patch(&TaskPatch::from(change), clock)?;
    }
    Ok(())
}

fn log_parent_change(change: Option<StatusChange>) {
    if let Some(change) = change {
        tracing::debug!(
            parent_id = %change.task_id,
            from = %change.from,
            to = %change.to,
            "parent story status recomputed"
        );
    }
}
