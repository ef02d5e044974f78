//! Unit-of-work snapshot handed to board transactions.

use super::{BoardRepositoryError, BoardRepositoryResult};
use crate::board::domain::{ProjectId, Sprint, SprintId, Task, TaskId, TaskPatch};
use mockable::Clock;
use std::collections::BTreeSet;

/// Every task and sprint of one project, loaded inside a transaction.
///
/// Mutations go through the snapshot so that the repository can persist
/// exactly what changed once the transaction body succeeds.
#[derive(Debug, Clone)]
pub struct BoardSnapshot {
    project_id: ProjectId,
    tasks: Vec<Task>,
    sprints: Vec<Sprint>,
    changes: SnapshotChanges,
}

/// Identifiers of the records a transaction touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotChanges {
    inserted_tasks: BTreeSet<TaskId>,
    updated_tasks: BTreeSet<TaskId>,
    removed_tasks: BTreeSet<TaskId>,
    inserted_sprints: BTreeSet<SprintId>,
    updated_sprints: BTreeSet<SprintId>,
}

impl SnapshotChanges {
    /// Returns `true` when the transaction changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserted_tasks.is_empty()
            && self.updated_tasks.is_empty()
            && self.removed_tasks.is_empty()
            && self.inserted_sprints.is_empty()
            && self.updated_sprints.is_empty()
    }
}

impl BoardSnapshot {
    /// Creates a snapshot from loaded project records.
    #[must_use]
    pub fn new(project_id: ProjectId, tasks: Vec<Task>, sprints: Vec<Sprint>) -> Self {
        Self {
            project_id,
            tasks,
            sprints,
            changes: SnapshotChanges::default(),
        }
    }

    /// Returns the project the snapshot belongs to.
    #[must_use]
    pub const fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns every task of the project, trashed ones included.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Returns every sprint of the project.
    #[must_use]
    pub fn sprints(&self) -> &[Sprint] {
        &self.sprints
    }

    /// Finds a task by identifier.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id() == id)
    }

    /// Finds a sprint by identifier.
    #[must_use]
    pub fn sprint(&self, id: SprintId) -> Option<&Sprint> {
        self.sprints.iter().find(|sprint| sprint.id() == id)
    }

    /// Returns the running sprint, if any.
    #[must_use]
    pub fn active_sprint(&self) -> Option<&Sprint> {
        self.sprints.iter().find(|sprint| sprint.is_active())
    }

    /// Returns the records touched so far.
    #[must_use]
    pub const fn changes(&self) -> &SnapshotChanges {
        &self.changes
    }

    /// Adds a new task.
    ///
    /// # Errors
    ///
    /// Returns [`BoardRepositoryError::DuplicateTask`] when the identifier is
    /// already present and [`BoardRepositoryError::ProjectMismatch`] when the
    /// task belongs to another project.
    pub fn insert_task(&mut self, task: Task) -> BoardRepositoryResult<()> {
        self.ensure_project(task.project_id())?;
        if self.task(task.id()).is_some() {
            return Err(BoardRepositoryError::DuplicateTask(task.id()));
        }
        self.changes.inserted_tasks.insert(task.id());
        self.tasks.push(task);
        Ok(())
    }

    /// Replaces an existing task with an updated copy.
    ///
    /// # Errors
    ///
    /// Returns [`BoardRepositoryError::TaskNotFound`] when the task is not in
    /// the snapshot.
    pub fn replace_task(&mut self, task: Task) -> BoardRepositoryResult<()> {
        let id = task.id();
        let slot = self
            .tasks
            .iter_mut()
            .find(|existing| existing.id() == id)
            .ok_or(BoardRepositoryError::TaskNotFound(id))?;
        *slot = task;
        if !self.changes.inserted_tasks.contains(&id) {
            self.changes.updated_tasks.insert(id);
        }
        Ok(())
    }

    /// Applies a partial update to a task in the snapshot.
    ///
    /// The task is only marked as updated when the patch changed it.
    /// Returns `true` in that case.
    ///
    /// # Errors
    ///
    /// Returns [`BoardRepositoryError::TaskNotFound`] when the patched task
    /// is not in the snapshot.
    pub fn apply_patch(
        &mut self,
        patch: &TaskPatch,
        clock: &impl Clock,
    ) -> BoardRepositoryResult<bool> {
        let mut task = self
            .task(patch.task_id)
            .cloned()
            .ok_or(BoardRepositoryError::TaskNotFound(patch.task_id))?;
        if !patch.apply_to(&mut task, clock) {
            return Ok(false);
        }
        self.replace_task(task)?;
        Ok(true)
    }

    /// Removes a task permanently, returning it when it was present.
    pub fn remove_task(&mut self, id: TaskId) -> Option<Task> {
        let position = self.tasks.iter().position(|task| task.id() == id)?;
        let removed = self.tasks.remove(position);
        self.changes.updated_tasks.remove(&id);
        if !self.changes.inserted_tasks.remove(&id) {
            self.changes.removed_tasks.insert(id);
        }
        Some(removed)
    }

    /// Adds a new sprint.
    ///
    /// # Errors
    ///
    /// Returns [`BoardRepositoryError::DuplicateSprint`] when the identifier
    /// is already present and [`BoardRepositoryError::ProjectMismatch`] when
    /// the sprint belongs to another project.
    pub fn insert_sprint(&mut self, sprint: Sprint) -> BoardRepositoryResult<()> {
        self.ensure_project(sprint.project_id())?;
        if self.sprint(sprint.id()).is_some() {
            return Err(BoardRepositoryError::DuplicateSprint(sprint.id()));
        }
        self.changes.inserted_sprints.insert(sprint.id());
        self.sprints.push(sprint);
        Ok(())
    }

    /// Replaces an existing sprint with an updated copy.
    ///
    /// # Errors
    ///
    /// Returns [`BoardRepositoryError::SprintNotFound`] when the sprint is not
    /// in the snapshot.
    pub fn replace_sprint(&mut self, sprint: Sprint) -> BoardRepositoryResult<()> {
        let id = sprint.id();
        let slot = self
            .sprints
            .iter_mut()
            .find(|existing| existing.id() == id)
            .ok_or(BoardRepositoryError::SprintNotFound(id))?;
        *slot = sprint;
        if !self.changes.inserted_sprints.contains(&id) {
            self.changes.updated_sprints.insert(id);
        }
        Ok(())
    }

    /// Returns the tasks added by the transaction.
    pub fn inserted_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks_in(&self.changes.inserted_tasks)
    }

    /// Returns the tasks modified by the transaction.
    pub fn updated_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks_in(&self.changes.updated_tasks)
    }

    /// Returns the identifiers of tasks removed by the transaction.
    pub fn removed_task_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.changes.removed_tasks.iter().copied()
    }

    /// Returns the sprints added by the transaction.
    pub fn inserted_sprints(&self) -> impl Iterator<Item = &Sprint> {
        self.sprints_in(&self.changes.inserted_sprints)
    }

    /// Returns the sprints modified by the transaction.
    pub fn updated_sprints(&self) -> impl Iterator<Item = &Sprint> {
        self.sprints_in(&self.changes.updated_sprints)
    }

    fn tasks_in<'a>(&'a self, ids: &'a BTreeSet<TaskId>) -> impl Iterator<Item = &'a Task> {
        self.tasks.iter().filter(move |task| ids.contains(&task.id()))
    }

    fn sprints_in<'a>(&'a self, ids: &'a BTreeSet<SprintId>) -> impl Iterator<Item = &'a Sprint> {
        self.sprints
            .iter()
            .filter(move |sprint| ids.contains(&sprint.id()))
    }

    fn ensure_project(&self, project_id: ProjectId) -> BoardRepositoryResult<()> {
        if project_id != self.project_id {
            return Err(BoardRepositoryError::ProjectMismatch {
                expected: self.project_id,
                found: project_id,
            });
        }
        Ok(())
    }
}
