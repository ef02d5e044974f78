//! In-memory board repository for tests and file-backed tooling.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::board::{
    domain::{ProjectId, Sprint, SprintId, Task, TaskId},
    ports::{BoardRepository, BoardRepositoryError, BoardRepositoryResult, BoardSnapshot},
};

/// Thread-safe in-memory board repository.
///
/// A transaction holds the write lock from snapshot read to write-back, so
/// transactions never interleave.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBoardRepository {
    state: Arc<RwLock<InMemoryBoardState>>,
}

#[derive(Debug, Default)]
struct InMemoryBoardState {
    tasks: HashMap<TaskId, Task>,
    sprints: HashMap<SprintId, Sprint>,
}

impl InMemoryBoardRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository holding the given records.
    ///
    /// # Errors
    ///
    /// Returns [`BoardRepositoryError::DuplicateTask`] or
    /// [`BoardRepositoryError::DuplicateSprint`] when an identifier repeats.
    pub fn with_records(
        tasks: impl IntoIterator<Item = Task>,
        sprints: impl IntoIterator<Item = Sprint>,
    ) -> BoardRepositoryResult<Self> {
        let mut state = InMemoryBoardState::default();
        for task in tasks {
            let id = task.id();
            if state.tasks.insert(id, task).is_some() {
                return Err(BoardRepositoryError::DuplicateTask(id));
            }
        }
        for sprint in sprints {
            let id = sprint.id();
            if state.sprints.insert(id, sprint).is_some() {
                return Err(BoardRepositoryError::DuplicateSprint(id));
            }
        }
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Returns a copy of every stored task and sprint, tasks in creation
    /// order and sprints in start order.
    ///
    /// # Errors
    ///
    /// Returns [`BoardRepositoryError::Persistence`] when the lock is
    /// poisoned.
    pub fn records(&self) -> BoardRepositoryResult<(Vec<Task>, Vec<Sprint>)> {
        let state = self.read_state()?;
        let mut tasks: Vec<Task> = state.tasks.values().cloned().collect();
        sort_tasks(&mut tasks);
        let mut sprints: Vec<Sprint> = state.sprints.values().cloned().collect();
        sort_sprints(&mut sprints);
        Ok((tasks, sprints))
    }

    fn read_state(&self) -> BoardRepositoryResult<RwLockReadGuard<'_, InMemoryBoardState>> {
        self.state.read().map_err(|err| {
            BoardRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write_state(&self) -> BoardRepositoryResult<RwLockWriteGuard<'_, InMemoryBoardState>> {
        self.state.write().map_err(|err| {
            BoardRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

impl InMemoryBoardState {
    fn project_tasks(&self, project_id: ProjectId) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .values()
            .filter(|task| task.project_id() == project_id)
            .cloned()
            .collect();
        sort_tasks(&mut tasks);
        tasks
    }

    fn project_sprints(&self, project_id: ProjectId) -> Vec<Sprint> {
        let mut sprints: Vec<Sprint> = self
            .sprints
            .values()
            .filter(|sprint| sprint.project_id() == project_id)
            .cloned()
            .collect();
        sort_sprints(&mut sprints);
        sprints
    }

    /// Validates every change first so that a rejected commit leaves the
    /// state untouched.
    fn commit(&mut self, snapshot: &BoardSnapshot) -> BoardRepositoryResult<()> {
        if let Some(task) = snapshot
            .inserted_tasks()
            .find(|task| self.tasks.contains_key(&task.id()))
        {
            return Err(BoardRepositoryError::DuplicateTask(task.id()));
        }
        if let Some(sprint) = snapshot
            .inserted_sprints()
            .find(|sprint| self.sprints.contains_key(&sprint.id()))
        {
            return Err(BoardRepositoryError::DuplicateSprint(sprint.id()));
        }

        for id in snapshot.removed_task_ids() {
            self.tasks.remove(&id);
        }
        for task in snapshot.inserted_tasks().chain(snapshot.updated_tasks()) {
            self.tasks.insert(task.id(), task.clone());
        }
        for sprint in snapshot
            .inserted_sprints()
            .chain(snapshot.updated_sprints())
        {
            self.sprints.insert(sprint.id(), sprint.clone());
        }
        Ok(())
    }
}

fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by_key(|task| (task.created_at(), task.id()));
}

fn sort_sprints(sprints: &mut [Sprint]) {
    sprints.sort_by_key(|sprint| (sprint.start_date(), sprint.id()));
}

#[async_trait]
impl BoardRepository for InMemoryBoardRepository {
    async fn transact<T, E, F>(&self, project_id: ProjectId, mutation: F) -> Result<T, E>
    where
        F: FnOnce(&mut BoardSnapshot) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<BoardRepositoryError> + Send + 'static,
    {
        let mut state = self.write_state()?;
        let mut snapshot = BoardSnapshot::new(
            project_id,
            state.project_tasks(project_id),
            state.project_sprints(project_id),
        );
        let output = mutation(&mut snapshot)?;
        state.commit(&snapshot)?;
        Ok(output)
    }

    async fn find_task(&self, id: TaskId) -> BoardRepositoryResult<Option<Task>> {
        let state = self.read_state()?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn find_sprint(&self, id: SprintId) -> BoardRepositoryResult<Option<Sprint>> {
        let state = self.read_state()?;
        Ok(state.sprints.get(&id).cloned())
    }

    async fn list_project_tasks(&self, project_id: ProjectId) -> BoardRepositoryResult<Vec<Task>> {
        let state = self.read_state()?;
        Ok(state.project_tasks(project_id))
    }

    async fn list_project_sprints(
        &self,
        project_id: ProjectId,
    ) -> BoardRepositoryResult<Vec<Sprint>> {
        let state = self.read_state()?;
        Ok(state.project_sprints(project_id))
    }
}
