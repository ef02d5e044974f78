//! Shared world state for board behaviour scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use taskboard::board::{
    adapters::memory::InMemoryBoardRepository,
    domain::{ProjectId, Sprint, TaskId, TaskStatus},
    services::{
        SprintClosure, SprintLifecycleError, SprintLifecycleService, TaskLifecycleError,
        TaskLifecycleService,
    },
};

/// Task service type used by the BDD world.
pub type TestTaskService = TaskLifecycleService<InMemoryBoardRepository, DefaultClock>;

/// Sprint service type used by the BDD world.
pub type TestSprintService = SprintLifecycleService<InMemoryBoardRepository, DefaultClock>;

/// Scenario world for board behaviour tests.
pub struct BoardWorld {
    pub tasks: TestTaskService,
    pub sprints: TestSprintService,
    pub project_id: ProjectId,
    pub items: HashMap<String, TaskId>,
    pub sprint: Option<Sprint>,
    pub last_closure: Option<SprintClosure>,
    pub last_task_error: Option<TaskLifecycleError>,
    pub last_sprint_error: Option<SprintLifecycleError>,
}

impl BoardWorld {
    /// Creates a world with an empty board.
    #[must_use]
    pub fn new() -> Self {
        let repository = Arc::new(InMemoryBoardRepository::new());
        let clock = Arc::new(DefaultClock);
        Self {
            tasks: TaskLifecycleService::new(Arc::clone(&repository), Arc::clone(&clock)),
            sprints: SprintLifecycleService::new(repository, clock),
            project_id: ProjectId::new(),
            items: HashMap::new(),
            sprint: None,
            last_closure: None,
            last_task_error: None,
            last_sprint_error: None,
        }
    }

    /// Returns the identifier of an item created earlier in the scenario.
    ///
    /// # Errors
    ///
    /// Returns an error if no item has the given title.
    pub fn item(&self, title: &str) -> eyre::Result<TaskId> {
        self.items
            .get(title)
            .copied()
            .ok_or_else(|| eyre::eyre!("no item titled {title:?} in scenario world"))
    }

    /// Returns the sprint started earlier in the scenario.
    ///
    /// # Errors
    ///
    /// Returns an error if no sprint was started.
    pub fn sprint(&self) -> eyre::Result<&Sprint> {
        self.sprint
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing sprint in scenario world"))
    }
}

impl Default for BoardWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> BoardWorld {
    BoardWorld::default()
}

/// Parses a status named in a scenario.
///
/// # Errors
///
/// Returns an error for unknown status names.
pub fn parse_status(status: &str) -> eyre::Result<TaskStatus> {
    TaskStatus::try_from(status).map_err(|err| eyre::eyre!("invalid status in scenario: {err}"))
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
