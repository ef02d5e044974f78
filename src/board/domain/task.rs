//! Task aggregate root and the hierarchy types around it.

use super::{BoardDomainError, ParseTaskKindError, ProjectId, SprintId, TaskId, TaskStatus, UserId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Storage value for user stories.
pub const USER_STORY_KIND: &str = "user-story";
/// Storage value for tasks.
pub const TASK_KIND: &str = "task";

/// Position of an item in the story/sub-task hierarchy.
///
/// A user story is always top-level. A task may stand alone (Kanban) or
/// hang under exactly one user story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TaskKind {
    /// Top-level item that may own sub-tasks and carry story points.
    UserStory,
    /// Unit of work, optionally owned by a user story.
    Task {
        /// Owning user story, if any.
        parent: Option<TaskId>,
    },
}

impl TaskKind {
    /// Creates a task kind owned by the given user story.
    #[must_use]
    pub const fn sub_task_of(parent: TaskId) -> Self {
        Self::Task {
            parent: Some(parent),
        }
    }

    /// Creates a standalone task kind.
    #[must_use]
    pub const fn standalone_task() -> Self {
        Self::Task { parent: None }
    }

    /// Returns the owning user story of a sub-task.
    #[must_use]
    pub const fn parent(self) -> Option<TaskId> {
        match self {
            Self::UserStory => None,
            Self::Task { parent } => parent,
        }
    }

    /// Returns `true` for user stories.
    #[must_use]
    pub const fn is_user_story(self) -> bool {
        matches!(self, Self::UserStory)
    }

    /// Returns the canonical storage representation of the type tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserStory => USER_STORY_KIND,
            Self::Task { .. } => TASK_KIND,
        }
    }

    /// Normalises the stored type tag and parent reference of a record.
    ///
    /// Records written before the type tag existed carry no type. An untyped
    /// record without a parent is a user story; an untyped record with a
    /// parent is a sub-task. Every adapter reads task records through this
    /// function.
    ///
    /// # Errors
    ///
    /// Returns [`ParseTaskKindError::UnknownKind`] for unrecognised type tags
    /// and [`ParseTaskKindError::StoryWithParent`] when a user story record
    /// references a parent.
    pub fn from_persisted(
        kind: Option<&str>,
        parent: Option<TaskId>,
    ) -> Result<Self, ParseTaskKindError> {
        let normalized = kind
            .map(|value| value.trim().to_ascii_lowercase().replace('_', "-"))
            .filter(|value| !value.is_empty());
        match (normalized.as_deref(), parent) {
            (None, None) | (Some(USER_STORY_KIND), None) => Ok(Self::UserStory),
            (Some(USER_STORY_KIND), Some(parent_id)) => {
                Err(ParseTaskKindError::StoryWithParent(parent_id))
            }
            (None | Some(TASK_KIND), _) => Ok(Self::Task { parent }),
            (Some(_), _) => Err(ParseTaskKindError::UnknownKind(
                kind.unwrap_or_default().to_owned(),
            )),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-empty task title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskTitle(String);

impl TaskTitle {
    /// Creates a validated title.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::EmptyTaskTitle`] when the title is blank.
    pub fn new(value: impl Into<String>) -> Result<Self, BoardDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BoardDomainError::EmptyTaskTitle);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the title as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the title length in characters.
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Display for TaskTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Story point estimate of a user story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryPoints(u32);

impl StoryPoints {
    /// Wraps an estimate.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the estimate.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

/// Parameter object for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaskParams {
    /// Owning project.
    pub project_id: ProjectId,
    /// Validated title.
    pub title: TaskTitle,
    /// Free-form description.
    pub description: Option<String>,
    /// Hierarchy position.
    pub kind: TaskKind,
    /// Initial status.
    pub status: TaskStatus,
    /// Assigned users.
    pub assignees: BTreeSet<UserId>,
    /// Story point estimate, user stories only.
    pub story_points: Option<StoryPoints>,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted owning project.
    pub project_id: ProjectId,
    /// Persisted title.
    pub title: TaskTitle,
    /// Persisted description.
    pub description: Option<String>,
    /// Normalised hierarchy position.
    pub kind: TaskKind,
    /// Persisted status.
    pub status: TaskStatus,
    /// Persisted sprint assignment.
    pub sprint_id: Option<SprintId>,
    /// Persisted assignees.
    pub assignees: BTreeSet<UserId>,
    /// Persisted estimate.
    pub story_points: Option<StoryPoints>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// Persisted soft-deletion timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    id: TaskId,
    project_id: ProjectId,
    title: TaskTitle,
    description: Option<String>,
    kind: TaskKind,
    status: TaskStatus,
    sprint_id: Option<SprintId>,
    assignees: BTreeSet<UserId>,
    story_points: Option<StoryPoints>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates a new task.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::StoryPointsOnSubTask`] when an estimate is
    /// given for an item that is not a user story.
    pub fn new(params: NewTaskParams, clock: &impl Clock) -> Result<Self, BoardDomainError> {
        let id = TaskId::new();
        if params.story_points.is_some() && !params.kind.is_user_story() {
            return Err(BoardDomainError::StoryPointsOnSubTask(id));
        }
        let timestamp = clock.utc();
        Ok(Self {
            id,
            project_id: params.project_id,
            title: params.title,
            description: params.description,
            kind: params.kind,
            status: params.status,
            sprint_id: None,
            assignees: params.assignees,
            story_points: params.story_points,
            created_at: timestamp,
            updated_at: timestamp,
            deleted_at: None,
        })
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            project_id: data.project_id,
            title: data.title,
            description: data.description,
            kind: data.kind,
            status: data.status,
            sprint_id: data.sprint_id,
            assignees: data.assignees,
            story_points: data.story_points,
            created_at: data.created_at,
            updated_at: data.updated_at,
            deleted_at: data.deleted_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the owning project.
    #[must_use]
    pub const fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the title.
    #[must_use]
    pub const fn title(&self) -> &TaskTitle {
        &self.title
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the hierarchy position.
    #[must_use]
    pub const fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Returns the owning user story of a sub-task.
    #[must_use]
    pub const fn parent_id(&self) -> Option<TaskId> {
        self.kind.parent()
    }

    /// Returns `true` for user stories.
    #[must_use]
    pub const fn is_user_story(&self) -> bool {
        self.kind.is_user_story()
    }

    /// Returns the workflow status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the sprint the task is assigned to, if any.
    #[must_use]
    pub const fn sprint_id(&self) -> Option<SprintId> {
        self.sprint_id
    }

    /// Returns the assigned users.
    #[must_use]
    pub const fn assignees(&self) -> &BTreeSet<UserId> {
        &self.assignees
    }

    /// Returns the story point estimate, if any.
    #[must_use]
    pub const fn story_points(&self) -> Option<StoryPoints> {
        self.story_points
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest modification timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the soft-deletion timestamp, if the task is trashed.
    #[must_use]
    pub const fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    /// Returns `true` when the task is in the trash.
    #[must_use]
    pub const fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Fails when the task is in the trash.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::TaskTrashed`] for trashed tasks.
    pub const fn ensure_live(&self) -> Result<(), BoardDomainError> {
        if self.deleted_at.is_some() {
            return Err(BoardDomainError::TaskTrashed(self.id));
        }
        Ok(())
    }

    /// Replaces the title.
    pub fn rename(&mut self, title: TaskTitle, clock: &impl Clock) {
        self.title = title;
        self.touch(clock);
    }

    /// Replaces the description.
    pub fn set_description(&mut self, description: Option<String>, clock: &impl Clock) {
        self.description = description;
        self.touch(clock);
    }

    /// Sets the workflow status.
    ///
    /// Returns `true` when the status changed.
    pub fn set_status(&mut self, status: TaskStatus, clock: &impl Clock) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        self.touch(clock);
        true
    }

    /// Replaces the assigned users.
    pub fn set_assignees(&mut self, assignees: BTreeSet<UserId>, clock: &impl Clock) {
        self.assignees = assignees;
        self.touch(clock);
    }

    /// Sets or clears the story point estimate.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::StoryPointsOnSubTask`] when setting an
    /// estimate on an item that is not a user story.
    pub fn set_story_points(
        &mut self,
        story_points: Option<StoryPoints>,
        clock: &impl Clock,
    ) -> Result<(), BoardDomainError> {
        if story_points.is_some() && !self.is_user_story() {
            return Err(BoardDomainError::StoryPointsOnSubTask(self.id));
        }
        self.story_points = story_points;
        self.touch(clock);
        Ok(())
    }

    /// Attaches the task to a sprint.
    pub fn assign_to_sprint(&mut self, sprint_id: SprintId, clock: &impl Clock) {
        self.sprint_id = Some(sprint_id);
        self.touch(clock);
    }

    /// Detaches the task from its sprint, returning the previous sprint.
    pub fn detach_from_sprint(&mut self, clock: &impl Clock) -> Option<SprintId> {
        let previous = self.sprint_id.take();
        if previous.is_some() {
            self.touch(clock);
        }
        previous
    }

    /// Moves the task to the trash.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::TaskAlreadyTrashed`] when already trashed.
    pub fn trash(&mut self, clock: &impl Clock) -> Result<(), BoardDomainError> {
        if self.is_trashed() {
            return Err(BoardDomainError::TaskAlreadyTrashed(self.id));
        }
        let timestamp = clock.utc();
        self.deleted_at = Some(timestamp);
        self.updated_at = timestamp;
        Ok(())
    }

    /// Restores the task from the trash.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::TaskNotTrashed`] when the task is live.
    pub fn restore(&mut self, clock: &impl Clock) -> Result<(), BoardDomainError> {
        if !self.is_trashed() {
            return Err(BoardDomainError::TaskNotTrashed(self.id));
        }
        self.deleted_at = None;
        self.touch(clock);
        Ok(())
    }

    /// Updates the `updated_at` timestamp to the current clock time.
    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}
