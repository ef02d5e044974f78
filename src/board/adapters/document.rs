//! JSON board documents for import and export.
//!
//! A document carries every task and sprint of one or more projects as
//! plain records. Task records written before the type tag existed are
//! normalised through [`TaskKind::from_persisted`] on load.

use crate::board::{
    adapters::memory::InMemoryBoardRepository,
    domain::{
        BoardDomainError, ParseTaskKindError, PersistedSprintData, PersistedTaskData, ProjectId,
        Sprint, SprintId, SprintStatus, StoryPoints, Task, TaskId, TaskKind, TaskStatus,
        TaskTitle, UserId,
    },
    ports::BoardRepositoryError,
};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

/// Document schema version written by this crate.
pub const BOARD_DOCUMENT_SCHEMA_VERSION: u32 = 1;

const UNNAMED_SPRINT: &str = "Unnamed sprint";

/// Errors raised while reading, writing, or converting board documents.
#[derive(Debug, Error)]
pub enum BoardDocumentError {
    /// Filesystem access failed.
    #[error("failed to access board file {path}: {source}")]
    Io {
        /// File being accessed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The path has no file name component.
    #[error("board path {0} must name a file")]
    MissingFileName(Utf8PathBuf),

    /// The document is not valid JSON for the board schema.
    #[error("invalid board document: {0}")]
    Json(#[from] serde_json::Error),

    /// The document was written by a newer schema.
    #[error("unsupported board document version {found}, expected at most {supported}")]
    UnsupportedVersion {
        /// Version found in the document.
        found: u32,
        /// Latest version this crate reads.
        supported: u32,
    },

    /// A task record violates a domain rule.
    #[error("invalid task record {id}: {source}")]
    InvalidTask {
        /// Offending record.
        id: TaskId,
        /// Violated rule.
        #[source]
        source: BoardDomainError,
    },

    /// A task record carries an unusable type tag.
    #[error("invalid task type on record {id}: {source}")]
    InvalidKind {
        /// Offending record.
        id: TaskId,
        /// Parse failure.
        #[source]
        source: ParseTaskKindError,
    },

    /// A task record's parent breaks the story hierarchy.
    #[error("invalid hierarchy on record {id}: {source}")]
    InvalidHierarchy {
        /// Offending record.
        id: TaskId,
        /// Violated rule.
        #[source]
        source: BoardDomainError,
    },

    /// A project has more than one active sprint.
    #[error("project {project_id} has more than one active sprint: {first} and {second}")]
    MultipleActiveSprints {
        /// Project owning the sprints.
        project_id: ProjectId,
        /// First active sprint found.
        first: SprintId,
        /// Second active sprint found.
        second: SprintId,
    },

    /// Seeding or exporting the repository failed.
    #[error(transparent)]
    Repository(#[from] BoardRepositoryError),
}

/// Serialised board: every task and sprint as plain records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardDocument {
    /// Schema version, `1` for documents written by this crate.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Export timestamp, absent on hand-written documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
    /// Task and user story records.
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
    /// Sprint records.
    #[serde(default)]
    pub sprints: Vec<SprintRecord>,
}

const fn default_schema_version() -> u32 {
    BOARD_DOCUMENT_SCHEMA_VERSION
}

/// Stored form of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Task identifier.
    pub id: TaskId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Title.
    pub title: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Type tag, `user-story` or `task`; missing on legacy records.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Owning user story.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<TaskId>,
    /// Sprint assignment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprint_id: Option<SprintId>,
    /// Workflow status.
    pub status: TaskStatus,
    /// Assigned users.
    #[serde(default)]
    pub assignees: BTreeSet<UserId>,
    /// Story point estimate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_points: Option<u32>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp; defaults to `createdAt` when missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Soft-deletion timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Stored form of a sprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintRecord {
    /// Sprint identifier.
    pub id: SprintId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Lifecycle status.
    pub status: SprintStatus,
    /// Start timestamp.
    pub start_date: DateTime<Utc>,
    /// End timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Converts the record into a task, normalising legacy type data.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDocumentError::InvalidKind`] for unusable type tags and
    /// [`BoardDocumentError::InvalidTask`] for blank titles or estimates on
    /// non-story items.
    pub fn into_task(self) -> Result<Task, BoardDocumentError> {
        let id = self.id;
        let kind = TaskKind::from_persisted(self.kind.as_deref(), self.parent_task_id)
            .map_err(|source| BoardDocumentError::InvalidKind { id, source })?;
        let invalid = |source| BoardDocumentError::InvalidTask { id, source };
        let title = TaskTitle::new(self.title).map_err(invalid)?;
        if self.story_points.is_some() && !kind.is_user_story() {
            return Err(invalid(BoardDomainError::StoryPointsOnSubTask(id)));
        }

        Ok(Task::from_persisted(PersistedTaskData {
            id,
            project_id: self.project_id,
            title,
            description: self.description,
            kind,
            status: self.status,
            sprint_id: self.sprint_id,
            assignees: self.assignees,
            story_points: self.story_points.map(StoryPoints::new),
            created_at: self.created_at,
            updated_at: self.updated_at.unwrap_or(self.created_at),
            deleted_at: self.deleted_at,
        }))
    }
}

impl From<&Task> for TaskRecord {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id(),
            project_id: task.project_id(),
            title: task.title().as_str().to_owned(),
            description: task.description().map(str::to_owned),
            kind: Some(task.kind().as_str().to_owned()),
            parent_task_id: task.parent_id(),
            sprint_id: task.sprint_id(),
            status: task.status(),
            assignees: task.assignees().clone(),
            story_points: task.story_points().map(StoryPoints::value),
            created_at: task.created_at(),
            updated_at: Some(task.updated_at()),
            deleted_at: task.deleted_at(),
        }
    }
}

impl SprintRecord {
    /// Converts the record into a sprint.
    ///
    /// Records without a name receive a placeholder name.
    #[must_use]
    pub fn into_sprint(self) -> Sprint {
        let name = if self.name.trim().is_empty() {
            UNNAMED_SPRINT.to_owned()
        } else {
            self.name
        };
        Sprint::from_persisted(PersistedSprintData {
            id: self.id,
            project_id: self.project_id,
            name,
            status: self.status,
            start_date: self.start_date,
            end_date: self.end_date,
        })
    }
}

impl From<&Sprint> for SprintRecord {
    fn from(sprint: &Sprint) -> Self {
        Self {
            id: sprint.id(),
            project_id: sprint.project_id(),
            name: sprint.name().to_owned(),
            status: sprint.status(),
            start_date: sprint.start_date(),
            end_date: sprint.end_date(),
        }
    }
}

impl BoardDocument {
    /// Builds a document from domain records, stamped with the current time.
    #[must_use]
    pub fn from_records(tasks: &[Task], sprints: &[Sprint], clock: &impl Clock) -> Self {
        Self {
            schema_version: BOARD_DOCUMENT_SCHEMA_VERSION,
            exported_at: Some(clock.utc()),
            tasks: tasks.iter().map(TaskRecord::from).collect(),
            sprints: sprints.iter().map(SprintRecord::from).collect(),
        }
    }

    /// Parses a document from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDocumentError::Json`] for malformed input and
    /// [`BoardDocumentError::UnsupportedVersion`] for unknown schema versions.
    pub fn from_json(json: &str) -> Result<Self, BoardDocumentError> {
        let document: Self = serde_json::from_str(json)?;
        document.ensure_supported()?;
        Ok(document)
    }

    /// Serialises the document as indented JSON.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDocumentError::Json`] when serialisation fails.
    pub fn to_json_pretty(&self) -> Result<String, BoardDocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads a document from a file.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDocumentError::Io`] when the file cannot be read, plus
    /// the errors of [`BoardDocument::from_json`].
    pub fn read_from(path: &Utf8Path) -> Result<Self, BoardDocumentError> {
        let (dir, file_name) = open_parent_dir(path)?;
        let contents = dir
            .read_to_string(file_name)
            .map_err(|source| io_error(path, source))?;
        Self::from_json(&contents)
    }

    /// Writes the document to a file, replacing any previous contents.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDocumentError::Io`] when the file cannot be written.
    pub fn write_to(&self, path: &Utf8Path) -> Result<(), BoardDocumentError> {
        let mut json = self.to_json_pretty()?;
        json.push('\n');
        let (dir, file_name) = open_parent_dir(path)?;
        dir.write(file_name, json.as_bytes())
            .map_err(|source| io_error(path, source))
    }

    /// Converts every record into domain objects and checks the board
    /// invariants across records.
    ///
    /// A sub-task whose parent record is absent is accepted; a parent that
    /// is present must be a user story of the same project.
    ///
    /// # Errors
    ///
    /// Returns the first record conversion failure,
    /// [`BoardDocumentError::InvalidHierarchy`] for a misplaced parent, and
    /// [`BoardDocumentError::MultipleActiveSprints`] when a project has two
    /// running sprints.
    pub fn into_records(self) -> Result<(Vec<Task>, Vec<Sprint>), BoardDocumentError> {
        self.ensure_supported()?;
        let tasks = self
            .tasks
            .into_iter()
            .map(TaskRecord::into_task)
            .collect::<Result<Vec<_>, _>>()?;
        let sprints: Vec<Sprint> = self
            .sprints
            .into_iter()
            .map(SprintRecord::into_sprint)
            .collect();
        check_hierarchy(&tasks)?;
        check_active_sprints(&sprints)?;
        Ok((tasks, sprints))
    }

    /// Seeds an in-memory repository with the document's records.
    ///
    /// # Errors
    ///
    /// Returns conversion failures and
    /// [`BoardDocumentError::Repository`] for duplicate identifiers.
    pub fn into_repository(self) -> Result<InMemoryBoardRepository, BoardDocumentError> {
        let (tasks, sprints) = self.into_records()?;
        Ok(InMemoryBoardRepository::with_records(tasks, sprints)?)
    }

    /// Exports the full contents of an in-memory repository.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDocumentError::Repository`] when the repository state
    /// cannot be read.
    pub fn from_repository(
        repository: &InMemoryBoardRepository,
        clock: &impl Clock,
    ) -> Result<Self, BoardDocumentError> {
        let (tasks, sprints) = repository.records()?;
        Ok(Self::from_records(&tasks, &sprints, clock))
    }

    fn ensure_supported(&self) -> Result<(), BoardDocumentError> {
        if !(1..=BOARD_DOCUMENT_SCHEMA_VERSION).contains(&self.schema_version) {
            return Err(BoardDocumentError::UnsupportedVersion {
                found: self.schema_version,
                supported: BOARD_DOCUMENT_SCHEMA_VERSION,
            });
        }
        Ok(())
    }
}

fn check_hierarchy(tasks: &[Task]) -> Result<(), BoardDocumentError> {
    let by_id: HashMap<TaskId, &Task> = tasks.iter().map(|task| (task.id(), task)).collect();
    for task in tasks {
        let Some(parent) = task.parent_id().and_then(|id| by_id.get(&id)) else {
            continue;
        };
        let violation = if parent.project_id() != task.project_id() {
            Some(BoardDomainError::ParentInOtherProject {
                parent_id: parent.id(),
                parent_project: parent.project_id(),
                project_id: task.project_id(),
            })
        } else if !parent.is_user_story() {
            Some(BoardDomainError::ParentNotUserStory(parent.id()))
        } else {
            None
        };
        if let Some(source) = violation {
            return Err(BoardDocumentError::InvalidHierarchy {
                id: task.id(),
                source,
            });
        }
    }
    Ok(())
}

fn check_active_sprints(sprints: &[Sprint]) -> Result<(), BoardDocumentError> {
    let mut active: BTreeMap<ProjectId, SprintId> = BTreeMap::new();
    for sprint in sprints.iter().filter(|sprint| sprint.is_active()) {
        if let Some(first) = active.insert(sprint.project_id(), sprint.id()) {
            return Err(BoardDocumentError::MultipleActiveSprints {
                project_id: sprint.project_id(),
                first,
                second: sprint.id(),
            });
        }
    }
    Ok(())
}

fn open_parent_dir(path: &Utf8Path) -> Result<(Dir, &str), BoardDocumentError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| BoardDocumentError::MissingFileName(path.to_owned()))?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let dir =
        Dir::open_ambient_dir(parent, ambient_authority()).map_err(|source| io_error(path, source))?;
    Ok((dir, file_name))
}

fn io_error(path: &Utf8Path, source: std::io::Error) -> BoardDocumentError {
    BoardDocumentError::Io {
        path: path.to_owned(),
        source,
    }
}
