//! Sprint aggregate.

use super::{BoardDomainError, ProjectId, SprintId, SprintStatus};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::Serialize;

/// Parameter object for reconstructing a persisted sprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSprintData {
    /// Persisted sprint identifier.
    pub id: SprintId,
    /// Persisted owning project.
    pub project_id: ProjectId,
    /// Persisted display name.
    pub name: String,
    /// Persisted lifecycle status.
    pub status: SprintStatus,
    /// Persisted start timestamp.
    pub start_date: DateTime<Utc>,
    /// Persisted end timestamp.
    pub end_date: Option<DateTime<Utc>>,
}

/// Time-boxed iteration that tasks can be committed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sprint {
    id: SprintId,
    project_id: ProjectId,
    name: String,
    status: SprintStatus,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
}

impl Sprint {
    /// Starts a new sprint for a project.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::EmptySprintName`] when the name is blank.
    pub fn start(
        project_id: ProjectId,
        name: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<Self, BoardDomainError> {
        let raw = name.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BoardDomainError::EmptySprintName);
        }
        Ok(Self {
            id: SprintId::new(),
            project_id,
            name: trimmed.to_owned(),
            status: SprintStatus::Active,
            start_date: clock.utc(),
            end_date: None,
        })
    }

    /// Reconstructs a sprint from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedSprintData) -> Self {
        Self {
            id: data.id,
            project_id: data.project_id,
            name: data.name,
            status: data.status,
            start_date: data.start_date,
            end_date: data.end_date,
        }
    }

    /// Returns the sprint identifier.
    #[must_use]
    pub const fn id(&self) -> SprintId {
        self.id
    }

    /// Returns the owning project.
    #[must_use]
    pub const fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> SprintStatus {
        self.status
    }

    /// Returns `true` while the sprint is running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, SprintStatus::Active)
    }

    /// Returns the start timestamp.
    #[must_use]
    pub const fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    /// Returns the end timestamp once completed.
    #[must_use]
    pub const fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    /// Marks the sprint completed and stamps its end date.
    ///
    /// # Errors
    ///
    /// Returns [`BoardDomainError::SprintAlreadyCompleted`] when the sprint
    /// has already ended.
    pub fn complete(&mut self, clock: &impl Clock) -> Result<(), BoardDomainError> {
        if !self.is_active() {
            return Err(BoardDomainError::SprintAlreadyCompleted(self.id));
        }
        self.status = SprintStatus::Completed;
        self.end_date = Some(clock.utc());
        Ok(())
    }
}
