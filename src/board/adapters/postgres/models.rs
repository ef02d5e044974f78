//! Diesel row models for board persistence.

use super::schema::{board_sprints, board_tasks};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for task records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = board_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Owning project.
    pub project_id: uuid::Uuid,
    /// Task title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Type tag, absent on legacy rows.
    pub kind: Option<String>,
    /// Owning user story.
    pub parent_task_id: Option<uuid::Uuid>,
    /// Sprint assignment.
    pub sprint_id: Option<uuid::Uuid>,
    /// Workflow status.
    pub status: String,
    /// Assignee identifiers as a JSON array.
    pub assignees: Value,
    /// Story point estimate.
    pub story_points: Option<i32>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-deletion timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Write model for task records, used for inserts and full-row updates.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = board_tasks)]
#[diesel(treat_none_as_null = true)]
pub struct TaskWriteRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Owning project.
    pub project_id: uuid::Uuid,
    /// Task title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Type tag.
    pub kind: Option<String>,
    /// Owning user story.
    pub parent_task_id: Option<uuid::Uuid>,
    /// Sprint assignment.
    pub sprint_id: Option<uuid::Uuid>,
    /// Workflow status.
    pub status: String,
    /// Assignee identifiers as a JSON array.
    pub assignees: Value,
    /// Story point estimate.
    pub story_points: Option<i32>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-deletion timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Query result row for sprint records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = board_sprints)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SprintRow {
    /// Sprint identifier.
    pub id: uuid::Uuid,
    /// Owning project.
    pub project_id: uuid::Uuid,
    /// Display name.
    pub name: String,
    /// Lifecycle status.
    pub status: String,
    /// Start timestamp.
    pub start_date: DateTime<Utc>,
    /// End timestamp.
    pub end_date: Option<DateTime<Utc>>,
}

/// Write model for sprint records.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = board_sprints)]
#[diesel(treat_none_as_null = true)]
pub struct SprintWriteRow {
    /// Sprint identifier.
    pub id: uuid::Uuid,
    /// Owning project.
    pub project_id: uuid::Uuid,
    /// Display name.
    pub name: String,
    /// Lifecycle status.
    pub status: String,
    /// Start timestamp.
    pub start_date: DateTime<Utc>,
    /// End timestamp.
    pub end_date: Option<DateTime<Utc>>,
}
