//! `PostgreSQL` repository implementation for board storage.

use super::{
    models::{SprintRow, SprintWriteRow, TaskRow, TaskWriteRow},
    schema::{board_sprints, board_tasks},
};
use crate::board::{
    domain::{
        PersistedSprintData, PersistedTaskData, ProjectId, Sprint, SprintId, SprintStatus,
        StoryPoints, Task, TaskId, TaskKind, TaskStatus, TaskTitle, UserId,
    },
    ports::{BoardRepository, BoardRepositoryError, BoardRepositoryResult, BoardSnapshot},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::collections::BTreeSet;

/// `PostgreSQL` connection pool type used by board adapters.
pub type BoardPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed board repository.
///
/// Each transaction takes a project-scoped advisory lock before reading the
/// snapshot, so concurrent transactions on one project are serialised while
/// different projects proceed in parallel.
#[derive(Debug, Clone)]
pub struct PostgresBoardRepository {
    pool: BoardPgPool,
}

impl PostgresBoardRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: BoardPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> BoardRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> BoardRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(BoardRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(BoardRepositoryError::persistence)?
    }
}

/// Error carried out of a Diesel transaction body.
enum TransactionError<E> {
    Repository(BoardRepositoryError),
    Mutation(E),
}

impl<E> From<DieselError> for TransactionError<E> {
    fn from(err: DieselError) -> Self {
        Self::Repository(BoardRepositoryError::persistence(err))
    }
}

impl<E> From<BoardRepositoryError> for TransactionError<E> {
    fn from(err: BoardRepositoryError) -> Self {
        Self::Repository(err)
    }
}

impl<E: From<BoardRepositoryError>> TransactionError<E> {
    fn into_inner(self) -> E {
        match self {
            Self::Repository(err) => E::from(err),
            Self::Mutation(err) => err,
        }
    }
}

#[async_trait]
impl BoardRepository for PostgresBoardRepository {
    async fn transact<T, E, F>(&self, project_id: ProjectId, mutation: F) -> Result<T, E>
    where
        F: FnOnce(&mut BoardSnapshot) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<BoardRepositoryError> + Send + 'static,
    {
        let pool = self.pool.clone();
        let joined = tokio::task::spawn_blocking(move || -> Result<T, E> {
            let mut connection = pool.get().map_err(BoardRepositoryError::persistence)?;
            connection
                .transaction::<T, TransactionError<E>, _>(|tx| {
                    lock_project(tx, project_id)?;
                    let mut snapshot = load_snapshot(tx, project_id)?;
                    let output = mutation(&mut snapshot).map_err(TransactionError::Mutation)?;
                    write_changes(tx, &snapshot)?;
                    Ok(output)
                })
                .map_err(TransactionError::into_inner)
        })
        .await;
        joined.map_err(|err| E::from(BoardRepositoryError::persistence(err)))?
    }

    async fn find_task(&self, id: TaskId) -> BoardRepositoryResult<Option<Task>> {
        self.run_blocking(move |connection| {
            let row = board_tasks::table
                .find(id.into_inner())
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(BoardRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn find_sprint(&self, id: SprintId) -> BoardRepositoryResult<Option<Sprint>> {
        self.run_blocking(move |connection| {
            let row = board_sprints::table
                .find(id.into_inner())
                .select(SprintRow::as_select())
                .first::<SprintRow>(connection)
                .optional()
                .map_err(BoardRepositoryError::persistence)?;
            row.map(row_to_sprint).transpose()
        })
        .await
    }

    async fn list_project_tasks(&self, project_id: ProjectId) -> BoardRepositoryResult<Vec<Task>> {
        self.run_blocking(move |connection| load_tasks(connection, project_id))
            .await
    }

    async fn list_project_sprints(
        &self,
        project_id: ProjectId,
    ) -> BoardRepositoryResult<Vec<Sprint>> {
        self.run_blocking(move |connection| load_sprints(connection, project_id))
            .await
    }
}

fn lock_project(connection: &mut PgConnection, project_id: ProjectId) -> BoardRepositoryResult<()> {
    diesel::sql_query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind::<diesel::sql_types::Text, _>(project_id.to_string())
        .execute(connection)
        .map_err(BoardRepositoryError::persistence)?;
    Ok(())
}

fn load_snapshot(
    connection: &mut PgConnection,
    project_id: ProjectId,
) -> BoardRepositoryResult<BoardSnapshot> {
    let tasks = load_tasks(connection, project_id)?;
    let sprints = load_sprints(connection, project_id)?;
    Ok(BoardSnapshot::new(project_id, tasks, sprints))
}

fn load_tasks(
    connection: &mut PgConnection,
    project_id: ProjectId,
) -> BoardRepositoryResult<Vec<Task>> {
    board_tasks::table
        .filter(board_tasks::project_id.eq(project_id.into_inner()))
        .order((board_tasks::created_at.asc(), board_tasks::id.asc()))
        .select(TaskRow::as_select())
        .load::<TaskRow>(connection)
        .map_err(BoardRepositoryError::persistence)?
        .into_iter()
        .map(row_to_task)
        .collect()
}

fn load_sprints(
    connection: &mut PgConnection,
    project_id: ProjectId,
) -> BoardRepositoryResult<Vec<Sprint>> {
    board_sprints::table
        .filter(board_sprints::project_id.eq(project_id.into_inner()))
        .order((board_sprints::start_date.asc(), board_sprints::id.asc()))
        .select(SprintRow::as_select())
        .load::<SprintRow>(connection)
        .map_err(BoardRepositoryError::persistence)?
        .into_iter()
        .map(row_to_sprint)
        .collect()
}

fn write_changes(connection: &mut PgConnection, snapshot: &BoardSnapshot) -> BoardRepositoryResult<()> {
    for sprint in snapshot.inserted_sprints() {
        diesel::insert_into(board_sprints::table)
            .values(&sprint_to_row(sprint))
            .execute(connection)
            .map_err(|err| map_insert_error(err, BoardRepositoryError::DuplicateSprint(sprint.id())))?;
    }
    for sprint in snapshot.updated_sprints() {
        let affected = diesel::update(board_sprints::table.find(sprint.id().into_inner()))
            .set(&sprint_to_row(sprint))
            .execute(connection)
            .map_err(BoardRepositoryError::persistence)?;
        if affected == 0 {
            return Err(BoardRepositoryError::SprintNotFound(sprint.id()));
        }
    }

    let removed: Vec<uuid::Uuid> = snapshot.removed_task_ids().map(TaskId::into_inner).collect();
    if !removed.is_empty() {
        diesel::delete(board_tasks::table.filter(board_tasks::id.eq_any(removed)))
            .execute(connection)
            .map_err(BoardRepositoryError::persistence)?;
    }
    for task in snapshot.inserted_tasks() {
        let row = task_to_row(task)?;
        diesel::insert_into(board_tasks::table)
            .values(&row)
            .execute(connection)
            .map_err(|err| map_insert_error(err, BoardRepositoryError::DuplicateTask(task.id())))?;
    }
    for task in snapshot.updated_tasks() {
        let row = task_to_row(task)?;
        let affected = diesel::update(board_tasks::table.find(task.id().into_inner()))
            .set(&row)
            .execute(connection)
            .map_err(BoardRepositoryError::persistence)?;
        if affected == 0 {
            return Err(BoardRepositoryError::TaskNotFound(task.id()));
        }
    }
    Ok(())
}

fn map_insert_error(err: DieselError, duplicate: BoardRepositoryError) -> BoardRepositoryError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => duplicate,
        other => BoardRepositoryError::persistence(other),
    }
}

pub(super) fn task_to_row(task: &Task) -> BoardRepositoryResult<TaskWriteRow> {
    let assignees =
        serde_json::to_value(task.assignees()).map_err(BoardRepositoryError::persistence)?;
    let story_points = task
        .story_points()
        .map(|points| i32::try_from(points.value()))
        .transpose()
        .map_err(BoardRepositoryError::persistence)?;

    Ok(TaskWriteRow {
        id: task.id().into_inner(),
        project_id: task.project_id().into_inner(),
        title: task.title().as_str().to_owned(),
        description: task.description().map(str::to_owned),
        kind: Some(task.kind().as_str().to_owned()),
        parent_task_id: task.parent_id().map(TaskId::into_inner),
        sprint_id: task.sprint_id().map(SprintId::into_inner),
        status: task.status().as_str().to_owned(),
        assignees,
        story_points,
        created_at: task.created_at(),
        updated_at: task.updated_at(),
        deleted_at: task.deleted_at(),
    })
}

pub(super) fn row_to_task(row: TaskRow) -> BoardRepositoryResult<Task> {
    let kind = TaskKind::from_persisted(
        row.kind.as_deref(),
        row.parent_task_id.map(TaskId::from_uuid),
    )
    .map_err(BoardRepositoryError::persistence)?;
    let status =
        TaskStatus::try_from(row.status.as_str()).map_err(BoardRepositoryError::persistence)?;
    let title = TaskTitle::new(row.title).map_err(BoardRepositoryError::persistence)?;
    let assignees = serde_json::from_value::<BTreeSet<UserId>>(row.assignees)
        .map_err(BoardRepositoryError::persistence)?;
    let story_points = row
        .story_points
        .map(u32::try_from)
        .transpose()
        .map_err(BoardRepositoryError::persistence)?
        .map(StoryPoints::new);

    Ok(Task::from_persisted(PersistedTaskData {
        id: TaskId::from_uuid(row.id),
        project_id: ProjectId::from_uuid(row.project_id),
        title,
        description: row.description,
        kind,
        status,
        sprint_id: row.sprint_id.map(SprintId::from_uuid),
        assignees,
        story_points,
        created_at: row.created_at,
        updated_at: row.updated_at,
        deleted_at: row.deleted_at,
    }))
}

pub(super) fn sprint_to_row(sprint: &Sprint) -> SprintWriteRow {
    SprintWriteRow {
        id: sprint.id().into_inner(),
        project_id: sprint.project_id().into_inner(),
        name: sprint.name().to_owned(),
        status: sprint.status().as_str().to_owned(),
        start_date: sprint.start_date(),
        end_date: sprint.end_date(),
    }
}

pub(super) fn row_to_sprint(row: SprintRow) -> BoardRepositoryResult<Sprint> {
    let status =
        SprintStatus::try_from(row.status.as_str()).map_err(BoardRepositoryError::persistence)?;
    Ok(Sprint::from_persisted(PersistedSprintData {
        id: SprintId::from_uuid(row.id),
        project_id: ProjectId::from_uuid(row.project_id),
        name: row.name,
        status,
        start_date: row.start_date,
        end_date: row.end_date,
    }))
}
