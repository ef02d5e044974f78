//! Board services over the `PostgreSQL` repository.

use crate::postgres::helpers::{PgBoard, pg_board};
use diesel::connection::SimpleConnection;
use eyre::{ensure, eyre};
use mockable::DefaultClock;
use rstest::rstest;
use std::sync::Arc;
use taskboard::board::{
    domain::{TaskId, TaskKind, TaskStatus},
    ports::BoardRepository,
    services::{CreateTaskRequest, StartSprintRequest, TaskLifecycleService, UpdateTaskRequest},
};
use uuid::Uuid;

#[rstest]
fn story_status_changes_are_persisted(pg_board: eyre::Result<PgBoard>) -> eyre::Result<()> {
    let board = pg_board?;
    board.rt.block_on(async {
        let story = board
            .tasks
            .create_task(
                CreateTaskRequest::user_story(board.project_id, "Checkout")
                    .with_status(TaskStatus::Done)
                    .with_story_points(5),
            )
            .await?
            .task;
        let open = board
            .tasks
            .create_task(
                CreateTaskRequest::sub_task(board.project_id, story.id(), "Receipt email")
                    .with_status(TaskStatus::Todo),
            )
            .await?;
        ensure!(open.parent_change.is_some());
        ensure!(board.status_of(story.id()).await? == TaskStatus::InProgress);

        board
            .tasks
            .update_task(UpdateTaskRequest::new(open.task.id()).with_status(TaskStatus::Done))
            .await?;
        ensure!(board.status_of(story.id()).await? == TaskStatus::Done);

        let stored = board
            .repository
            .find_task(open.task.id())
            .await?
            .ok_or_else(|| eyre!("sub-task not stored"))?;
        ensure!(stored.kind() == TaskKind::sub_task_of(story.id()));
        ensure!(stored.title().as_str() == "Receipt email");
        Ok::<_, eyre::Report>(())
    })
}

#[rstest]
fn trashing_and_restoring_a_sub_task_is_persisted(
    pg_board: eyre::Result<PgBoard>,
) -> eyre::Result<()> {
    let board = pg_board?;
    board.rt.block_on(async {
        let story = board
            .tasks
            .create_task(
                CreateTaskRequest::user_story(board.project_id, "Reports")
                    .with_status(TaskStatus::InProgress),
            )
            .await?
            .task
            .id();
        board
            .tasks
            .create_task(
                CreateTaskRequest::sub_task(board.project_id, story, "CSV export")
                    .with_status(TaskStatus::Done),
            )
            .await?;
        let open = board
            .tasks
            .create_task(
                CreateTaskRequest::sub_task(board.project_id, story, "PDF export")
                    .with_status(TaskStatus::Todo),
            )
            .await?
            .task
            .id();

        board.tasks.trash_task(open).await?;
        ensure!(board.status_of(story).await? == TaskStatus::Done);
        let trashed = board
            .repository
            .find_task(open)
            .await?
            .ok_or_else(|| eyre!("trashed sub-task not stored"))?;
        ensure!(trashed.is_trashed());

        board.tasks.restore_task(open).await?;
        ensure!(board.status_of(story).await? == TaskStatus::InProgress);

        let purge = board.tasks.purge_task(open).await?;
        ensure!(purge.purged == vec![open]);
        ensure!(board.status_of(story).await? == TaskStatus::Done);
        ensure!(board.repository.find_task(open).await?.is_none());
        Ok::<_, eyre::Report>(())
    })
}

#[rstest]
fn sprint_end_is_written_atomically(pg_board: eyre::Result<PgBoard>) -> eyre::Result<()> {
    let board = pg_board?;
    board.rt.block_on(async {
        let sprint = board
            .sprints
            .start_sprint(StartSprintRequest::new(board.project_id, "Sprint 1"))
            .await?;
        let story = board
            .tasks
            .create_task(
                CreateTaskRequest::user_story(board.project_id, "Search")
                    .with_status(TaskStatus::InProgress)
                    .with_story_points(8),
            )
            .await?
            .task
            .id();
        board.tasks.assign_to_sprint(story, sprint.id()).await?;
        let sub_task = board
            .tasks
            .create_task(
                CreateTaskRequest::sub_task(board.project_id, story, "Indexer")
                    .with_status(TaskStatus::InProgress),
            )
            .await?
            .task
            .id();

        let closure = board.sprints.end_sprint(sprint.id()).await?;

        ensure!(closure.released_to_backlog == vec![story]);
        ensure!(closure.reset_to_todo == vec![sub_task]);
        ensure!(closure.committed_points == 8);
        ensure!(board.status_of(story).await? == TaskStatus::Backlog);
        ensure!(board.status_of(sub_task).await? == TaskStatus::Todo);
        let stored = board
            .repository
            .find_sprint(sprint.id())
            .await?
            .ok_or_else(|| eyre!("sprint not stored"))?;
        ensure!(!stored.is_active());
        ensure!(board.sprints.active_sprint(board.project_id).await?.is_none());
        Ok::<_, eyre::Report>(())
    })
}

#[rstest]
fn second_active_sprint_row_is_refused_by_the_schema(
    pg_board: eyre::Result<PgBoard>,
) -> eyre::Result<()> {
    let board = pg_board?;
    board.rt.block_on(async {
        board
            .sprints
            .start_sprint(StartSprintRequest::new(board.project_id, "Sprint 1"))
            .await?;
        Ok::<_, eyre::Report>(())
    })?;

    let project = board.project_id.into_inner();
    let mut connection = board.pool.get()?;
    let insert = format!(
        "INSERT INTO board_sprints (id, project_id, name, status, start_date) \
         VALUES ('{}', '{project}', 'Sprint 2', 'active', now());",
        Uuid::new_v4()
    );
    ensure!(connection.batch_execute(&insert).is_err());

    let completed = format!(
        "INSERT INTO board_sprints (id, project_id, name, status, start_date, end_date) \
         VALUES ('{}', '{project}', 'Sprint 0', 'completed', now(), now());",
        Uuid::new_v4()
    );
    connection.batch_execute(&completed)?;
    Ok(())
}

#[rstest]
fn untyped_rows_are_read_as_their_legacy_kind(
    pg_board: eyre::Result<PgBoard>,
) -> eyre::Result<()> {
    let board = pg_board?;
    let story_id = Uuid::new_v4();
    let sub_task_id = Uuid::new_v4();
    let project = board.project_id.into_inner();
    let sql = format!(
        "INSERT INTO board_tasks (id, project_id, title, status, created_at, updated_at) \
         VALUES ('{story_id}', '{project}', 'Profile', 'done', now(), now()); \
         INSERT INTO board_tasks \
         (id, project_id, title, parent_task_id, status, created_at, updated_at) \
         VALUES ('{sub_task_id}', '{project}', 'Avatar', '{story_id}', 'done', now(), now());"
    );
    board.pool.get()?.batch_execute(&sql)?;

    board.rt.block_on(async {
        let tasks = board.repository.list_project_tasks(board.project_id).await?;
        let story = TaskId::from_uuid(story_id);
        ensure!(
            tasks
                .iter()
                .any(|task| task.id() == story && task.kind() == TaskKind::UserStory)
        );
        ensure!(tasks.iter().any(|task| {
            task.id() == TaskId::from_uuid(sub_task_id)
                && task.kind() == TaskKind::sub_task_of(story)
        }));

        board
            .tasks
            .create_task(
                CreateTaskRequest::sub_task(board.project_id, story, "Crop tool")
                    .with_status(TaskStatus::Todo),
            )
            .await?;
        ensure!(board.status_of(story).await? == TaskStatus::InProgress);
        Ok::<_, eyre::Report>(())
    })
}

#[rstest]
fn concurrent_sub_task_updates_leave_a_consistent_story(
    pg_board: eyre::Result<PgBoard>,
) -> eyre::Result<()> {
    let board = pg_board?;
    board.rt.block_on(async {
        let story = board
            .tasks
            .create_task(
                CreateTaskRequest::user_story(board.project_id, "Bulk import")
                    .with_status(TaskStatus::InProgress),
            )
            .await?
            .task
            .id();
        let mut sub_tasks = Vec::new();
        for index in 0..6 {
            let created = board
                .tasks
                .create_task(
                    CreateTaskRequest::sub_task(board.project_id, story, format!("Shard {index}"))
                        .with_status(TaskStatus::InProgress),
                )
                .await?;
            sub_tasks.push(created.task.id());
        }

        let service = Arc::new(TaskLifecycleService::new(
            Arc::clone(&board.repository),
            Arc::new(DefaultClock),
        ));
        let mut handles = Vec::new();
        for sub_task in sub_tasks {
            let worker = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                worker
                    .update_task(UpdateTaskRequest::new(sub_task).with_status(TaskStatus::Done))
                    .await
            }));
        }
        for handle in handles {
            handle.await??;
        }

        ensure!(board.status_of(story).await? == TaskStatus::Done);
        Ok::<_, eyre::Report>(())
    })
}
