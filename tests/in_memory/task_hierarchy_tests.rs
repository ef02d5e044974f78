//! In-memory integration tests for story status propagation.

use super::helpers::{Board, board};
use eyre::ensure;
use rstest::rstest;
use taskboard::board::{
    domain::{BoardDomainError, ProjectId, StatusChange, TaskStatus},
    services::{CreateTaskRequest, TaskLifecycleError, UpdateTaskRequest},
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn new_sub_task_reopens_finished_story_until_it_is_done(board: Board) -> eyre::Result<()> {
    let story = board.story("Checkout", TaskStatus::Done).await?;
    board.sub_task(story, "Card form", TaskStatus::Done).await?;
    ensure!(board.status_of(story).await? == TaskStatus::Done);

    let created = board
        .tasks
        .create_task(
            CreateTaskRequest::sub_task(board.project_id, story, "Receipt email")
                .with_status(TaskStatus::Todo),
        )
        .await?;
    ensure!(
        created.parent_change
            == Some(StatusChange {
                task_id: story,
                from: TaskStatus::Done,
                to: TaskStatus::InProgress,
            })
    );
    ensure!(board.status_of(story).await? == TaskStatus::InProgress);

    let finished = board
        .tasks
        .update_task(UpdateTaskRequest::new(created.task.id()).with_status(TaskStatus::Done))
        .await?;
    ensure!(finished.parent_change.map(|change| change.to) == Some(TaskStatus::Done));
    ensure!(board.status_of(story).await? == TaskStatus::Done);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn story_follows_sub_tasks_through_a_full_cycle(board: Board) -> eyre::Result<()> {
    let story = board.story("Reporting", TaskStatus::Backlog).await?;
    let first = board.sub_task(story, "Schema", TaskStatus::Todo).await?;
    let second = board.sub_task(story, "Charts", TaskStatus::Todo).await?;
    ensure!(board.status_of(story).await? == TaskStatus::Backlog);

    let steps = [
        (first, TaskStatus::InProgress, TaskStatus::InProgress),
        (first, TaskStatus::Done, TaskStatus::InProgress),
        (second, TaskStatus::Done, TaskStatus::Done),
        (first, TaskStatus::Todo, TaskStatus::InProgress),
        (second, TaskStatus::Todo, TaskStatus::Todo),
        (first, TaskStatus::Backlog, TaskStatus::Todo),
    ];
    for (sub_task, status, expected_story) in steps {
        board
            .tasks
            .update_task(UpdateTaskRequest::new(sub_task).with_status(status))
            .await?;
        ensure!(
            board.status_of(story).await? == expected_story,
            "after moving {sub_task} to {status} the story should be {expected_story}"
        );
    }
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn editing_a_sub_task_realigns_a_drifted_story(board: Board) -> eyre::Result<()> {
    let story = board.story("Search", TaskStatus::Todo).await?;
    let sub_task = board.sub_task(story, "Indexer", TaskStatus::InProgress).await?;
    board
        .tasks
        .update_task(UpdateTaskRequest::new(story).with_status(TaskStatus::Backlog))
        .await?;

    let outcome = board
        .tasks
        .update_task(UpdateTaskRequest::new(sub_task).with_title("Incremental indexer"))
        .await?;

    ensure!(outcome.task.title().as_str() == "Incremental indexer");
    ensure!(outcome.parent_change.map(|change| change.to) == Some(TaskStatus::InProgress));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn story_tracks_live_sub_tasks_through_trash_and_restore(board: Board) -> eyre::Result<()> {
    let story = board.story("Billing", TaskStatus::Done).await?;
    let done = board.sub_task(story, "Invoices", TaskStatus::Done).await?;
    let open = board.sub_task(story, "Refunds", TaskStatus::Todo).await?;
    ensure!(board.status_of(story).await? == TaskStatus::InProgress);

    let trashed = board.tasks.trash_task(open).await?;
    ensure!(trashed.parent_change.map(|change| change.to) == Some(TaskStatus::Done));
    ensure!(board.status_of(story).await? == TaskStatus::Done);
    ensure!(board.tasks.recompute_parent_status(done).await?.is_none());

    let restored = board.tasks.restore_task(open).await?;
    ensure!(restored.parent_change.map(|change| change.to) == Some(TaskStatus::InProgress));
    ensure!(board.status_of(story).await? == TaskStatus::InProgress);

    let purged = board.tasks.purge_task(open).await?;
    ensure!(purged.parent_change.map(|change| change.to) == Some(TaskStatus::Done));
    ensure!(board.status_of(story).await? == TaskStatus::Done);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn sub_tasks_only_hang_off_user_stories(board: Board) -> eyre::Result<()> {
    let task = board
        .tasks
        .create_task(CreateTaskRequest::task(board.project_id, "Standalone chore"))
        .await?
        .task
        .id();

    let result = board.sub_task(task, "Nested chore", TaskStatus::Todo).await;
    let error = result
        .err()
        .ok_or_else(|| eyre::eyre!("sub-task of a task was accepted"))?;
    ensure!(matches!(
        error.downcast_ref::<TaskLifecycleError>(),
        Some(TaskLifecycleError::Domain(BoardDomainError::ParentNotUserStory(id))) if *id == task
    ));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn projects_do_not_share_stories(board: Board) -> eyre::Result<()> {
    let story = board.story("Onboarding", TaskStatus::Done).await?;
    let other = Board::over(std::sync::Arc::clone(&board.repository), ProjectId::new());

    let result = other.sub_task(story, "Welcome email", TaskStatus::Todo).await;

    ensure!(result.is_err());
    ensure!(board.status_of(story).await? == TaskStatus::Done);
    ensure!(other.tasks.list_project_tasks(other.project_id).await?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn purging_a_story_removes_its_sub_tasks(board: Board) -> eyre::Result<()> {
    let story = board.story("Legacy import", TaskStatus::Todo).await?;
    let first = board.sub_task(story, "Parse CSV", TaskStatus::Todo).await?;
    let second = board.sub_task(story, "Map columns", TaskStatus::Done).await?;
    let keep = board.story("Dashboard", TaskStatus::Todo).await?;

    let purged = board.tasks.purge_task(story).await?.purged;

    ensure!(purged.first() == Some(&story));
    ensure!(purged.len() == 3);
    ensure!(purged.contains(&first) && purged.contains(&second));
    let remaining = board.tasks.list_project_tasks(board.project_id).await?;
    ensure!(remaining.iter().map(|task| task.id()).collect::<Vec<_>>() == vec![keep]);
    Ok(())
}
