//! In-memory integration tests for closing sprints.

use super::helpers::{Board, board};
use eyre::ensure;
use rstest::rstest;
use taskboard::board::{
    domain::{SprintStatus, TaskStatus},
    services::{CreateTaskRequest, StartSprintRequest, UpdateTaskRequest},
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unfinished_work_carries_into_the_next_sprint(board: Board) -> eyre::Result<()> {
    let first_sprint = board
        .sprints
        .start_sprint(StartSprintRequest::new(board.project_id, "Sprint 1"))
        .await?;
    let story = board
        .tasks
        .create_task(
            CreateTaskRequest::user_story(board.project_id, "Notifications").with_story_points(5),
        )
        .await?
        .task
        .id();
    let chore = board
        .tasks
        .create_task(CreateTaskRequest::task(board.project_id, "Rotate keys"))
        .await?
        .task
        .id();
    let push = board.sub_task(story, "Push channel", TaskStatus::Done).await?;
    let mail = board.sub_task(story, "Mail channel", TaskStatus::InProgress).await?;
    board.tasks.assign_to_sprint(story, first_sprint.id()).await?;
    board.tasks.assign_to_sprint(chore, first_sprint.id()).await?;
    board
        .tasks
        .update_task(UpdateTaskRequest::new(chore).with_status(TaskStatus::Done))
        .await?;

    let closure = board.sprints.end_sprint(first_sprint.id()).await?;

    ensure!(closure.released_to_backlog == vec![story]);
    ensure!(closure.detached_done == vec![chore]);
    ensure!(closure.reset_to_todo == vec![mail]);
    ensure!(closure.committed_points == 5);
    ensure!(closure.completed_points == 0);
    ensure!(board.stored(story).await? == (TaskStatus::Backlog, None));
    ensure!(board.stored(chore).await? == (TaskStatus::Done, None));
    ensure!(board.stored(push).await? == (TaskStatus::Done, None));
    ensure!(board.stored(mail).await? == (TaskStatus::Todo, None));

    let second_sprint = board
        .sprints
        .start_sprint(StartSprintRequest::new(board.project_id, "Sprint 2"))
        .await?;
    board.tasks.assign_to_sprint(story, second_sprint.id()).await?;
    board
        .tasks
        .update_task(UpdateTaskRequest::new(mail).with_status(TaskStatus::Done))
        .await?;
    ensure!(board.status_of(story).await? == TaskStatus::Done);

    let second_closure = board.sprints.end_sprint(second_sprint.id()).await?;
    ensure!(second_closure.detached_done == vec![story]);
    ensure!(second_closure.completed_points == 5);

    let sprints = board.sprints.list_project_sprints(board.project_id).await?;
    ensure!(
        sprints
            .iter()
            .all(|sprint| sprint.status() == SprintStatus::Completed)
    );
    ensure!(sprints.len() == 2);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn ending_an_empty_sprint_only_completes_it(board: Board) -> eyre::Result<()> {
    let story = board.story("Idle", TaskStatus::InProgress).await?;
    let sprint = board
        .sprints
        .start_sprint(StartSprintRequest::new(board.project_id, "Quiet week"))
        .await?;

    let closure = board.sprints.end_sprint(sprint.id()).await?;

    ensure!(closure.released_to_backlog.is_empty());
    ensure!(closure.detached_done.is_empty());
    ensure!(closure.reset_to_todo.is_empty());
    ensure!(closure.committed_points == 0);
    ensure!(closure.sprint.status() == SprintStatus::Completed);
    ensure!(board.stored(story).await? == (TaskStatus::InProgress, None));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn completed_sprints_reject_new_work(board: Board) -> eyre::Result<()> {
    let sprint = board
        .sprints
        .start_sprint(StartSprintRequest::new(board.project_id, "Sprint 1"))
        .await?;
    board.sprints.end_sprint(sprint.id()).await?;
    let story = board.story("Late arrival", TaskStatus::Todo).await?;

    let result = board.tasks.assign_to_sprint(story, sprint.id()).await;

    ensure!(result.is_err());
    ensure!(board.stored(story).await? == (TaskStatus::Todo, None));
    Ok(())
}
