//! Then steps for board behaviour scenarios.

use super::world::{BoardWorld, parse_status, run_async};
use rstest_bdd_macros::then;
use taskboard::board::{
    domain::{BoardDomainError, TaskStatus},
    services::{SprintLifecycleError, TaskLifecycleError},
};

fn stored_state(
    world: &BoardWorld,
    title: &str,
) -> Result<(TaskStatus, bool), eyre::Report> {
    let task_id = world.item(title)?;
    let task = run_async(world.tasks.find_task(task_id))?
        .ok_or_else(|| eyre::eyre!("task {title:?} is no longer stored"))?;
    Ok((task.status(), task.sprint_id().is_some()))
}

#[then(r#"the status of "{title}" is "{status}""#)]
fn status_is(world: &BoardWorld, title: String, status: String) -> Result<(), eyre::Report> {
    let expected = parse_status(&status)?;
    let (actual, _) = stored_state(world, &title)?;
    eyre::ensure!(actual == expected, "expected {title:?} to be {expected}, found {actual}");
    Ok(())
}

#[then(r#""{title}" has status "{status}" and no sprint"#)]
fn status_without_sprint(
    world: &BoardWorld,
    title: String,
    status: String,
) -> Result<(), eyre::Report> {
    let expected = parse_status(&status)?;
    let (actual, in_sprint) = stored_state(world, &title)?;
    eyre::ensure!(actual == expected, "expected {title:?} to be {expected}, found {actual}");
    eyre::ensure!(!in_sprint, "{title:?} is still assigned to a sprint");
    Ok(())
}

#[then("the sprint reports {committed:u32} committed and {completed:u32} completed story points")]
fn sprint_points(world: &BoardWorld, committed: u32, completed: u32) -> Result<(), eyre::Report> {
    let closure = world
        .last_closure
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing sprint closure"))?;
    eyre::ensure!(
        (closure.committed_points, closure.completed_points) == (committed, completed),
        "expected {committed}/{completed} points, found {}/{}",
        closure.committed_points,
        closure.completed_points
    );
    Ok(())
}

#[then("the request is rejected because the parent is not a user story")]
fn parent_not_story(world: &BoardWorld) -> Result<(), eyre::Report> {
    let error = world
        .last_task_error
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing task error"))?;
    if !matches!(
        error,
        TaskLifecycleError::Domain(BoardDomainError::ParentNotUserStory(_))
    ) {
        return Err(eyre::eyre!("expected ParentNotUserStory error, got {error:?}"));
    }
    Ok(())
}

#[then("ending the sprint is rejected because it is already completed")]
fn sprint_already_completed(world: &BoardWorld) -> Result<(), eyre::Report> {
    let error = world
        .last_sprint_error
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing sprint error"))?;
    if !matches!(
        error,
        SprintLifecycleError::Domain(BoardDomainError::SprintAlreadyCompleted(_))
    ) {
        return Err(eyre::eyre!("expected SprintAlreadyCompleted error, got {error:?}"));
    }
    Ok(())
}
