//! Task builders shared by board unit tests.

use crate::board::domain::{
    NewTaskParams, PersistedTaskData, ProjectId, SprintId, StoryPoints, Task, TaskId, TaskKind,
    TaskPatch, TaskStatus, TaskTitle,
};
use mockable::DefaultClock;
use std::collections::BTreeSet;

pub(super) fn item(
    project_id: ProjectId,
    kind: TaskKind,
    status: TaskStatus,
    story_points: Option<u32>,
) -> eyre::Result<Task> {
    let title = if kind.is_user_story() { "Story" } else { "Task" };
    Ok(Task::new(
        NewTaskParams {
            project_id,
            title: TaskTitle::new(title)?,
            description: None,
            kind,
            status,
            assignees: BTreeSet::new(),
            story_points: story_points.map(StoryPoints::new),
        },
        &DefaultClock,
    )?)
}

pub(super) fn story(project_id: ProjectId, status: TaskStatus) -> eyre::Result<Task> {
    item(project_id, TaskKind::UserStory, status, None)
}

pub(super) fn sub_task(parent: &Task, status: TaskStatus) -> eyre::Result<Task> {
    item(
        parent.project_id(),
        TaskKind::sub_task_of(parent.id()),
        status,
        None,
    )
}

/// Builds a record as it would be read from storage written before the
/// type tag existed.
pub(super) fn legacy(
    project_id: ProjectId,
    parent: Option<TaskId>,
    status: TaskStatus,
) -> eyre::Result<Task> {
    let now = chrono::Utc::now();
    Ok(Task::from_persisted(PersistedTaskData {
        id: TaskId::new(),
        project_id,
        title: TaskTitle::new("Imported item")?,
        description: None,
        kind: TaskKind::from_persisted(None, parent)?,
        status,
        sprint_id: None,
        assignees: BTreeSet::new(),
        story_points: None,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }))
}

pub(super) fn in_sprint(mut task: Task, sprint_id: SprintId) -> Task {
    task.assign_to_sprint(sprint_id, &DefaultClock);
    task
}

pub(super) fn trashed(mut task: Task) -> eyre::Result<Task> {
    task.trash(&DefaultClock)?;
    Ok(task)
}

pub(super) fn find(tasks: &[Task], id: TaskId) -> eyre::Result<&Task> {
    tasks
        .iter()
        .find(|task| task.id() == id)
        .ok_or_else(|| eyre::eyre!("task {id} missing"))
}

/// Applies patches to a copy of `tasks`, mirroring a repository write-back.
pub(super) fn apply_patches(tasks: &[Task], patches: &[TaskPatch]) -> Vec<Task> {
    let mut result = tasks.to_vec();
    for patch in patches {
        if let Some(task) = result.iter_mut().find(|task| task.id() == patch.task_id) {
            patch.apply_to(task, &DefaultClock);
        }
    }
    result
}
