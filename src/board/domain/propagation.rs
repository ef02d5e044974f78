//! Status propagation between user stories, their sub-tasks, and sprints.
//!
//! [`TaskHierarchyStatusEngine`] is pure: it reads a snapshot of a project's
//! tasks and returns the changes to write back. It never touches storage,
//! so callers decide how the returned changes are persisted.
//!
//! Three rules are implemented:
//!
//! - A new incomplete sub-task reopens a finished story (`done` becomes
//!   `in-progress`).
//! - An updated sub-task recomputes its story from the whole sibling set:
//!   all done gives `done`, any started gives `in-progress`, otherwise
//!   `todo`. The recompute always overrides the story's previous status.
//!   Trashing, restoring, or purging a sub-task recomputes the same way
//!   over the live sub-tasks that remain.
//! - Ending a sprint detaches every item from it. Incomplete items go back
//!   to `backlog`, and incomplete sub-tasks of the sprint's stories are
//!   reset to `todo`.

use super::{SprintId, StoryPoints, Task, TaskId, TaskKind, TaskStatus};
use mockable::Clock;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::iter;

/// Status change computed for a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    /// Task whose status changes.
    pub task_id: TaskId,
    /// Status before the change.
    pub from: TaskStatus,
    /// Status after the change.
    pub to: TaskStatus,
}

/// Partial update of a task: only the fields set here are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskPatch {
    /// Task to update.
    pub task_id: TaskId,
    /// New status, if the status changes.
    pub status: Option<TaskStatus>,
    /// Whether the task leaves its sprint.
    pub detach_from_sprint: bool,
}

impl TaskPatch {
    /// Creates an empty patch for a task.
    #[must_use]
    pub const fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            status: None,
            detach_from_sprint: false,
        }
    }

    /// Applies the patch to a task.
    ///
    /// Returns `true` when any field of the task changed.
    pub fn apply_to(&self, task: &mut Task, clock: &impl Clock) -> bool {
        let detached = self.detach_from_sprint && task.detach_from_sprint(clock).is_some();
        let status_changed = self
            .status
            .is_some_and(|status| task.set_status(status, clock));
        detached || status_changed
    }
}

impl From<StatusChange> for TaskPatch {
    fn from(change: StatusChange) -> Self {
        Self {
            task_id: change.task_id,
            status: Some(change.to),
            detach_from_sprint: false,
        }
    }
}

/// Changes required to close a sprint, with a summary of their effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SprintEndPlan {
    /// Sprint being closed.
    pub sprint_id: SprintId,
    /// Partial updates to apply, ordered by task identifier.
    pub patches: Vec<TaskPatch>,
    /// Incomplete items detached and returned to the backlog.
    pub released_to_backlog: Vec<TaskId>,
    /// Completed items detached with their status kept.
    pub detached_done: Vec<TaskId>,
    /// Incomplete sub-tasks of the sprint's stories reset to `todo`.
    pub reset_to_todo: Vec<TaskId>,
    /// Story points of every story committed to the sprint.
    pub committed_points: u32,
    /// Story points of the committed stories that were finished.
    pub completed_points: u32,
}

/// Keeps story status consistent with sub-tasks, and tasks consistent with
/// the sprint lifecycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskHierarchyStatusEngine;

impl TaskHierarchyStatusEngine {
    /// Computes a story's status from the statuses of its sub-tasks.
    ///
    /// An empty sibling set yields `todo`: the all-done rule only applies to
    /// a non-empty set.
    #[must_use]
    pub fn parent_status_for<I>(sibling_statuses: I) -> TaskStatus
    where
        I: IntoIterator<Item = TaskStatus>,
    {
        let mut sibling_count = 0_usize;
        let mut all_done = true;
        let mut any_started = false;
        for status in sibling_statuses {
            sibling_count += 1;
            all_done &= status.is_done();
            any_started |= status.is_started();
        }

        if sibling_count > 0 && all_done {
            TaskStatus::Done
        } else if any_started {
            TaskStatus::InProgress
        } else {
            TaskStatus::Todo
        }
    }

    /// Reopens a finished story when an incomplete sub-task is added to it.
    ///
    /// Returns `None` when `new_task` has no parent, the parent is missing or
    /// trashed, or no change is needed.
    #[must_use]
    pub fn on_child_task_created(new_task: &Task, all_tasks: &[Task]) -> Option<StatusChange> {
        let parent = find_parent(new_task, all_tasks)?;
        if parent.status().is_done() && !new_task.status().is_done() {
            return Some(StatusChange {
                task_id: parent.id(),
                from: parent.status(),
                to: TaskStatus::InProgress,
            });
        }
        None
    }

    /// Recomputes a story's status after one of its sub-tasks changed.
    ///
    /// The sibling set is every live sub-task of the same story, with
    /// `updated_task` taking the place of any stale copy in `all_tasks`.
    /// Returns `None` when there is no parent or its status already matches.
    #[must_use]
    pub fn on_child_task_updated(updated_task: &Task, all_tasks: &[Task]) -> Option<StatusChange> {
        let parent = find_parent(updated_task, all_tasks)?;
        let siblings = live_siblings(parent.id(), updated_task.id(), all_tasks)
            .chain(iter::once(updated_task.status()));
        status_change(parent, Self::parent_status_for(siblings))
    }

    /// Recomputes a story's status after one of its sub-tasks was trashed or
    /// purged.
    ///
    /// `removed_task` is left out of the sibling set whatever its state in
    /// `all_tasks`. A story left without live sub-tasks keeps its status.
    #[must_use]
    pub fn on_child_task_removed(removed_task: &Task, all_tasks: &[Task]) -> Option<StatusChange> {
        let parent = find_parent(removed_task, all_tasks)?;
        let mut siblings = live_siblings(parent.id(), removed_task.id(), all_tasks).peekable();
        siblings.peek()?;
        status_change(parent, Self::parent_status_for(siblings))
    }

    /// Plans the task changes for closing a sprint.
    ///
    /// Completing the sprint record itself is left to the caller. A sub-task
    /// whose story is not part of the sprint keeps its status.
    #[must_use]
    pub fn on_sprint_ended(sprint_id: SprintId, all_tasks: &[Task]) -> SprintEndPlan {
        let sprint_items: Vec<&Task> = all_tasks
            .iter()
            .filter(|task| task.sprint_id() == Some(sprint_id))
            .collect();
        let stories: Vec<&Task> = sprint_items
            .iter()
            .copied()
            .filter(|task| task.is_user_story())
            .collect();
        let story_ids: BTreeSet<TaskId> = stories.iter().map(|story| story.id()).collect();

        let mut patches: BTreeMap<TaskId, TaskPatch> = BTreeMap::new();
        for task in &sprint_items {
            let patch = patches
                .entry(task.id())
                .or_insert_with(|| TaskPatch::new(task.id()));
            patch.detach_from_sprint = true;
            if !task.status().is_done() {
                patch.status = Some(TaskStatus::Backlog);
            }
        }

        for sub_task in all_tasks.iter().filter(|task| belongs_to_any(task, &story_ids)) {
            if sub_task.status().is_done() {
                continue;
            }
            match patches.get_mut(&sub_task.id()) {
                Some(patch) => patch.status = Some(TaskStatus::Todo),
                None if sub_task.status() != TaskStatus::Todo => {
                    let mut patch = TaskPatch::new(sub_task.id());
                    patch.status = Some(TaskStatus::Todo);
                    patches.insert(sub_task.id(), patch);
                }
                None => {}
            }
        }

        let (committed_points, completed_points) = story_point_totals(&stories);
        let patches: Vec<TaskPatch> = patches.into_values().collect();
        SprintEndPlan {
            sprint_id,
            released_to_backlog: ids_where(&patches, |patch| {
                patch.status == Some(TaskStatus::Backlog)
            }),
            detached_done: ids_where(&patches, |patch| {
                patch.detach_from_sprint && patch.status.is_none()
            }),
            reset_to_todo: ids_where(&patches, |patch| patch.status == Some(TaskStatus::Todo)),
            patches,
            committed_points,
            completed_points,
        }
    }
}

fn live_siblings(
    parent_id: TaskId,
    excluded: TaskId,
    all_tasks: &[Task],
) -> impl Iterator<Item = TaskStatus> + '_ {
    all_tasks
        .iter()
        .filter(move |task| {
            task.id() != excluded && task.parent_id() == Some(parent_id) && !task.is_trashed()
        })
        .map(Task::status)
}

fn status_change(parent: &Task, target: TaskStatus) -> Option<StatusChange> {
    (target != parent.status()).then(|| StatusChange {
        task_id: parent.id(),
        from: parent.status(),
        to: target,
    })
}

fn find_parent<'a>(child: &Task, all_tasks: &'a [Task]) -> Option<&'a Task> {
    let parent_id = child.parent_id()?;
    all_tasks
        .iter()
        .find(|task| task.id() == parent_id && !task.is_trashed())
}

fn belongs_to_any(task: &Task, story_ids: &BTreeSet<TaskId>) -> bool {
    match task.kind() {
        TaskKind::Task {
            parent: Some(parent_id),
        } => story_ids.contains(&parent_id),
        TaskKind::Task { parent: None } | TaskKind::UserStory => false,
    }
}

fn story_point_totals(stories: &[&Task]) -> (u32, u32) {
    stories.iter().fold((0_u32, 0_u32), |(committed, completed), story| {
        let points = story.story_points().map_or(0, StoryPoints::value);
        let done_points = if story.status().is_done() { points } else { 0 };
        (
            committed.saturating_add(points),
            completed.saturating_add(done_points),
        )
    })
}

fn ids_where(patches: &[TaskPatch], predicate: impl Fn(&TaskPatch) -> bool) -> Vec<TaskId> {
    patches
        .iter()
        .filter(|patch| predicate(patch))
        .map(|patch| patch.task_id)
        .collect()
}
