//! Command-line front end for file-backed task boards.
//!
//! Usage:
//!
//! ```text
//! taskboard --board <file> [--config <file>] <command>
//! ```
//!
//! The board file is a JSON board document. Commands that change the board
//! write the updated document back to the same file and print their result
//! as JSON on standard output. `create-task` and `start-sprint` start an
//! empty board when the file does not exist yet.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use clap::{Parser, Subcommand};
use mockable::DefaultClock;
use serde::Serialize;
use std::io::{ErrorKind, Write};
use std::sync::Arc;
use taskboard::{
    board::{
        adapters::{
            document::{BoardDocument, BoardDocumentError, SprintRecord, TaskRecord},
            memory::InMemoryBoardRepository,
        },
        domain::{ProjectId, SprintId, StatusChange, TaskId, TaskStatus},
        services::{
            CreateTaskRequest, SprintLifecycleService, StartSprintRequest, TaskChangeOutcome,
            TaskLifecycleService, UpdateTaskRequest,
        },
    },
    config::BoardConfig,
    telemetry::{DEFAULT_LOG_DIRECTIVE, init_tracing},
};

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "Maintain user stories, sub-tasks, and sprints in a board file")]
struct Cli {
    /// Board document to read and update.
    #[arg(long)]
    board: Utf8PathBuf,

    /// Optional JSON board configuration.
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every task and sprint of a project
    Show {
        /// Project identifier.
        project_id: ProjectId,
    },
    /// Start a new sprint in a project
    StartSprint {
        /// Project identifier.
        project_id: ProjectId,
        /// Sprint name.
        name: String,
    },
    /// End a sprint and release its unfinished work
    EndSprint {
        /// Sprint identifier.
        sprint_id: SprintId,
    },
    /// Recompute the status of a sub-task's user story
    Recompute {
        /// Sub-task identifier.
        task_id: TaskId,
    },
    /// Create a task, user story, or sub-task
    CreateTask {
        /// Project identifier.
        project_id: ProjectId,
        /// Title.
        title: String,
        /// Create a user story instead of a standalone task.
        #[arg(long, conflicts_with = "parent")]
        story: bool,
        /// Create a sub-task of this user story.
        #[arg(long)]
        parent: Option<TaskId>,
        /// Initial status instead of the configured default.
        #[arg(long)]
        status: Option<TaskStatus>,
        /// Story point estimate.
        #[arg(long)]
        points: Option<u32>,
        /// Description.
        #[arg(long)]
        description: Option<String>,
    },
    /// Edit a task and recompute its user story
    UpdateTask {
        /// Task identifier.
        task_id: TaskId,
        /// New title.
        #[arg(long)]
        title: Option<String>,
        /// New status.
        #[arg(long)]
        status: Option<TaskStatus>,
        /// New story point estimate.
        #[arg(long)]
        points: Option<u32>,
        /// New description.
        #[arg(long)]
        description: Option<String>,
    },
    /// Move a task to the trash
    Trash {
        /// Task identifier.
        task_id: TaskId,
    },
    /// Bring a task back from the trash
    Restore {
        /// Task identifier.
        task_id: TaskId,
    },
}

impl Command {
    const fn starts_empty_board(&self) -> bool {
        matches!(self, Self::CreateTask { .. } | Self::StartSprint { .. })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectView {
    tasks: Vec<TaskRecord>,
    sprints: Vec<SprintRecord>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskChangeView {
    task: TaskRecord,
    parent_change: Option<StatusChange>,
}

impl From<TaskChangeOutcome> for TaskChangeView {
    fn from(outcome: TaskChangeOutcome) -> Self {
        Self {
            task: TaskRecord::from(&outcome.task),
            parent_change: outcome.parent_change,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(DEFAULT_LOG_DIRECTIVE)?;
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BoardConfig::default(),
    };
    let repository = Arc::new(load_board(&cli.board, cli.command.starts_empty_board())?);
    let clock = Arc::new(DefaultClock);
    let tasks =
        TaskLifecycleService::with_config(Arc::clone(&repository), Arc::clone(&clock), config);
    let sprints = SprintLifecycleService::new(Arc::clone(&repository), clock);

    match cli.command {
        Command::Show { project_id } => {
            let view = ProjectView {
                tasks: tasks
                    .list_project_tasks(project_id)
                    .await?
                    .iter()
                    .map(TaskRecord::from)
                    .collect(),
                sprints: sprints
                    .list_project_sprints(project_id)
                    .await?
                    .iter()
                    .map(SprintRecord::from)
                    .collect(),
            };
            print_json(&view)?;
        }
        Command::StartSprint { project_id, name } => {
            let sprint = sprints
                .start_sprint(StartSprintRequest::new(project_id, name))
                .await?;
            save_board(&repository, &cli.board)?;
            print_json(&sprint)?;
        }
        Command::EndSprint { sprint_id } => {
            let closure = sprints.end_sprint(sprint_id).await?;
            save_board(&repository, &cli.board)?;
            print_json(&closure)?;
        }
        Command::Recompute { task_id } => {
            let change = tasks.recompute_parent_status(task_id).await?;
            if change.is_some() {
                save_board(&repository, &cli.board)?;
            }
            print_json(&change)?;
        }
        Command::CreateTask {
            project_id,
            title,
            story,
            parent,
            status,
            points,
            description,
        } => {
            let mut request = match (story, parent) {
                (true, _) => CreateTaskRequest::user_story(project_id, title),
                (false, Some(parent_id)) => {
                    CreateTaskRequest::sub_task(project_id, parent_id, title)
                }
                (false, None) => CreateTaskRequest::task(project_id, title),
            };
            if let Some(initial) = status {
                request = request.with_status(initial);
            }
            if let Some(estimate) = points {
                request = request.with_story_points(estimate);
            }
            if let Some(text) = description {
                request = request.with_description(text);
            }
            let outcome = tasks.create_task(request).await?;
            save_board(&repository, &cli.board)?;
            print_json(&TaskChangeView::from(outcome))?;
        }
        Command::UpdateTask {
            task_id,
            title,
            status,
            points,
            description,
        } => {
            let mut request = UpdateTaskRequest::new(task_id);
            if let Some(text) = title {
                request = request.with_title(text);
            }
            if let Some(next) = status {
                request = request.with_status(next);
            }
            if let Some(estimate) = points {
                request = request.with_story_points(estimate);
            }
            if let Some(text) = description {
                request = request.with_description(text);
            }
            let outcome = tasks.update_task(request).await?;
            save_board(&repository, &cli.board)?;
            print_json(&TaskChangeView::from(outcome))?;
        }
        Command::Trash { task_id } => {
            let outcome = tasks.trash_task(task_id).await?;
            save_board(&repository, &cli.board)?;
            print_json(&TaskChangeView::from(outcome))?;
        }
        Command::Restore { task_id } => {
            let outcome = tasks.restore_task(task_id).await?;
            save_board(&repository, &cli.board)?;
            print_json(&TaskChangeView::from(outcome))?;
        }
    }

    Ok(())
}

fn load_config(path: &Utf8Path) -> anyhow::Result<BoardConfig> {
    let file_name = path
        .file_name()
        .with_context(|| format!("config path {path} has no file name"))?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .with_context(|| format!("failed to open config directory {parent}"))?;
    let json = dir
        .read_to_string(file_name)
        .with_context(|| format!("failed to read config {path}"))?;
    BoardConfig::from_json(&json).with_context(|| format!("invalid config {path}"))
}

fn load_board(path: &Utf8Path, allow_missing: bool) -> anyhow::Result<InMemoryBoardRepository> {
    let document = match BoardDocument::read_from(path) {
        Err(BoardDocumentError::Io { source, .. })
            if allow_missing && source.kind() == ErrorKind::NotFound =>
        {
            tracing::info!(board = %path, "board file not found, starting an empty board");
            return Ok(InMemoryBoardRepository::new());
        }
        read => read,
    };
    document
        .and_then(BoardDocument::into_repository)
        .with_context(|| format!("failed to load board {path}"))
}

fn save_board(repository: &InMemoryBoardRepository, path: &Utf8Path) -> anyhow::Result<()> {
    BoardDocument::from_repository(repository, &DefaultClock)
        .and_then(|document| document.write_to(path))
        .with_context(|| format!("failed to save board {path}"))
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
