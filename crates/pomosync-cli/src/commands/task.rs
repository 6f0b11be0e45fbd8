//! Task management commands for CLI.

use clap::Subcommand;
use pomosync_core::sync::SyncRequest;
use pomosync_core::{Config, SyncConfig};
use serde_json::json;

use super::{find_project, find_task, open_tracker, short_id, CmdResult};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task to a project
    Add {
        /// Project id or name
        project: String,
        /// Task name
        name: String,
    },
    /// List tasks
    List {
        /// Only tasks of this project (id or name)
        #[arg(long)]
        project: Option<String>,
        /// Include completed tasks
        #[arg(long)]
        all: bool,
    },
    /// Mark a task completed
    Done {
        /// Task id or unique id prefix
        task: String,
    },
    /// Mark a completed task open again
    Reopen {
        /// Task id or unique id prefix
        task: String,
    },
    /// Move a task to another project
    Move {
        /// Task id or unique id prefix
        task: String,
        /// Target project id or name
        project: String,
    },
    /// Delete a task (its sessions are kept)
    Delete {
        /// Task id or unique id prefix
        task: String,
    },
}

pub fn run(action: TaskAction) -> CmdResult {
    let config = Config::load()?;
    let mut tracker = open_tracker(&config)?;

    match action {
        TaskAction::Add { project, name } => {
            let project_id = find_project(&tracker, &project)?.id;
            let id = tracker.add_task(project_id, &name)?;
            println!("Task created: {id}");

            let sync = SyncConfig::load()?;
            if sync.auto_sync && sync.tasks_database_id.is_some() {
                let pushes: Vec<_> = tracker
                    .task_pushes(Some(project_id))
                    .into_iter()
                    .filter(|t| t.task_id == id)
                    .collect();
                match super::sync::run_blocking(&sync, &mut tracker, SyncRequest::PushTasks(pushes)) {
                    Ok(applied) => println!("Notion: {applied}"),
                    Err(e) => eprintln!("warning: auto-sync failed: {e}"),
                }
            }
        }
        TaskAction::List { project, all } => {
            let only = project
                .map(|key| find_project(&tracker, &key).map(|p| p.id))
                .transpose()?;
            let tasks: Vec<_> = tracker
                .tasks()
                .filter(|(p, t)| only.map_or(true, |id| p.id == id) && (all || !t.completed))
                .map(|(p, t)| {
                    json!({
                        "id": t.id,
                        "short_id": short_id(t.id),
                        "name": t.name,
                        "project": p.name,
                        "completed": t.completed,
                        "remote_id": t.remote_id,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }
        TaskAction::Done { task } => {
            let id = find_task(&tracker, &task)?.1.id;
            tracker.set_task_completed(id, true)?;
            println!("Task completed: {id}");
        }
        TaskAction::Reopen { task } => {
            let id = find_task(&tracker, &task)?.1.id;
            tracker.set_task_completed(id, false)?;
            println!("Task reopened: {id}");
        }
        TaskAction::Move { task, project } => {
            let id = find_task(&tracker, &task)?.1.id;
            let to = find_project(&tracker, &project)?.id;
            tracker.move_task(id, to)?;
            println!("Task moved: {id}");
        }
        TaskAction::Delete { task } => {
            let id = find_task(&tracker, &task)?.1.id;
            let removed = tracker.delete_task(id)?;
            println!("Task deleted: {}", removed.name);
        }
    }
    Ok(())
}
