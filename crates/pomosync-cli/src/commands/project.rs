//! Project management commands for CLI.

use clap::Subcommand;
use pomosync_core::Config;
use serde_json::json;

use super::{find_project, open_tracker, CmdResult};

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Create a new project
    Add {
        /// Project name
        name: String,
    },
    /// List all projects with their task counts
    List,
    /// Delete a project and all its tasks (sessions are kept)
    Delete {
        /// Project id or name
        project: String,
    },
}

pub fn run(action: ProjectAction) -> CmdResult {
    let config = Config::load()?;
    let mut tracker = open_tracker(&config)?;

    match action {
        ProjectAction::Add { name } => {
            let id = tracker.add_project(&name)?;
            println!("Project created: {id}");
        }
        ProjectAction::List => {
            let projects: Vec<_> = tracker
                .projects()
                .iter()
                .map(|p| {
                    json!({
                        "id": p.id,
                        "name": p.name,
                        "tasks": p.tasks.len(),
                        "open_tasks": p.open_tasks().count(),
                        "created_at": p.created_at,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&projects)?);
        }
        ProjectAction::Delete { project } => {
            let id = find_project(&tracker, &project)?.id;
            let removed = tracker.delete_project(id)?;
            println!(
                "Project deleted: {} ({} task(s) removed)",
                removed.name,
                removed.tasks.len()
            );
        }
    }
    Ok(())
}
