//! Subcommand handlers plus the lookups they share.

pub mod config;
pub mod project;
pub mod session;
pub mod sync;
pub mod task;
pub mod timer;

use std::error::Error;

use pomosync_core::{Config, JsonFileStore, Project, ProjectId, Task, TaskId, Tracker};

pub type CmdResult = Result<(), Box<dyn Error>>;

/// Open the tracker on the configured document.
pub fn open_tracker(config: &Config) -> Result<Tracker<JsonFileStore>, Box<dyn Error>> {
    let store = match &config.storage.data_file {
        Some(path) => JsonFileStore::new(path),
        None => JsonFileStore::open_default()?,
    };
    Ok(Tracker::open(store)?)
}

/// Resolve a project given by id or exact name.
pub fn find_project<'a>(
    tracker: &'a Tracker<JsonFileStore>,
    key: &str,
) -> Result<&'a Project, Box<dyn Error>> {
    if let Ok(id) = key.parse::<ProjectId>() {
        if let Some(p) = tracker.project(id) {
            return Ok(p);
        }
    }
    tracker
        .project_by_name(key)
        .ok_or_else(|| format!("no project matches '{key}'").into())
}

/// Resolve a task given by full id or a unique id prefix.
pub fn find_task<'a>(
    tracker: &'a Tracker<JsonFileStore>,
    key: &str,
) -> Result<(&'a Project, &'a Task), Box<dyn Error>> {
    if let Ok(id) = key.parse::<TaskId>() {
        return tracker
            .task(id)
            .ok_or_else(|| format!("no task with id {id}").into());
    }
    let key = key.to_ascii_lowercase();
    let mut matches = tracker
        .tasks()
        .filter(|(_, t)| t.id.to_string().starts_with(&key));
    match (matches.next(), matches.next()) {
        (Some(found), None) => Ok(found),
        (None, _) => Err(format!("no task matches '{key}'").into()),
        (Some(_), Some(_)) => Err(format!("'{key}' matches more than one task").into()),
    }
}

/// First eight characters of an id, enough for prefix lookups.
pub fn short_id(id: impl std::fmt::Display) -> String {
    id.to_string().chars().take(8).collect()
}
