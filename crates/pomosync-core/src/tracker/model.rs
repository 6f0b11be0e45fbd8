//! Projects, tasks and the session log.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timer::Phase;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

id_type!(
    /// Identifier of a [`Project`].
    ProjectId
);
id_type!(
    /// Identifier of a [`Task`].
    TaskId
);
id_type!(
    /// Identifier of a [`Session`].
    SessionId
);

/// A project that groups related tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Project {
    pub(crate) fn new(name: String) -> Self {
        Self {
            id: ProjectId::new(),
            name,
            created_at: Utc::now(),
            tasks: Vec::new(),
        }
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn open_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| !t.completed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    /// Owning project. The project's `tasks` list is the source of truth;
    /// this mirrors it for callers holding a bare `Task`.
    pub project_id: ProjectId,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    /// Page id in the external workspace once the task has been pushed or
    /// imported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
}

impl Task {
    pub(crate) fn new(project_id: ProjectId, name: String) -> Self {
        Self {
            id: TaskId::new(),
            name,
            project_id,
            completed: false,
            created_at: Utc::now(),
            remote_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOutcome {
    /// The phase ran to zero.
    Completed,
    /// The phase was reset before it finished.
    Abandoned,
}

/// One finished (or abandoned) timer phase. Never modified once recorded.
///
/// Task and project names are copied in at record time so the history
/// stays readable after either is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub project_name: Option<String>,
    pub phase: Phase,
    pub started_at: DateTime<Utc>,
    pub duration_secs: u64,
    pub outcome: SessionOutcome,
}

impl Session {
    /// Saturates at the latest representable instant for corrupt lengths.
    pub fn ended_at(&self) -> DateTime<Utc> {
        seconds(self.duration_secs)
            .and_then(|d| self.started_at.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == SessionOutcome::Completed
    }
}

/// `secs` as a signed span, if chrono can represent it.
pub(crate) fn seconds(secs: u64) -> Option<Duration> {
    Duration::try_seconds(i64::try_from(secs).ok()?)
}

/// What a session's task reference points at today.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskRef<'a> {
    /// The task still exists.
    Live { project: &'a Project, task: &'a Task },
    /// The task was deleted; only the recorded name is left.
    Deleted { name: Option<&'a str> },
    /// The session was recorded without a task.
    Unassigned,
}

impl TaskRef<'_> {
    pub fn is_deleted(&self) -> bool {
        matches!(self, TaskRef::Deleted { .. })
    }
}
