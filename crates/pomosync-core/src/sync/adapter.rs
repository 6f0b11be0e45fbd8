use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SyncError;
use crate::tracker::{Session, SessionId, TaskId};

/// Seam to an external workspace service.
///
/// Implementations only talk to the network. They never see the tracker;
/// callers hand them snapshots and apply the returned reports themselves,
/// so a failed call cannot touch local state.
#[async_trait]
pub trait SyncAdapter: Send + Sync {
    /// Short identifier used in logs (e.g. "notion").
    fn name(&self) -> &'static str;

    /// Create or update the given tasks remotely.
    async fn push_tasks(&self, tasks: &[TaskPush]) -> Result<SyncReport<TaskId>, SyncError>;

    /// Fetch every task the remote side knows about.
    async fn pull_tasks(&self) -> Result<Vec<RemoteTask>, SyncError>;

    /// Log finished sessions remotely.
    async fn push_sessions(
        &self,
        sessions: &[SessionPush],
    ) -> Result<SyncReport<SessionId>, SyncError>;
}

/// A task to export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPush {
    pub task_id: TaskId,
    pub name: String,
    pub project_name: String,
    /// Page id from an earlier push or import; present means update.
    pub remote_id: Option<String>,
}

/// A completed session to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPush {
    pub session_id: SessionId,
    pub task_name: String,
    pub project_name: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: u64,
}

impl SessionPush {
    /// `None` for sessions recorded without a task.
    pub fn from_session(session: &Session) -> Option<Self> {
        Some(Self {
            session_id: session.id,
            task_name: session.task_name.clone()?,
            project_name: session.project_name.clone(),
            started_at: session.started_at,
            ended_at: session.ended_at(),
            duration_secs: session.duration_secs,
        })
    }

    /// Whole minutes, truncated.
    pub fn duration_minutes(&self) -> u64 {
        self.duration_secs / 60
    }
}

/// A task as the remote side reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTask {
    pub remote_id: String,
    pub name: String,
    /// Empty when the remote task carries no project.
    pub project_name: String,
    pub completed: bool,
}

/// One record the service refused.
#[derive(Debug)]
pub struct SyncFailure<Id> {
    pub id: Id,
    pub error: SyncError,
}

/// Outcome of a batch push. Records are independent: one rejected record
/// does not stop the rest.
#[derive(Debug)]
pub struct SyncReport<Id> {
    /// Local id and the remote page id it now maps to.
    pub pushed: Vec<(Id, String)>,
    pub failed: Vec<SyncFailure<Id>>,
    /// Records not sent at all.
    pub skipped: usize,
}

impl<Id> Default for SyncReport<Id> {
    fn default() -> Self {
        Self {
            pushed: Vec::new(),
            failed: Vec::new(),
            skipped: 0,
        }
    }
}

impl<Id> SyncReport<Id> {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl<Id> fmt::Display for SyncReport<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pushed", self.pushed.len())?;
        if !self.failed.is_empty() {
            write!(f, ", {} failed", self.failed.len())?;
        }
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::Phase;
    use crate::tracker::SessionOutcome;
    use chrono::TimeZone;

    #[test]
    fn session_without_task_is_not_pushable() {
        let mut session = Session {
            id: SessionId::new(),
            task_id: None,
            task_name: None,
            project_id: None,
            project_name: None,
            phase: Phase::Work,
            started_at: Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap(),
            duration_secs: 1490,
            outcome: SessionOutcome::Completed,
        };
        assert!(SessionPush::from_session(&session).is_none());

        session.task_name = Some("Write intro".into());
        let push = SessionPush::from_session(&session).unwrap();
        assert_eq!(push.ended_at, Utc.with_ymd_and_hms(2024, 1, 2, 9, 24, 50).unwrap());
        assert_eq!(push.duration_minutes(), 24);
    }

    #[test]
    fn report_summary() {
        let mut report: SyncReport<u32> = SyncReport::default();
        report.pushed.push((1, "page".into()));
        report.skipped = 2;
        assert_eq!(report.to_string(), "1 pushed, 2 skipped");
        report.failed.push(SyncFailure {
            id: 2,
            error: SyncError::Timeout,
        });
        assert!(!report.is_clean());
        assert_eq!(report.to_string(), "1 pushed, 1 failed, 2 skipped");
    }
}
