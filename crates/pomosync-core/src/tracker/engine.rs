//! The tracker: sole owner of the project/task hierarchy and the session
//! log.
//!
//! Every mutating call edits a copy of the document, writes it through the
//! store, and only then swaps it in. A failed write therefore leaves both
//! the in-memory state and the file exactly as they were.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::filter::{SessionFilter, Sessions};
use super::model::{
    seconds, Project, ProjectId, Session, SessionId, SessionOutcome, Task, TaskId, TaskRef,
};
use crate::error::{EntityKind, TrackerError};
use crate::storage::{Document, DocumentStore};
use crate::sync::{RemoteTask, SessionPush, SyncReport, TaskPush};
use crate::timer::Phase;

/// Project name used for imported tasks that carry no project.
pub const DEFAULT_PROJECT_NAME: &str = "Default Project";

/// Counts from [`Tracker::import_remote_tasks`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub projects_created: usize,
    pub tasks_imported: usize,
    pub tasks_linked: usize,
    pub unchanged: usize,
}

impl ImportReport {
    /// True when the import added or linked something.
    pub fn changed_anything(&self) -> bool {
        self.projects_created + self.tasks_imported + self.tasks_linked > 0
    }
}

pub struct Tracker<S: DocumentStore> {
    store: S,
    doc: Document,
}

impl<S: DocumentStore> Tracker<S> {
    /// Read the whole document from `store`.
    pub fn open(store: S) -> Result<Self, TrackerError> {
        let doc = store.load()?;
        tracing::debug!(
            projects = doc.projects.len(),
            sessions = doc.sessions.len(),
            "tracker loaded"
        );
        Ok(Self { store, doc })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Replace the in-memory document with what the store holds now.
    ///
    /// Long-lived owners call this before mutating so that changes made
    /// by other processes are not overwritten.
    pub fn reload(&mut self) -> Result<(), TrackerError> {
        self.doc = self.store.load()?;
        Ok(())
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Apply `change` to a copy of the document and persist it. The copy
    /// replaces the live document only if both steps succeed.
    fn commit<T>(
        &mut self,
        change: impl FnOnce(&mut Document) -> Result<T, TrackerError>,
    ) -> Result<T, TrackerError> {
        let mut next = self.doc.clone();
        let out = change(&mut next)?;
        self.persist(next)?;
        Ok(out)
    }

    fn persist(&mut self, next: Document) -> Result<(), TrackerError> {
        if let Err(e) = self.store.save(&next) {
            tracing::warn!(error = %e, "persisting tracker state failed, change rolled back");
            return Err(TrackerError::Persistence(e));
        }
        self.doc = next;
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn projects(&self) -> &[Project] {
        &self.doc.projects
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.doc.projects.iter().find(|p| p.id == id)
    }

    pub fn project_by_name(&self, name: &str) -> Option<&Project> {
        let name = name.trim();
        self.doc.projects.iter().find(|p| p.name == name)
    }

    /// Every task, in project order.
    pub fn tasks(&self) -> impl Iterator<Item = (&Project, &Task)> {
        self.doc
            .projects
            .iter()
            .flat_map(|p| p.tasks.iter().map(move |t| (p, t)))
    }

    pub fn task(&self, id: TaskId) -> Option<(&Project, &Task)> {
        self.tasks().find(|(_, t)| t.id == id)
    }

    pub fn sessions(&self) -> &[Session] {
        &self.doc.sessions
    }

    /// Sessions matching `filter`, oldest first. The iterator is lazy and
    /// `Clone`, so a query can be replayed.
    pub fn list_sessions(&self, filter: SessionFilter) -> Sessions<'_> {
        Sessions::new(&self.doc.sessions, filter)
    }

    /// What the session's task reference points at now.
    pub fn resolve_task<'a>(&'a self, session: &'a Session) -> TaskRef<'a> {
        match session.task_id {
            None => TaskRef::Unassigned,
            Some(id) => match self.task(id) {
                Some((project, task)) => TaskRef::Live { project, task },
                None => TaskRef::Deleted {
                    name: session.task_name.as_deref(),
                },
            },
        }
    }

    pub fn completed_work_count(&self) -> u32 {
        self.doc.timer.completed_work_count
    }

    /// Phase the timer runs on its next start.
    pub fn next_phase(&self) -> Phase {
        self.doc.timer.next_phase
    }

    pub fn is_session_synced(&self, id: SessionId) -> bool {
        self.doc.synced_sessions.contains(&id)
    }

    /// Completed sessions with a task name that have not been logged
    /// remotely yet.
    pub fn unsynced_sessions(&self, filter: SessionFilter) -> impl Iterator<Item = &Session> {
        self.list_sessions(filter).filter(move |s| {
            s.is_completed() && s.task_name.is_some() && !self.doc.synced_sessions.contains(&s.id)
        })
    }

    /// Snapshot of tasks to export, optionally limited to one project.
    pub fn task_pushes(&self, project: Option<ProjectId>) -> Vec<TaskPush> {
        self.tasks()
            .filter(|(p, _)| project.map_or(true, |id| p.id == id))
            .map(|(p, t)| TaskPush {
                task_id: t.id,
                name: t.name.clone(),
                project_name: p.name.clone(),
                remote_id: t.remote_id.clone(),
            })
            .collect()
    }

    /// Snapshot of unsynced sessions to log remotely.
    pub fn session_pushes(&self, filter: SessionFilter) -> Vec<SessionPush> {
        self.unsynced_sessions(filter)
            .filter_map(SessionPush::from_session)
            .collect()
    }

    // ── Projects and tasks ───────────────────────────────────────────

    pub fn add_project(&mut self, name: &str) -> Result<ProjectId, TrackerError> {
        let name = clean_name(name)?;
        let id = self.commit(|doc| {
            if doc.projects.iter().any(|p| p.name == name) {
                return Err(TrackerError::DuplicateName(name.clone()));
            }
            let project = Project::new(name.clone());
            let id = project.id;
            doc.projects.push(project);
            Ok(id)
        })?;
        tracing::info!(project = %id, "project added");
        Ok(id)
    }

    /// Remove a project and every task under it. Sessions that referenced
    /// those tasks are kept unchanged.
    pub fn delete_project(&mut self, id: ProjectId) -> Result<Project, TrackerError> {
        let removed = self.commit(|doc| {
            let idx = doc
                .projects
                .iter()
                .position(|p| p.id == id)
                .ok_or_else(|| TrackerError::not_found(EntityKind::Project, id))?;
            Ok(doc.projects.remove(idx))
        })?;
        tracing::info!(project = %id, tasks = removed.tasks.len(), "project deleted");
        Ok(removed)
    }

    pub fn add_task(&mut self, project_id: ProjectId, name: &str) -> Result<TaskId, TrackerError> {
        let name = clean_name(name)?;
        let id = self.commit(|doc| {
            let project = project_mut(doc, project_id)?;
            let task = Task::new(project_id, name);
            let id = task.id;
            project.tasks.push(task);
            Ok(id)
        })?;
        tracing::info!(task = %id, project = %project_id, "task added");
        Ok(id)
    }

    pub fn delete_task(&mut self, id: TaskId) -> Result<Task, TrackerError> {
        let removed = self.commit(|doc| {
            for project in &mut doc.projects {
                if let Some(idx) = project.tasks.iter().position(|t| t.id == id) {
                    return Ok(project.tasks.remove(idx));
                }
            }
            Err(TrackerError::not_found(EntityKind::Task, id))
        })?;
        tracing::info!(task = %id, "task deleted");
        Ok(removed)
    }

    pub fn set_task_completed(&mut self, id: TaskId, completed: bool) -> Result<(), TrackerError> {
        self.commit(|doc| {
            task_mut(doc, id)?.completed = completed;
            Ok(())
        })
    }

    /// Re-home a task. It stays at the end of the target project's list.
    pub fn move_task(&mut self, id: TaskId, to: ProjectId) -> Result<(), TrackerError> {
        self.commit(|doc| {
            project_mut(doc, to)?;
            let mut task = None;
            for project in &mut doc.projects {
                if let Some(idx) = project.tasks.iter().position(|t| t.id == id) {
                    task = Some(project.tasks.remove(idx));
                    break;
                }
            }
            let mut task = task.ok_or_else(|| TrackerError::not_found(EntityKind::Task, id))?;
            task.project_id = to;
            project_mut(doc, to)?.tasks.push(task);
            Ok(())
        })
    }

    // ── Sessions ─────────────────────────────────────────────────────

    /// Append a session that ends now.
    ///
    /// `task` may be `None` for phases run without a selected task.
    pub fn record_session(
        &mut self,
        task: Option<TaskId>,
        phase: Phase,
        duration: Duration,
        outcome: SessionOutcome,
    ) -> Result<SessionId, TrackerError> {
        self.record_session_at(task, phase, duration, outcome, Utc::now())
    }

    /// Append a session that ended at `ended_at`.
    pub fn record_session_at(
        &mut self,
        task: Option<TaskId>,
        phase: Phase,
        duration: Duration,
        outcome: SessionOutcome,
        ended_at: DateTime<Utc>,
    ) -> Result<SessionId, TrackerError> {
        let duration_secs = duration.as_secs();
        let started_at = seconds(duration_secs)
            .and_then(|span| ended_at.checked_sub_signed(span))
            .ok_or(TrackerError::DurationOutOfRange {
                secs: duration_secs,
            })?;
        let id = self.commit(|doc| {
            let (task_name, project_id, project_name) = match task {
                None => (None, None, None),
                Some(tid) => {
                    let (project, task) = doc
                        .projects
                        .iter()
                        .find_map(|p| p.task(tid).map(|t| (p, t)))
                        .ok_or_else(|| TrackerError::not_found(EntityKind::Task, tid))?;
                    (
                        Some(task.name.clone()),
                        Some(project.id),
                        Some(project.name.clone()),
                    )
                }
            };
            let session = Session {
                id: SessionId::new(),
                task_id: task,
                task_name,
                project_id,
                project_name,
                phase,
                started_at,
                duration_secs,
                outcome,
            };
            let id = session.id;
            // Keep the log ordered by start time; equal starts keep
            // insertion order.
            let at = doc
                .sessions
                .partition_point(|s| s.started_at <= session.started_at);
            doc.sessions.insert(at, session);
            Ok(id)
        })?;
        tracing::info!(session = %id, %phase, duration_secs, ?outcome, "session recorded");
        Ok(id)
    }

    // ── Timer persistence ────────────────────────────────────────────

    /// Persist the cycle position: the completed-work-count and the phase
    /// the next start runs. Unchanged values are not rewritten.
    pub fn set_timer_progress(
        &mut self,
        count: u32,
        next_phase: Phase,
    ) -> Result<(), TrackerError> {
        let timer = &self.doc.timer;
        if timer.completed_work_count == count && timer.next_phase == next_phase {
            return Ok(());
        }
        self.commit(|doc| {
            doc.timer.completed_work_count = count;
            doc.timer.next_phase = next_phase;
            Ok(())
        })
    }

    // ── Sync bookkeeping ─────────────────────────────────────────────

    pub fn link_remote_task(&mut self, id: TaskId, remote_id: &str) -> Result<(), TrackerError> {
        self.commit(|doc| {
            task_mut(doc, id)?.remote_id = Some(remote_id.to_string());
            Ok(())
        })
    }

    /// Record which sessions the external service now has. Unknown ids
    /// are ignored. Returns how many were newly marked.
    pub fn mark_sessions_synced(
        &mut self,
        ids: impl IntoIterator<Item = SessionId>,
    ) -> Result<usize, TrackerError> {
        let fresh: Vec<SessionId> = ids
            .into_iter()
            .filter(|id| {
                !self.doc.synced_sessions.contains(id)
                    && self.doc.sessions.iter().any(|s| s.id == *id)
            })
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }
        let count = fresh.len();
        self.commit(|doc| {
            doc.synced_sessions.extend(fresh);
            Ok(())
        })?;
        Ok(count)
    }

    /// Store remote page ids for tasks a push created. Tasks deleted while
    /// the push was in flight are skipped.
    pub fn apply_task_push(&mut self, report: &SyncReport<TaskId>) -> Result<usize, TrackerError> {
        let links: Vec<(TaskId, String)> = report
            .pushed
            .iter()
            .filter(|(id, remote)| {
                self.task(*id)
                    .is_some_and(|(_, t)| t.remote_id.as_deref() != Some(remote.as_str()))
            })
            .cloned()
            .collect();
        if links.is_empty() {
            return Ok(0);
        }
        let count = links.len();
        self.commit(|doc| {
            for (id, remote) in links {
                task_mut(doc, id)?.remote_id = Some(remote);
            }
            Ok(())
        })?;
        Ok(count)
    }

    pub fn apply_session_push(
        &mut self,
        report: &SyncReport<SessionId>,
    ) -> Result<usize, TrackerError> {
        self.mark_sessions_synced(report.pushed.iter().map(|(id, _)| *id))
    }

    /// Merge tasks pulled from the external service.
    ///
    /// A remote task matches a local one by remote id, then by project and
    /// task name. Unmatched tasks are created, along with any project they
    /// name that does not exist yet. The whole import is one write, and an
    /// import that changes nothing writes nothing.
    pub fn import_remote_tasks(
        &mut self,
        remote: &[RemoteTask],
    ) -> Result<ImportReport, TrackerError> {
        let mut next = self.doc.clone();
        let report = merge_remote_tasks(&mut next, remote);
        if report.changed_anything() {
            self.persist(next)?;
        }
        tracing::info!(?report, "remote tasks imported");
        Ok(report)
    }
}

fn merge_remote_tasks(doc: &mut Document, remote: &[RemoteTask]) -> ImportReport {
    let mut report = ImportReport::default();
    for item in remote {
        let Ok(name) = clean_name(&item.name) else {
            report.unchanged += 1;
            continue;
        };
        let project_name = clean_name(&item.project_name)
            .unwrap_or_else(|_| DEFAULT_PROJECT_NAME.to_string());

        let known = doc
            .projects
            .iter()
            .flat_map(|p| p.tasks.iter())
            .any(|t| t.remote_id.as_deref() == Some(item.remote_id.as_str()));
        if known {
            report.unchanged += 1;
            continue;
        }

        let project_idx = match doc.projects.iter().position(|p| p.name == project_name) {
            Some(idx) => idx,
            None => {
                doc.projects.push(Project::new(project_name));
                report.projects_created += 1;
                doc.projects.len() - 1
            }
        };
        let project = &mut doc.projects[project_idx];
        match project.tasks.iter_mut().find(|t| t.name == name) {
            Some(existing) if existing.remote_id.is_none() => {
                existing.remote_id = Some(item.remote_id.clone());
                report.tasks_linked += 1;
            }
            Some(_) => report.unchanged += 1,
            None => {
                let mut task = Task::new(project.id, name);
                task.completed = item.completed;
                task.remote_id = Some(item.remote_id.clone());
                project.tasks.push(task);
                report.tasks_imported += 1;
            }
        }
    }
    report
}

fn clean_name(name: &str) -> Result<String, TrackerError> {
    let name = name.trim();
    if name.is_empty() {
        Err(TrackerError::EmptyName)
    } else {
        Ok(name.to_string())
    }
}

fn project_mut(doc: &mut Document, id: ProjectId) -> Result<&mut Project, TrackerError> {
    doc.projects
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or_else(|| TrackerError::not_found(EntityKind::Project, id))
}

fn task_mut(doc: &mut Document, id: TaskId) -> Result<&mut Task, TrackerError> {
    doc.projects
        .iter_mut()
        .flat_map(|p| p.tasks.iter_mut())
        .find(|t| t.id == id)
        .ok_or_else(|| TrackerError::not_found(EntityKind::Task, id))
}
