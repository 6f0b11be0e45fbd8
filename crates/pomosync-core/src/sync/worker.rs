//! Background execution of sync requests.
//!
//! Requests run as tokio tasks. Their results come back through one
//! unbounded queue that the owner drains from its control loop, so only
//! the owner ever touches the tracker.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::adapter::{RemoteTask, SessionPush, SyncAdapter, SyncReport, TaskPush};
use crate::error::{CoreError, SyncError};
use crate::storage::DocumentStore;
use crate::tracker::{ImportReport, SessionId, TaskId, Tracker};

/// Handle for one in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum SyncRequest {
    PushTasks(Vec<TaskPush>),
    PullTasks,
    PushSessions(Vec<SessionPush>),
}

#[derive(Debug)]
pub enum SyncOutcome {
    TasksPushed(Result<SyncReport<TaskId>, SyncError>),
    TasksPulled(Result<Vec<RemoteTask>, SyncError>),
    SessionsPushed(Result<SyncReport<SessionId>, SyncError>),
}

/// What applying an outcome changed locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    TasksPushed {
        pushed: usize,
        failed: usize,
        linked: usize,
    },
    TasksPulled(ImportReport),
    SessionsPushed {
        pushed: usize,
        failed: usize,
        marked: usize,
    },
}

impl fmt::Display for Applied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Applied::TasksPushed { pushed, failed, .. } => {
                write!(f, "pushed {pushed} task(s)")?;
                if *failed > 0 {
                    write!(f, ", {failed} failed")?;
                }
                Ok(())
            }
            Applied::TasksPulled(r) => write!(
                f,
                "imported {} task(s), linked {}, {} new project(s)",
                r.tasks_imported, r.tasks_linked, r.projects_created
            ),
            Applied::SessionsPushed { pushed, failed, .. } => {
                write!(f, "logged {pushed} session(s)")?;
                if *failed > 0 {
                    write!(f, ", {failed} failed")?;
                }
                Ok(())
            }
        }
    }
}

impl SyncOutcome {
    /// Fold a successful outcome into the tracker. A sync error is returned
    /// as is and leaves the tracker untouched.
    pub fn apply<S: DocumentStore>(self, tracker: &mut Tracker<S>) -> Result<Applied, CoreError> {
        match self {
            SyncOutcome::TasksPushed(result) => {
                let report = result?;
                let linked = tracker.apply_task_push(&report)?;
                Ok(Applied::TasksPushed {
                    pushed: report.pushed.len(),
                    failed: report.failed.len(),
                    linked,
                })
            }
            SyncOutcome::TasksPulled(result) => {
                let tasks = result?;
                Ok(Applied::TasksPulled(tracker.import_remote_tasks(&tasks)?))
            }
            SyncOutcome::SessionsPushed(result) => {
                let report = result?;
                let marked = tracker.apply_session_push(&report)?;
                Ok(Applied::SessionsPushed {
                    pushed: report.pushed.len(),
                    failed: report.failed.len(),
                    marked,
                })
            }
        }
    }
}

#[derive(Debug)]
pub struct SyncResult {
    pub ticket: Ticket,
    pub outcome: SyncOutcome,
}

pub struct SyncWorker {
    adapter: Arc<dyn SyncAdapter>,
    tx: mpsc::UnboundedSender<SyncResult>,
    rx: mpsc::UnboundedReceiver<SyncResult>,
    next_ticket: u64,
    in_flight: HashMap<Ticket, JoinHandle<()>>,
}

impl SyncWorker {
    pub fn new(adapter: Arc<dyn SyncAdapter>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            adapter,
            tx,
            rx,
            next_ticket: 1,
            in_flight: HashMap::new(),
        }
    }

    /// Number of requests whose results have not been received yet.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_pending(&self, ticket: Ticket) -> bool {
        self.in_flight.contains_key(&ticket)
    }

    /// Start `request` on the current tokio runtime.
    pub fn submit(&mut self, request: SyncRequest) -> Ticket {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;

        let adapter = Arc::clone(&self.adapter);
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let outcome = match request {
                SyncRequest::PushTasks(tasks) => {
                    SyncOutcome::TasksPushed(adapter.push_tasks(&tasks).await)
                }
                SyncRequest::PullTasks => SyncOutcome::TasksPulled(adapter.pull_tasks().await),
                SyncRequest::PushSessions(sessions) => {
                    SyncOutcome::SessionsPushed(adapter.push_sessions(&sessions).await)
                }
            };
            // Receiver gone means the worker was dropped.
            let _ = tx.send(SyncResult { ticket, outcome });
        });
        tracing::debug!(adapter = self.adapter.name(), %ticket, "sync request submitted");
        self.in_flight.insert(ticket, handle);
        ticket
    }

    /// Cancel a request. Its result, even if already queued, is never
    /// delivered. Returns false for unknown or finished tickets.
    pub fn abandon(&mut self, ticket: Ticket) -> bool {
        match self.in_flight.remove(&ticket) {
            Some(handle) => {
                handle.abort();
                tracing::debug!(%ticket, "sync request abandoned");
                true
            }
            None => false,
        }
    }

    pub fn abandon_all(&mut self) {
        for (_, handle) in self.in_flight.drain() {
            handle.abort();
        }
    }

    fn accept(&mut self, result: &SyncResult) -> bool {
        self.in_flight.remove(&result.ticket).is_some()
    }

    /// Next finished result, without waiting.
    pub fn try_recv(&mut self) -> Option<SyncResult> {
        while let Ok(result) = self.rx.try_recv() {
            if self.accept(&result) {
                return Some(result);
            }
        }
        None
    }

    /// Wait for the next finished result. `None` once nothing is pending.
    pub async fn recv(&mut self) -> Option<SyncResult> {
        while !self.in_flight.is_empty() {
            let result = self.rx.recv().await?;
            if self.accept(&result) {
                return Some(result);
            }
        }
        None
    }
}

impl Drop for SyncWorker {
    fn drop(&mut self) {
        self.abandon_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Adapter whose pulls block until released.
    struct Gate {
        release: Notify,
    }

    #[async_trait]
    impl SyncAdapter for Gate {
        fn name(&self) -> &'static str {
            "gate"
        }

        async fn push_tasks(&self, tasks: &[TaskPush]) -> Result<SyncReport<TaskId>, SyncError> {
            Ok(SyncReport {
                pushed: tasks
                    .iter()
                    .map(|t| (t.task_id, format!("page-{}", t.name)))
                    .collect(),
                ..SyncReport::default()
            })
        }

        async fn pull_tasks(&self) -> Result<Vec<RemoteTask>, SyncError> {
            self.release.notified().await;
            Ok(Vec::new())
        }

        async fn push_sessions(
            &self,
            _sessions: &[SessionPush],
        ) -> Result<SyncReport<SessionId>, SyncError> {
            Err(SyncError::Auth("revoked".into()))
        }
    }

    fn worker() -> (SyncWorker, Arc<Gate>) {
        let gate = Arc::new(Gate {
            release: Notify::new(),
        });
        (SyncWorker::new(gate.clone()), gate)
    }

    #[tokio::test]
    async fn results_arrive_with_their_ticket() {
        let (mut w, _) = worker();
        let t = w.submit(SyncRequest::PushTasks(vec![TaskPush {
            task_id: TaskId::new(),
            name: "a".into(),
            project_name: "p".into(),
            remote_id: None,
        }]));
        assert!(w.is_pending(t));
        let result = w.recv().await.unwrap();
        assert_eq!(result.ticket, t);
        match result.outcome {
            SyncOutcome::TasksPushed(Ok(report)) => assert_eq!(report.pushed[0].1, "page-a"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(w.pending(), 0);
        assert!(w.recv().await.is_none());
    }

    #[tokio::test]
    async fn abandoned_request_never_delivers() {
        let (mut w, gate) = worker();
        let slow = w.submit(SyncRequest::PullTasks);
        assert!(w.abandon(slow));
        assert!(!w.abandon(slow));
        gate.release.notify_waiters();

        let fast = w.submit(SyncRequest::PushSessions(Vec::new()));
        let result = tokio::time::timeout(Duration::from_secs(5), w.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.ticket, fast);
        assert!(matches!(
            result.outcome,
            SyncOutcome::SessionsPushed(Err(SyncError::Auth(_)))
        ));
        assert!(w.try_recv().is_none());
    }

    #[tokio::test]
    async fn failed_outcome_leaves_tracker_alone() {
        let mut tracker = Tracker::open(crate::storage::MemoryStore::new()).unwrap();
        let outcome = SyncOutcome::SessionsPushed(Err(SyncError::Timeout));
        assert!(matches!(
            outcome.apply(&mut tracker),
            Err(CoreError::Sync(SyncError::Timeout))
        ));
        assert_eq!(tracker.store().writes(), 0);
    }
}
