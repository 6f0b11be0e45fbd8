//! Foreground timer.
//!
//! `run` owns the engine and the tracker on one task. Ticks come from a
//! tokio interval, commands from stdin lines, and sync results from the
//! worker queue; all three are multiplexed with `select!`.

use std::error::Error;
use std::io::{IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use pomosync_core::sync::SyncRequest;
use pomosync_core::timer::format_clock;
use pomosync_core::{
    Config, DateRange, DocumentStore, Event, JsonFileStore, NotionClient, Phase, SessionFilter,
    SessionOutcome, SyncConfig, SyncWorker, TaskId, TimerEngine, TimerState, Tracker,
    TrackerError,
};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Instant, MissedTickBehavior};

use super::{find_task, open_tracker, CmdResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run the timer until `q` or Ctrl-C. Reads s/p/r/q commands from stdin
    Run {
        /// Task credited with work phases (id or prefix)
        #[arg(long)]
        task: Option<String>,
        /// Start the next phase without waiting for `s`
        #[arg(long)]
        auto_advance: bool,
    },
    /// Print the persisted timer state as JSON
    Status,
}

pub fn run(action: TimerAction) -> CmdResult {
    let config = Config::load()?;
    let mut tracker = open_tracker(&config)?;

    match action {
        TimerAction::Run { task, auto_advance } => {
            let task_id = task
                .map(|key| find_task(&tracker, &key).map(|(_, t)| t.id))
                .transpose()?;
            let sync = SyncConfig::load()?;
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            let mut session = TimerSession::new(&config, &sync, &mut tracker, task_id, auto_advance);
            let result = rt.block_on(session.run());
            // A blocking stdin read cannot be cancelled; don't wait for it.
            rt.shutdown_background();
            result?;
        }
        TimerAction::Status => {
            let engine = config
                .timer_engine()
                .with_progress(tracker.completed_work_count(), tracker.next_phase());
            let today = tracker
                .list_sessions(SessionFilter::default().within(DateRange::today(chrono::Local::now())))
                .filter(|s| s.phase == Phase::Work && s.is_completed())
                .count();
            let status = json!({
                "snapshot": engine.snapshot(),
                "long_break_interval": engine.long_break_interval(),
                "work_sessions_today": today,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}

fn emit(event: Option<Event>) {
    if let Some(event) = event {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "event not printable"),
        }
    }
}

/// Report a failed tracker write without stopping the timer.
fn warn_on_failure(result: Result<(), TrackerError>, what: &str) {
    if let Err(e) = result {
        tracing::warn!(error = %e, "{what}");
        eprintln!("warning: {what}: {e}");
    }
}

/// Which phases end up in the session log, and whom they credit.
#[derive(Debug, Clone, Copy, Default)]
struct SessionLog {
    task_id: Option<TaskId>,
    record_breaks: bool,
    record_abandoned: bool,
}

impl SessionLog {
    /// Task credited for `phase`, or `None` when the phase is not logged.
    /// Breaks never credit a task.
    fn entry_for(&self, phase: Phase) -> Option<Option<TaskId>> {
        match phase {
            Phase::Work => Some(self.task_id),
            _ if self.record_breaks => Some(None),
            _ => None,
        }
    }

    /// Log the phase the engine just completed, advance, and persist the
    /// cycle position. The engine advances even when a write fails.
    fn complete_phase<S: DocumentStore>(
        &self,
        engine: &mut TimerEngine,
        tracker: &mut Tracker<S>,
    ) -> (Option<Event>, Result<(), TrackerError>) {
        let phase = engine.phase();
        let length = Duration::from_millis(engine.total_ms());
        let advanced = engine.advance_phase();
        let recorded = match self.entry_for(phase) {
            Some(task) => tracker
                .record_session(task, phase, length, SessionOutcome::Completed)
                .map(drop),
            None => Ok(()),
        };
        let saved = tracker.set_timer_progress(engine.completed_work_count(), engine.phase());
        (advanced, recorded.and(saved))
    }

    /// Reset the engine and log what was done of the interrupted phase.
    /// Less than a second of work is not worth a session.
    fn abandon_phase<S: DocumentStore>(
        &self,
        engine: &mut TimerEngine,
        tracker: &mut Tracker<S>,
    ) -> (Option<Event>, Result<(), TrackerError>) {
        let phase = engine.phase();
        let event = engine.reset();
        let elapsed_ms = match &event {
            Some(Event::TimerReset {
                abandoned_elapsed_ms: Some(ms),
                ..
            }) => *ms,
            _ => 0,
        };
        let recorded = match self.entry_for(phase) {
            Some(task) if self.record_abandoned && elapsed_ms >= 1000 => tracker
                .record_session(
                    task,
                    phase,
                    Duration::from_millis(elapsed_ms),
                    SessionOutcome::Abandoned,
                )
                .map(drop),
            _ => Ok(()),
        };
        (event, recorded)
    }
}

struct TimerSession<'a> {
    engine: TimerEngine,
    tracker: &'a mut Tracker<JsonFileStore>,
    worker: Option<SyncWorker>,
    log: SessionLog,
    auto_advance: bool,
    tick_every: Duration,
    poll_every: Option<Duration>,
    pull_tasks: bool,
}

impl<'a> TimerSession<'a> {
    fn new(
        config: &Config,
        sync: &SyncConfig,
        tracker: &'a mut Tracker<JsonFileStore>,
        task_id: Option<TaskId>,
        auto_advance: bool,
    ) -> Self {
        let engine = config
            .timer_engine()
            .with_progress(tracker.completed_work_count(), tracker.next_phase());
        let worker = if sync.auto_sync && sync.is_configured() {
            match NotionClient::from_config(sync) {
                Ok(client) => Some(SyncWorker::new(Arc::new(client))),
                Err(e) => {
                    eprintln!("warning: auto-sync disabled: {e}");
                    None
                }
            }
        } else {
            None
        };
        Self {
            engine,
            tracker,
            worker,
            log: SessionLog {
                task_id,
                record_breaks: config.timer.record_breaks,
                record_abandoned: config.timer.record_abandoned,
            },
            auto_advance,
            tick_every: Duration::from_millis(config.timer.tick_interval_ms.max(1)),
            poll_every: Some(sync.poll_interval_secs)
                .filter(|s| *s > 0)
                .map(Duration::from_secs),
            pull_tasks: sync.tasks_database_id.is_some(),
        }
    }

    async fn run(&mut self) -> Result<(), Box<dyn Error>> {
        let mut ticker = tokio::time::interval(self.tick_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut poller = self.poll_every.map(tokio::time::interval);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        let mut last = Instant::now();
        let show_clock = std::io::stderr().is_terminal();

        emit(self.engine.start());
        loop {
            tokio::select! {
                now = ticker.tick() => {
                    let elapsed = now.saturating_duration_since(last);
                    last = now;
                    if let Some(event) = self.engine.tick(elapsed) {
                        emit(Some(event));
                        self.phase_completed();
                    } else if show_clock && self.engine.state() == TimerState::Running {
                        eprint!(
                            "\r{} {}  ",
                            self.engine.phase(),
                            format_clock(self.engine.remaining_ms())
                        );
                        let _ = std::io::stderr().flush();
                    }
                }
                line = lines.next_line(), if stdin_open => {
                    match line {
                        Ok(Some(cmd)) => {
                            if !self.command(cmd.trim()) {
                                break;
                            }
                        }
                        Ok(None) => stdin_open = false,
                        Err(e) => {
                            eprintln!("warning: stdin unreadable, commands disabled: {e}");
                            stdin_open = false;
                        }
                    }
                }
                _ = poll_tick(&mut poller) => self.poll(),
                Some(result) = next_result(&mut self.worker) => {
                    self.refresh();
                    match result.outcome.apply(self.tracker) {
                        Ok(applied) => eprintln!("notion: {applied}"),
                        Err(e) => eprintln!("warning: sync failed: {e}"),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    self.abandon();
                    break;
                }
            }
        }

        if let Some(worker) = &mut self.worker {
            worker.abandon_all();
        }
        Ok(())
    }

    /// Handle one stdin command. Returns false to quit.
    fn command(&mut self, cmd: &str) -> bool {
        match cmd {
            "s" | "start" => emit(self.engine.start()),
            "p" | "pause" => emit(self.engine.pause()),
            "r" | "reset" => self.abandon(),
            "q" | "quit" => {
                self.abandon();
                return false;
            }
            "" => {}
            other => eprintln!("unknown command '{other}' (s=start p=pause r=reset q=quit)"),
        }
        true
    }

    /// Pick up changes other invocations wrote since the last mutation.
    fn refresh(&mut self) {
        warn_on_failure(self.tracker.reload(), "data file not re-read");
    }

    fn phase_completed(&mut self) {
        let phase = self.engine.phase();
        self.refresh();
        let (advanced, result) = self.log.complete_phase(&mut self.engine, self.tracker);
        warn_on_failure(result, "session not saved");
        emit(advanced);

        if phase == Phase::Work {
            self.push_sessions();
        }
        if self.auto_advance {
            emit(self.engine.start());
        } else {
            eprintln!("{} ready, press s to start", self.engine.phase());
        }
    }

    fn abandon(&mut self) {
        self.refresh();
        let (event, result) = self.log.abandon_phase(&mut self.engine, self.tracker);
        emit(event);
        warn_on_failure(result, "abandoned session not saved");
    }

    fn push_sessions(&mut self) {
        let Some(worker) = &mut self.worker else {
            return;
        };
        if worker.pending() > 0 {
            return;
        }
        let pushes = self.tracker.session_pushes(SessionFilter::default());
        if !pushes.is_empty() {
            worker.submit(SyncRequest::PushSessions(pushes));
        }
    }

    fn poll(&mut self) {
        if !self.pull_tasks {
            return;
        }
        if let Some(worker) = &mut self.worker {
            if worker.pending() == 0 {
                worker.submit(SyncRequest::PullTasks);
            }
        }
    }
}

async fn poll_tick(poller: &mut Option<tokio::time::Interval>) {
    match poller {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_result(worker: &mut Option<SyncWorker>) -> Option<pomosync_core::sync::SyncResult> {
    match worker {
        Some(w) if w.pending() > 0 => w.recv().await,
        _ => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pomosync_core::MemoryStore;

    fn tracker_with_task() -> (Tracker<MemoryStore>, TaskId) {
        let mut tracker = Tracker::open(MemoryStore::new()).unwrap();
        let project = tracker.add_project("Thesis").unwrap();
        let task = tracker.add_task(project, "Write intro").unwrap();
        (tracker, task)
    }

    fn run_out(engine: &mut TimerEngine) {
        engine.start();
        let total = Duration::from_millis(engine.total_ms());
        assert!(engine.tick(total).is_some());
    }

    #[test]
    fn completed_work_credits_the_task() {
        let (mut tracker, task) = tracker_with_task();
        let log = SessionLog {
            task_id: Some(task),
            ..SessionLog::default()
        };
        let mut engine = TimerEngine::default();
        run_out(&mut engine);

        let (advanced, result) = log.complete_phase(&mut engine, &mut tracker);
        result.unwrap();
        assert!(matches!(
            advanced,
            Some(Event::PhaseAdvanced {
                from: Phase::Work,
                to: Phase::ShortBreak,
                ..
            })
        ));
        let session = &tracker.sessions()[0];
        assert_eq!(session.task_id, Some(task));
        assert_eq!(session.phase, Phase::Work);
        assert_eq!(session.duration_secs, 25 * 60);
        assert!(session.is_completed());
        assert_eq!(tracker.completed_work_count(), 1);
        assert_eq!(tracker.next_phase(), Phase::ShortBreak);
    }

    #[test]
    fn breaks_are_logged_only_when_enabled() {
        let (mut tracker, task) = tracker_with_task();
        let mut log = SessionLog {
            task_id: Some(task),
            ..SessionLog::default()
        };
        let mut engine = TimerEngine::default();
        run_out(&mut engine);
        log.complete_phase(&mut engine, &mut tracker).1.unwrap();

        run_out(&mut engine);
        log.complete_phase(&mut engine, &mut tracker).1.unwrap();
        assert_eq!(tracker.sessions().len(), 1);
        assert_eq!(tracker.next_phase(), Phase::Work);

        log.record_breaks = true;
        run_out(&mut engine);
        log.complete_phase(&mut engine, &mut tracker).1.unwrap();
        run_out(&mut engine);
        log.complete_phase(&mut engine, &mut tracker).1.unwrap();
        let breaks: Vec<_> = tracker
            .sessions()
            .iter()
            .filter(|s| s.phase == Phase::ShortBreak)
            .collect();
        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks[0].task_id, None);
    }

    #[test]
    fn failed_write_still_advances() {
        let (mut tracker, task) = tracker_with_task();
        tracker.store_mut().set_fail_writes(true);
        let log = SessionLog {
            task_id: Some(task),
            ..SessionLog::default()
        };
        let mut engine = TimerEngine::default();
        run_out(&mut engine);

        let (advanced, result) = log.complete_phase(&mut engine, &mut tracker);
        assert!(matches!(result, Err(TrackerError::Persistence(_))));
        assert!(advanced.is_some());
        assert_eq!(engine.phase(), Phase::ShortBreak);
        assert!(!engine.awaiting_advance());
        assert!(tracker.sessions().is_empty());

        tracker.store_mut().set_fail_writes(false);
        assert!(engine.start().is_some());
    }

    #[test]
    fn abandoned_work_is_logged_when_enabled() {
        let (mut tracker, task) = tracker_with_task();
        let mut log = SessionLog {
            task_id: Some(task),
            ..SessionLog::default()
        };
        let mut engine = TimerEngine::default();

        engine.start();
        engine.tick(Duration::from_secs(180));
        log.abandon_phase(&mut engine, &mut tracker).1.unwrap();
        assert!(tracker.sessions().is_empty());

        log.record_abandoned = true;
        engine.start();
        engine.tick(Duration::from_millis(500));
        log.abandon_phase(&mut engine, &mut tracker).1.unwrap();
        assert!(tracker.sessions().is_empty());

        engine.start();
        engine.tick(Duration::from_secs(180));
        let (event, result) = log.abandon_phase(&mut engine, &mut tracker);
        result.unwrap();
        assert!(matches!(event, Some(Event::TimerReset { .. })));
        let session = &tracker.sessions()[0];
        assert_eq!(session.outcome, SessionOutcome::Abandoned);
        assert_eq!(session.duration_secs, 180);
        assert_eq!(session.task_id, Some(task));
        assert_eq!(engine.state(), TimerState::Idle);
    }
}
