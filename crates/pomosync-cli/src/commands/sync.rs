//! Notion sync commands for CLI.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::{Subcommand, ValueEnum};
use pomosync_core::sync::{Applied, SyncRequest};
use pomosync_core::{Config, JsonFileStore, NotionClient, SessionFilter, SyncConfig, SyncWorker, Tracker};
use serde_json::json;

use super::session::RangeArg;
use super::{find_project, open_tracker, CmdResult};

const DEFAULT_WATCH_SECS: u64 = 300;

#[derive(Clone, Copy, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

#[derive(Subcommand)]
pub enum SyncAction {
    /// Show connection settings (token redacted)
    Status,
    /// Store the Notion integration token
    SetToken {
        /// Internal integration secret
        token: String,
    },
    /// Choose the task and session databases
    SetDatabases {
        /// Database tasks are imported from and exported to
        #[arg(long)]
        tasks: Option<String>,
        /// Database finished sessions are logged to
        #[arg(long)]
        sessions: Option<String>,
    },
    /// Push new tasks and log sessions automatically
    Auto {
        #[arg(value_enum)]
        state: Switch,
    },
    /// Check the stored token against the API
    Test,
    /// List databases shared with the integration
    Databases,
    /// Export tasks to the tasks database
    PushTasks {
        /// Only tasks of this project (id or name)
        #[arg(long)]
        project: Option<String>,
    },
    /// Import tasks from the tasks database
    PullTasks,
    /// Log unsynced completed sessions to the sessions database
    PushSessions {
        #[arg(long, value_enum, default_value_t = RangeArg::All)]
        range: RangeArg,
    },
    /// Pull tasks and push sessions periodically until interrupted
    Watch {
        /// Seconds between rounds; defaults to poll_interval_secs
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Forget the token and database selection
    Disconnect,
}

fn runtime() -> Result<tokio::runtime::Runtime, Box<dyn Error>> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

/// Run one request to completion and apply its outcome.
pub fn run_blocking(
    sync: &SyncConfig,
    tracker: &mut Tracker<JsonFileStore>,
    request: SyncRequest,
) -> Result<Applied, Box<dyn Error>> {
    let client = NotionClient::from_config(sync)?;
    runtime()?.block_on(async {
        let mut worker = SyncWorker::new(Arc::new(client));
        worker.submit(request);
        let result = worker.recv().await.ok_or("sync request was cancelled")?;
        Ok::<_, Box<dyn Error>>(result.outcome.apply(tracker)?)
    })
}

pub fn run(action: SyncAction) -> CmdResult {
    let mut sync = SyncConfig::load()?;

    match action {
        SyncAction::Status => {
            let config = Config::load()?;
            let tracker = open_tracker(&config)?;
            let status = json!({
                "connected": sync.has_token(),
                "tasks_database_id": sync.tasks_database_id,
                "sessions_database_id": sync.sessions_database_id,
                "auto_sync": sync.auto_sync,
                "timeout_secs": sync.timeout_secs,
                "poll_interval_secs": sync.poll_interval_secs,
                "unsynced_sessions": tracker.unsynced_sessions(SessionFilter::default()).count(),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        SyncAction::SetToken { token } => {
            let token = token.trim();
            if token.is_empty() {
                return Err("token must not be empty".into());
            }
            sync.token = Some(token.to_string());
            sync.save()?;
            println!("ok");
        }
        SyncAction::SetDatabases { tasks, sessions } => {
            if tasks.is_none() && sessions.is_none() {
                return Err("pass --tasks and/or --sessions".into());
            }
            if tasks.is_some() {
                sync.tasks_database_id = tasks;
            }
            if sessions.is_some() {
                sync.sessions_database_id = sessions;
            }
            sync.save()?;
            println!("ok");
        }
        SyncAction::Auto { state } => {
            sync.auto_sync = matches!(state, Switch::On);
            sync.save()?;
            println!("auto sync {}", if sync.auto_sync { "on" } else { "off" });
        }
        SyncAction::Test => {
            let client = NotionClient::from_config(&sync)?;
            let name = runtime()?.block_on(client.test_connection())?;
            println!("Connected as {name}");
        }
        SyncAction::Databases => {
            let client = NotionClient::from_config(&sync)?;
            let dbs = runtime()?.block_on(client.list_databases())?;
            let list: Vec<_> = dbs
                .iter()
                .map(|db| {
                    json!({
                        "id": db.id,
                        "title": db.title,
                        "tasks": sync.tasks_database_id.as_deref() == Some(db.id.as_str()),
                        "sessions": sync.sessions_database_id.as_deref() == Some(db.id.as_str()),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&list)?);
        }
        SyncAction::PushTasks { project } => {
            let config = Config::load()?;
            let mut tracker = open_tracker(&config)?;
            let only = project
                .map(|key| find_project(&tracker, &key).map(|p| p.id))
                .transpose()?;
            let pushes = tracker.task_pushes(only);
            let applied = run_blocking(&sync, &mut tracker, SyncRequest::PushTasks(pushes))?;
            println!("{applied}");
        }
        SyncAction::PullTasks => {
            let config = Config::load()?;
            let mut tracker = open_tracker(&config)?;
            let applied = run_blocking(&sync, &mut tracker, SyncRequest::PullTasks)?;
            println!("{applied}");
        }
        SyncAction::PushSessions { range } => {
            let config = Config::load()?;
            let mut tracker = open_tracker(&config)?;
            let filter = SessionFilter::default().within(range.date_range());
            let pushes = tracker.session_pushes(filter);
            if pushes.is_empty() {
                println!("nothing to log");
                return Ok(());
            }
            let applied = run_blocking(&sync, &mut tracker, SyncRequest::PushSessions(pushes))?;
            println!("{applied}");
        }
        SyncAction::Watch { interval } => {
            let secs = interval
                .or(Some(sync.poll_interval_secs).filter(|s| *s > 0))
                .unwrap_or(DEFAULT_WATCH_SECS);
            let config = Config::load()?;
            let mut tracker = open_tracker(&config)?;
            watch(&sync, &mut tracker, Duration::from_secs(secs.max(1)))?;
        }
        SyncAction::Disconnect => {
            sync.disconnect();
            sync.save()?;
            println!("disconnected");
        }
    }
    Ok(())
}

fn watch(sync: &SyncConfig, tracker: &mut Tracker<JsonFileStore>, every: Duration) -> CmdResult {
    let client = NotionClient::from_config(sync)?;
    let pull = sync.tasks_database_id.is_some();
    let push = sync.sessions_database_id.is_some();
    if !pull && !push {
        return Err("no database selected; run `pomosync sync set-databases`".into());
    }

    runtime()?.block_on(async {
        let mut worker = SyncWorker::new(Arc::new(client));
        let mut ticker = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if worker.pending() > 0 {
                        tracing::debug!("previous round still running, skipping");
                        continue;
                    }
                    if let Err(e) = tracker.reload() {
                        eprintln!("warning: data file not re-read: {e}");
                    }
                    if pull {
                        worker.submit(SyncRequest::PullTasks);
                    }
                    let sessions = tracker.session_pushes(SessionFilter::default());
                    if push && !sessions.is_empty() {
                        worker.submit(SyncRequest::PushSessions(sessions));
                    }
                }
                Some(result) = worker.recv() => {
                    if let Err(e) = tracker.reload() {
                        eprintln!("warning: data file not re-read: {e}");
                    }
                    match result.outcome.apply(tracker) {
                        Ok(applied) => println!("{applied}"),
                        Err(e) => eprintln!("warning: {e}"),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    worker.abandon_all();
                    break;
                }
            }
        }
        Ok::<_, Box<dyn Error>>(())
    })
}
