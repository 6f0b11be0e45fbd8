//! Session log commands for CLI.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use clap::{Subcommand, ValueEnum};
use pomosync_core::export::write_csv;
use pomosync_core::timer::format_clock;
use pomosync_core::{Config, DateRange, Phase, SessionFilter, SessionOutcome, TaskRef};
use serde_json::json;

use super::{find_project, find_task, open_tracker, CmdResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RangeArg {
    Today,
    Yesterday,
    /// Today and the six days before
    #[value(alias = "last-7-days")]
    Week,
    All,
}

impl RangeArg {
    pub fn date_range(self) -> DateRange {
        let now = Local::now();
        match self {
            RangeArg::Today => DateRange::today(now),
            RangeArg::Yesterday => DateRange::yesterday(now),
            RangeArg::Week => DateRange::last_7_days(now),
            RangeArg::All => DateRange::all(),
        }
    }
}

#[derive(Subcommand)]
pub enum SessionAction {
    /// List recorded sessions, oldest first
    List {
        #[arg(long, value_enum, default_value_t = RangeArg::All)]
        range: RangeArg,
        /// Only sessions of this project (id or name)
        #[arg(long)]
        project: Option<String>,
        /// Only sessions of this task (id or prefix)
        #[arg(long)]
        task: Option<String>,
    },
    /// Record a session that ended just now
    Record {
        /// Phase: work, short_break or long_break
        #[arg(long, default_value = "work")]
        phase: Phase,
        /// Length in minutes
        #[arg(long)]
        minutes: u64,
        /// Task id or prefix
        #[arg(long)]
        task: Option<String>,
        /// Record the phase as abandoned
        #[arg(long)]
        abandoned: bool,
    },
    /// Write sessions as CSV
    Export {
        #[arg(long, value_enum, default_value_t = RangeArg::All)]
        range: RangeArg,
        /// Output file; stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

pub fn run(action: SessionAction) -> CmdResult {
    let config = Config::load()?;
    let mut tracker = open_tracker(&config)?;

    match action {
        SessionAction::List {
            range,
            project,
            task,
        } => {
            let mut filter = SessionFilter::default().within(range.date_range());
            if let Some(key) = project {
                filter = filter.project(find_project(&tracker, &key)?.id);
            }
            if let Some(key) = task {
                filter = filter.task(find_task(&tracker, &key)?.1.id);
            }
            let sessions: Vec<_> = tracker
                .list_sessions(filter)
                .map(|s| {
                    let task_state = match tracker.resolve_task(s) {
                        TaskRef::Live { .. } => "live",
                        TaskRef::Deleted { .. } => "deleted",
                        TaskRef::Unassigned => "unassigned",
                    };
                    json!({
                        "id": s.id,
                        "started_at": s.started_at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
                        "phase": s.phase,
                        "duration": format_clock(s.duration_secs.saturating_mul(1000)),
                        "outcome": s.outcome,
                        "project": s.project_name,
                        "task": s.task_name,
                        "task_state": task_state,
                        "synced": tracker.is_session_synced(s.id),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        SessionAction::Record {
            phase,
            minutes,
            task,
            abandoned,
        } => {
            if minutes == 0 {
                return Err("--minutes must be at least 1".into());
            }
            let secs = minutes
                .checked_mul(60)
                .ok_or("--minutes is out of range")?;
            let task_id = task
                .map(|key| find_task(&tracker, &key).map(|(_, t)| t.id))
                .transpose()?;
            let outcome = if abandoned {
                SessionOutcome::Abandoned
            } else {
                SessionOutcome::Completed
            };
            let id = tracker.record_session(
                task_id,
                phase,
                Duration::from_secs(secs),
                outcome,
            )?;
            println!("Session recorded: {id}");
        }
        SessionAction::Export { range, output } => {
            let sessions = tracker.list_sessions(SessionFilter::default().within(range.date_range()));
            let rows = match &output {
                Some(path) => write_csv(BufWriter::new(File::create(path)?), sessions)?,
                None => write_csv(io::stdout().lock(), sessions)?,
            };
            if let Some(path) = output {
                eprintln!("{rows} session(s) written to {}", path.display());
            }
        }
    }
    Ok(())
}
