//! CSV export of the session log.
//!
//! Columns: `date,project,task,phase,duration`. Dates are local
//! `YYYY-MM-DD HH:MM` start times, durations `MM:SS`.

use std::io::{self, Write};

use chrono::{Local, TimeZone};

use crate::timer::format_clock;
use crate::tracker::Session;

pub const CSV_HEADER: &str = "date,project,task,phase,duration";

/// Write `sessions` as CSV in the local time zone. Returns the number of
/// data rows written.
pub fn write_csv<'a, W: Write>(
    out: W,
    sessions: impl IntoIterator<Item = &'a Session>,
) -> io::Result<usize> {
    write_csv_in(out, sessions, &Local)
}

/// Same as [`write_csv`] with an explicit time zone.
pub fn write_csv_in<'a, W: Write, Tz: TimeZone>(
    mut out: W,
    sessions: impl IntoIterator<Item = &'a Session>,
    tz: &Tz,
) -> io::Result<usize>
where
    Tz::Offset: std::fmt::Display,
{
    writeln!(out, "{CSV_HEADER}")?;
    let mut rows = 0;
    for session in sessions {
        let date = session
            .started_at
            .with_timezone(tz)
            .format("%Y-%m-%d %H:%M")
            .to_string();
        let fields = [
            date,
            quote(session.project_name.as_deref().unwrap_or_default()),
            quote(session.task_name.as_deref().unwrap_or_default()),
            quote(session.phase.label()),
            format_clock(session.duration_secs.saturating_mul(1000)),
        ];
        writeln!(out, "{}", fields.join(","))?;
        rows += 1;
    }
    out.flush()?;
    Ok(rows)
}

/// RFC 4180 field quoting.
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::Phase;
    use crate::tracker::{SessionId, SessionOutcome};
    use chrono::Utc;

    fn session(task: Option<&str>, project: Option<&str>, phase: Phase, secs: u64) -> Session {
        Session {
            id: SessionId::new(),
            task_id: None,
            task_name: task.map(str::to_string),
            project_id: None,
            project_name: project.map(str::to_string),
            phase,
            started_at: Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap(),
            duration_secs: secs,
            outcome: SessionOutcome::Completed,
        }
    }

    fn render(sessions: &[Session]) -> String {
        let mut buf = Vec::new();
        write_csv_in(&mut buf, sessions, &Utc).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn one_row_per_session() {
        let rows = [
            session(Some("Write intro"), Some("Thesis"), Phase::Work, 1500),
            session(None, None, Phase::ShortBreak, 300),
        ];
        assert_eq!(
            render(&rows),
            "date,project,task,phase,duration\n\
             2024-03-09 14:05,Thesis,Write intro,Work,25:00\n\
             2024-03-09 14:05,,,Short Break,05:00\n"
        );
    }

    #[test]
    fn awkward_names_are_quoted() {
        let rows = [session(
            Some("Read \"Dune\", part 2"),
            Some("Books"),
            Phase::Work,
            61,
        )];
        let out = render(&rows);
        assert!(out.contains(",Books,\"Read \"\"Dune\"\", part 2\",Work,01:01\n"));
    }

    #[test]
    fn empty_log_writes_header_only() {
        let mut buf = Vec::new();
        assert_eq!(write_csv_in(&mut buf, std::iter::empty(), &Utc).unwrap(), 0);
        assert_eq!(buf, b"date,project,task,phase,duration\n");
    }
}
