//! Session queries.

use chrono::{DateTime, Days, Local, NaiveDate, TimeZone, Utc};

use super::model::{ProjectId, Session, TaskId};

/// Half-open `[from, to)` range over session start times. Either bound may
/// be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    pub fn all() -> Self {
        Self::default()
    }

    /// Local calendar days `first ..= last`.
    pub fn local_days(first: NaiveDate, last: NaiveDate) -> Self {
        Self {
            from: local_midnight(first),
            to: last.checked_add_days(Days::new(1)).and_then(local_midnight),
        }
    }

    pub fn today(now: DateTime<Local>) -> Self {
        let day = now.date_naive();
        Self::local_days(day, day)
    }

    pub fn yesterday(now: DateTime<Local>) -> Self {
        let day = now.date_naive();
        let prev = day.checked_sub_days(Days::new(1)).unwrap_or(day);
        Self::local_days(prev, prev)
    }

    /// Today and the six days before it.
    pub fn last_7_days(now: DateTime<Local>) -> Self {
        let day = now.date_naive();
        let first = day.checked_sub_days(Days::new(6)).unwrap_or(day);
        Self::local_days(first, day)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at < to)
    }
}

fn local_midnight(day: NaiveDate) -> Option<DateTime<Utc>> {
    let naive = day.and_hms_opt(0, 0, 0)?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Which sessions to list. Empty filter matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub project_id: Option<ProjectId>,
    pub task_id: Option<TaskId>,
    pub date_range: Option<DateRange>,
}

impl SessionFilter {
    pub fn project(mut self, id: ProjectId) -> Self {
        self.project_id = Some(id);
        self
    }

    pub fn task(mut self, id: TaskId) -> Self {
        self.task_id = Some(id);
        self
    }

    pub fn within(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn matches(&self, session: &Session) -> bool {
        if let Some(pid) = self.project_id {
            if session.project_id != Some(pid) {
                return false;
            }
        }
        if let Some(tid) = self.task_id {
            if session.task_id != Some(tid) {
                return false;
            }
        }
        self.date_range
            .map_or(true, |range| range.contains(session.started_at))
    }
}

/// Lazy view over the session log.
///
/// Cloning restarts the iteration from wherever the clone was taken, so the
/// same query can be walked any number of times.
#[derive(Debug, Clone)]
pub struct Sessions<'a> {
    inner: std::slice::Iter<'a, Session>,
    filter: SessionFilter,
}

impl<'a> Sessions<'a> {
    pub(crate) fn new(sessions: &'a [Session], filter: SessionFilter) -> Self {
        Self {
            inner: sessions.iter(),
            filter,
        }
    }
}

impl<'a> Iterator for Sessions<'a> {
    type Item = &'a Session;

    fn next(&mut self) -> Option<Self::Item> {
        let filter = self.filter;
        self.inner.find(|s| filter.matches(s))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.inner.size_hint().1)
    }
}

impl DoubleEndedIterator for Sessions<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let filter = self.filter;
        self.inner.rfind(|s| filter.matches(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn range_is_half_open() {
        let from = Utc::now();
        let to = from + Duration::hours(1);
        let range = DateRange::new(Some(from), Some(to));
        assert!(range.contains(from));
        assert!(range.contains(to - Duration::seconds(1)));
        assert!(!range.contains(to));
        assert!(!range.contains(from - Duration::seconds(1)));
    }

    #[test]
    fn open_range_contains_everything() {
        assert!(DateRange::all().contains(Utc::now()));
    }

    #[test]
    fn presets_cover_whole_local_days() {
        let now = Local::now();
        let today = DateRange::today(now);
        assert!(today.contains(now.with_timezone(&Utc)));

        let week = DateRange::last_7_days(now);
        assert!(week.contains(now.with_timezone(&Utc)));
        assert!(week.contains((now - Duration::days(6)).with_timezone(&Utc)));

        let yesterday = DateRange::yesterday(now);
        assert!(!yesterday.contains(now.with_timezone(&Utc)));
        assert!(yesterday.contains((now - Duration::days(1)).with_timezone(&Utc)));
    }
}
