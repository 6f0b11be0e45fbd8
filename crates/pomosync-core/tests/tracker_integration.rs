//! Integration tests for the tracker over the on-disk store.

use std::time::Duration;

use chrono::{Local, TimeZone, Utc};
use pomosync_core::export::write_csv_in;
use pomosync_core::tracker::ImportReport;
use pomosync_core::{
    DateRange, DocumentStore, JsonFileStore, MemoryStore, Phase, SessionFilter, SessionOutcome,
    TaskRef, Tracker, TrackerError,
};
use tempfile::TempDir;

const POMODORO: Duration = Duration::from_secs(25 * 60);

#[test]
fn state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pomosync.json");

    let mut tracker = Tracker::open(JsonFileStore::new(&path)).unwrap();
    let project = tracker.add_project("Thesis").unwrap();
    let task = tracker.add_task(project, "Write intro").unwrap();
    tracker
        .record_session(Some(task), Phase::Work, POMODORO, SessionOutcome::Completed)
        .unwrap();
    tracker
        .record_session(None, Phase::ShortBreak, Duration::from_secs(300), SessionOutcome::Completed)
        .unwrap();
    tracker.set_timer_progress(1, Phase::ShortBreak).unwrap();
    let before = tracker.document().clone();
    drop(tracker);

    let reopened = Tracker::open(JsonFileStore::new(&path)).unwrap();
    assert_eq!(reopened.document(), &before);
    assert_eq!(reopened.completed_work_count(), 1);
    assert_eq!(reopened.next_phase(), Phase::ShortBreak);
    assert_eq!(reopened.list_sessions(SessionFilter::default().task(task)).count(), 1);
}

#[test]
fn deleted_project_sessions_stay_readable_after_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pomosync.json");

    let mut tracker = Tracker::open(JsonFileStore::new(&path)).unwrap();
    let project = tracker.add_project("Thesis").unwrap();
    let task = tracker.add_task(project, "Write intro").unwrap();
    tracker
        .record_session(Some(task), Phase::Work, POMODORO, SessionOutcome::Completed)
        .unwrap();
    tracker.delete_project(project).unwrap();
    drop(tracker);

    let tracker = Tracker::open(JsonFileStore::new(&path)).unwrap();
    assert!(tracker.projects().is_empty());
    let sessions: Vec<_> = tracker.list_sessions(SessionFilter::default()).collect();
    assert_eq!(sessions.len(), 1);
    assert!(tracker.resolve_task(sessions[0]).is_deleted());
    assert_eq!(
        tracker.resolve_task(sessions[0]),
        TaskRef::Deleted {
            name: Some("Write intro")
        }
    );

    // Filtering by the deleted project still finds its history.
    let by_project = tracker.list_sessions(SessionFilter::default().project(project));
    assert_eq!(by_project.count(), 1);

    let mut csv = Vec::new();
    write_csv_in(&mut csv, tracker.sessions(), &Utc).unwrap();
    let csv = String::from_utf8(csv).unwrap();
    assert!(csv.contains(",Thesis,Write intro,Work,25:00"));
}

#[test]
fn rejected_write_keeps_memory_and_disk_in_step() {
    let mut store = MemoryStore::new();
    store.set_fail_writes(true);
    let mut tracker = Tracker::open(store).unwrap();

    let err = tracker.add_project("Thesis").unwrap_err();
    assert!(matches!(err, TrackerError::Persistence(_)));
    assert!(tracker.projects().is_empty());
    assert!(tracker.store().saved().is_none());
    assert!(tracker.store().load().unwrap().projects.is_empty());
}

#[test]
fn date_range_presets_select_local_days() {
    let mut tracker = Tracker::open(MemoryStore::new()).unwrap();
    let now = Local.with_ymd_and_hms(2024, 6, 12, 15, 0, 0).unwrap();
    for days_ago in [0i64, 1, 3, 10] {
        let ended = (now - chrono::Duration::days(days_ago)).with_timezone(&Utc);
        tracker
            .record_session_at(None, Phase::Work, POMODORO, SessionOutcome::Completed, ended)
            .unwrap();
    }

    let count = |range| {
        tracker
            .list_sessions(SessionFilter::default().within(range))
            .count()
    };
    assert_eq!(count(DateRange::today(now)), 1);
    assert_eq!(count(DateRange::yesterday(now)), 1);
    assert_eq!(count(DateRange::last_7_days(now)), 3);
    assert_eq!(count(DateRange::all()), 4);
}

#[test]
fn import_then_reopen_keeps_remote_links() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pomosync.json");
    let mut tracker = Tracker::open(JsonFileStore::new(&path)).unwrap();

    let remote = vec![pomosync_core::sync::RemoteTask {
        remote_id: "page-1".into(),
        name: "Read paper".into(),
        project_name: "Research".into(),
        completed: false,
    }];
    let report = tracker.import_remote_tasks(&remote).unwrap();
    assert_eq!(
        report,
        ImportReport {
            projects_created: 1,
            tasks_imported: 1,
            ..ImportReport::default()
        }
    );
    drop(tracker);

    let tracker = Tracker::open(JsonFileStore::new(&path)).unwrap();
    let project = tracker.project_by_name("Research").unwrap();
    assert_eq!(project.tasks[0].remote_id.as_deref(), Some("page-1"));
}

#[test]
fn idle_import_does_not_clobber_another_writer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pomosync.json");
    let mut long_lived = Tracker::open(JsonFileStore::new(&path)).unwrap();

    let mut other = Tracker::open(JsonFileStore::new(&path)).unwrap();
    other.add_project("Added elsewhere").unwrap();
    drop(other);

    long_lived.import_remote_tasks(&[]).unwrap();
    let on_disk = Tracker::open(JsonFileStore::new(&path)).unwrap();
    assert!(on_disk.project_by_name("Added elsewhere").is_some());

    long_lived.reload().unwrap();
    assert!(long_lived.project_by_name("Added elsewhere").is_some());
    long_lived.add_project("Second").unwrap();

    let on_disk = Tracker::open(JsonFileStore::new(&path)).unwrap();
    assert_eq!(on_disk.projects().len(), 2);
}
