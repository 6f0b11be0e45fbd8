//! Translation between local records and Notion page properties.

use chrono::TimeZone;
use serde_json::{json, Map, Value};

use super::adapter::{RemoteTask, SessionPush, TaskPush};

const UNTITLED_DATABASE: &str = "Untitled Database";

/// A database the integration can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDatabase {
    pub id: String,
    pub title: String,
}

impl RemoteDatabase {
    pub fn from_value(db: &Value) -> Option<Self> {
        Some(Self {
            id: db.get("id")?.as_str()?.to_string(),
            title: database_title(db),
        })
    }
}

/// First title fragment of a database object.
pub fn database_title(db: &Value) -> String {
    db.pointer("/title/0/plain_text")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED_DATABASE)
        .to_string()
}

fn text(content: &str) -> Value {
    json!([{ "text": { "content": content } }])
}

/// Properties for a task page: `Name` title, project as the single `Tags`
/// entry.
pub fn task_properties(task: &TaskPush) -> Value {
    let mut props = Map::new();
    props.insert("Name".into(), json!({ "title": text(&task.name) }));
    if !task.project_name.is_empty() {
        props.insert(
            "Tags".into(),
            json!({ "multi_select": [{ "name": task.project_name }] }),
        );
    }
    Value::Object(props)
}

/// Properties for a session log page. Date and clock times are rendered
/// in `tz`.
pub fn session_properties<Tz: TimeZone>(session: &SessionPush, tz: &Tz) -> Value
where
    Tz::Offset: std::fmt::Display,
{
    let start = session.started_at.with_timezone(tz);
    let end = session.ended_at.with_timezone(tz);
    let mut props = Map::new();
    props.insert(
        "Name".into(),
        json!({ "title": text(&format!("Session: {}", session.task_name)) }),
    );
    props.insert(
        "Date".into(),
        json!({ "date": { "start": start.format("%Y-%m-%d").to_string() } }),
    );
    if let Some(project) = session.project_name.as_deref().filter(|p| !p.is_empty()) {
        props.insert("Project".into(), json!({ "select": { "name": project } }));
    }
    props.insert("Task".into(), json!({ "rich_text": text(&session.task_name) }));
    props.insert(
        "Start Time".into(),
        json!({ "rich_text": text(&start.format("%H:%M").to_string()) }),
    );
    props.insert(
        "End Time".into(),
        json!({ "rich_text": text(&end.format("%H:%M").to_string()) }),
    );
    props.insert(
        "Duration".into(),
        json!({ "rich_text": text(&format!("{} min", session.duration_minutes())) }),
    );
    Value::Object(props)
}

/// Read a task out of a database query result page.
///
/// Pages without a usable title are `None`.
pub fn remote_task_from_page(page: &Value) -> Option<RemoteTask> {
    let remote_id = page.get("id")?.as_str()?.to_string();
    let props = page.get("properties")?;

    let name = ["Name", "name", "Title"]
        .iter()
        .filter_map(|key| props.get(*key))
        .find_map(|prop| prop.pointer("/title/0/plain_text").and_then(Value::as_str))
        .map(str::trim)
        .filter(|n| !n.is_empty())?
        .to_string();

    let project_name = ["Tags", "Project"]
        .iter()
        .filter_map(|key| props.get(*key))
        .find_map(|prop| prop.pointer("/multi_select/0/name").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    let completed = ["Done", "Completed"]
        .iter()
        .filter_map(|key| props.get(*key))
        .find_map(|prop| prop.get("checkbox").and_then(Value::as_bool))
        .unwrap_or(false);

    Some(RemoteTask {
        remote_id,
        name,
        project_name,
        completed,
    })
}
