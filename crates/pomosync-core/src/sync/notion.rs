//! Notion REST client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use url::Url;

use super::adapter::{RemoteTask, SessionPush, SyncAdapter, SyncFailure, SyncReport, TaskPush};
use super::mapping::{remote_task_from_page, session_properties, task_properties, RemoteDatabase};
use crate::error::SyncError;
use crate::storage::SyncConfig;
use crate::tracker::{SessionId, TaskId};

const NOTION_API: &str = "https://api.notion.com/v1/";
const NOTION_VERSION: &str = "2022-06-28";
const PAGE_SIZE: u32 = 100;

pub struct NotionClient {
    http: Client,
    base: Url,
    token: String,
    tasks_database_id: Option<String>,
    sessions_database_id: Option<String>,
}

impl std::fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionClient")
            .field("base", &self.base.as_str())
            .field("tasks_database_id", &self.tasks_database_id)
            .field("sessions_database_id", &self.sessions_database_id)
            .finish_non_exhaustive()
    }
}

impl NotionClient {
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self, SyncError> {
        let http = Client::builder().timeout(timeout).build()?;
        let base = Url::parse(NOTION_API).map_err(|e| SyncError::NotConfigured(e.to_string()))?;
        Ok(Self {
            http,
            base,
            token: token.into(),
            tasks_database_id: None,
            sessions_database_id: None,
        })
    }

    /// Build a client from stored settings. Fails without a token.
    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        let token = config
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::NotConfigured("no integration token set".into()))?;
        Ok(Self::new(token, Duration::from_secs(config.timeout_secs.max(1)))?
            .with_databases(
                config.tasks_database_id.clone(),
                config.sessions_database_id.clone(),
            ))
    }

    /// Point the client at another API root (a local mock in tests).
    pub fn with_base_url(mut self, base: &str) -> Result<Self, SyncError> {
        let mut base = base.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        self.base = Url::parse(&base).map_err(|e| SyncError::NotConfigured(e.to_string()))?;
        Ok(self)
    }

    pub fn with_databases(mut self, tasks: Option<String>, sessions: Option<String>) -> Self {
        self.tasks_database_id = tasks;
        self.sessions_database_id = sessions;
        self
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, SyncError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| SyncError::InvalidResponse(format!("bad endpoint {path}: {e}")))?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, SyncError> {
        let mut req = self.request(method, path)?;
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json::<Value>().await?);
        }
        Err(error_for_response(resp).await)
    }

    fn database<'a>(&self, id: &'a Option<String>, what: &str) -> Result<&'a str, SyncError> {
        id.as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SyncError::NotConfigured(format!("no {what} database selected")))
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Check the token. Returns the name Notion reports for it.
    pub async fn test_connection(&self) -> Result<String, SyncError> {
        let me = self.send(Method::GET, "users/me", None).await?;
        Ok(me
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string())
    }

    /// Databases shared with the integration.
    ///
    /// Older workspaces reject the database search filter; the unfiltered
    /// search is used as a fallback.
    pub async fn list_databases(&self) -> Result<Vec<RemoteDatabase>, SyncError> {
        let filtered = json!({ "filter": { "value": "database", "property": "object" } });
        let results = match self.send(Method::POST, "search", Some(&filtered)).await {
            Ok(body) => body,
            Err(e) if !e.aborts_batch() => {
                tracing::debug!(error = %e, "filtered search failed, retrying unfiltered");
                self.send(Method::POST, "search", Some(&json!({}))).await?
            }
            Err(e) => return Err(e),
        };
        Ok(results
            .get("results")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter(|r| r.get("object").and_then(Value::as_str) == Some("database"))
            .filter_map(RemoteDatabase::from_value)
            .collect())
    }

    /// Every page of a database, following pagination cursors.
    pub async fn query_database(&self, database_id: &str) -> Result<Vec<Value>, SyncError> {
        let path = format!("databases/{database_id}/query");
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(c) = &cursor {
                body["start_cursor"] = json!(c);
            }
            let resp = self.send(Method::POST, &path, Some(&body)).await?;
            let results = resp
                .get("results")
                .and_then(Value::as_array)
                .ok_or_else(|| SyncError::InvalidResponse("query result has no results".into()))?;
            pages.extend(results.iter().cloned());

            let has_more = resp.get("has_more").and_then(Value::as_bool).unwrap_or(false);
            cursor = resp
                .get("next_cursor")
                .and_then(Value::as_str)
                .map(str::to_string);
            if !has_more || cursor.is_none() {
                break;
            }
        }
        Ok(pages)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Create a page in `database_id`. Returns the new page id.
    pub async fn create_page(
        &self,
        database_id: &str,
        properties: Value,
    ) -> Result<String, SyncError> {
        let body = json!({
            "parent": { "database_id": database_id },
            "properties": properties,
        });
        let page = self.send(Method::POST, "pages", Some(&body)).await?;
        page_id(&page)
    }

    pub async fn update_page(&self, page: &str, properties: Value) -> Result<String, SyncError> {
        let body = json!({ "properties": properties });
        let page = self
            .send(Method::PATCH, &format!("pages/{page}"), Some(&body))
            .await?;
        page_id(&page)
    }
}

fn page_id(page: &Value) -> Result<String, SyncError> {
    page.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SyncError::InvalidResponse("page response has no id".into()))
}

async fn error_for_response(resp: Response) -> SyncError {
    let status = resp.status();
    let retry_after = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = resp.text().await.unwrap_or_default();
    classify(status, retry_after, &body)
}

/// Map a non-success status to the error taxonomy.
pub(crate) fn classify(status: StatusCode, retry_after_secs: Option<u64>, body: &str) -> SyncError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => SyncError::RateLimit { retry_after_secs },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => SyncError::Timeout,
        _ => SyncError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Record a per-item failure, or abort the batch if the error means the
/// remaining items would fail the same way.
fn record_failure<Id: std::fmt::Display>(
    report: &mut SyncReport<Id>,
    id: Id,
    error: SyncError,
) -> Result<(), SyncError> {
    if error.aborts_batch() {
        return Err(error);
    }
    tracing::warn!(record = %id, error = %error, "record rejected by notion");
    report.failed.push(SyncFailure { id, error });
    Ok(())
}

#[async_trait]
impl SyncAdapter for NotionClient {
    fn name(&self) -> &'static str {
        "notion"
    }

    async fn push_tasks(&self, tasks: &[TaskPush]) -> Result<SyncReport<TaskId>, SyncError> {
        let database = self.database(&self.tasks_database_id, "tasks")?;
        let mut report = SyncReport::default();
        for task in tasks {
            let props = task_properties(task);
            let result = match &task.remote_id {
                Some(page) => self.update_page(page, props).await,
                None => self.create_page(database, props).await,
            };
            match result {
                Ok(page) => report.pushed.push((task.task_id, page)),
                Err(e) => record_failure(&mut report, task.task_id, e)?,
            }
        }
        tracing::info!(adapter = "notion", %report, "tasks pushed");
        Ok(report)
    }

    async fn pull_tasks(&self) -> Result<Vec<RemoteTask>, SyncError> {
        let database = self.database(&self.tasks_database_id, "tasks")?;
        let pages = self.query_database(database).await?;
        let total = pages.len();
        let tasks: Vec<RemoteTask> = pages.iter().filter_map(remote_task_from_page).collect();
        tracing::info!(
            adapter = "notion",
            pulled = tasks.len(),
            ignored = total - tasks.len(),
            "tasks pulled"
        );
        Ok(tasks)
    }

    async fn push_sessions(
        &self,
        sessions: &[SessionPush],
    ) -> Result<SyncReport<SessionId>, SyncError> {
        let database = self.database(&self.sessions_database_id, "sessions")?;
        let mut report = SyncReport::default();
        for session in sessions {
            let props = session_properties(session, &Local);
            match self.create_page(database, props).await {
                Ok(page) => report.pushed.push((session.session_id, page)),
                Err(e) => record_failure(&mut report, session.session_id, e)?,
            }
        }
        tracing::info!(adapter = "notion", %report, "sessions pushed");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify(StatusCode::UNAUTHORIZED, None, r#"{"message":"API token is invalid."}"#),
            SyncError::Auth(ref m) if m == "API token is invalid."
        ));
        assert!(matches!(
            classify(StatusCode::FORBIDDEN, None, ""),
            SyncError::Auth(_)
        ));
        assert!(matches!(
            classify(StatusCode::TOO_MANY_REQUESTS, Some(7), ""),
            SyncError::RateLimit {
                retry_after_secs: Some(7)
            }
        ));
        assert!(matches!(
            classify(StatusCode::BAD_REQUEST, None, "plain text"),
            SyncError::Api { status: 400, ref message } if message == "plain text"
        ));
    }

    #[test]
    fn from_config_requires_token() {
        let err = NotionClient::from_config(&SyncConfig::default()).unwrap_err();
        assert!(matches!(err, SyncError::NotConfigured(_)));
    }

    #[test]
    fn debug_hides_token() {
        let client = NotionClient::new("secret_xyz", Duration::from_secs(1)).unwrap();
        assert!(!format!("{client:?}").contains("secret_xyz"));
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = NotionClient::new("t", Duration::from_secs(1))
            .unwrap()
            .with_base_url("http://127.0.0.1:9/v1")
            .unwrap();
        assert_eq!(client.base.as_str(), "http://127.0.0.1:9/v1/");
    }
}
