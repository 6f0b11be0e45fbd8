//! Notion connection settings, kept apart from `config.toml` because they
//! hold a secret.
//!
//! Stored as JSON at `<data_dir>/notion.json`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Integration token sent as a bearer credential.
    #[serde(default)]
    pub token: Option<String>,
    /// Database tasks are imported from and exported to.
    #[serde(default)]
    pub tasks_database_id: Option<String>,
    /// Database completed sessions are logged to.
    #[serde(default)]
    pub sessions_database_id: Option<String>,
    /// Push new tasks and log finished work sessions without being asked.
    #[serde(default)]
    pub auto_sync: bool,
    /// Upper bound for a single HTTP call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Background pull cadence for `sync watch` and `timer run`; 0 disables.
    #[serde(default)]
    pub poll_interval_secs: u64,
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            token: None,
            tasks_database_id: None,
            sessions_database_id: None,
            auto_sync: false,
            timeout_secs: default_timeout_secs(),
            poll_interval_secs: 0,
        }
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("tasks_database_id", &self.tasks_database_id)
            .field("sessions_database_id", &self.sessions_database_id)
            .field("auto_sync", &self.auto_sync)
            .field("timeout_secs", &self.timeout_secs)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .finish()
    }
}

impl SyncConfig {
    pub const FILE_NAME: &'static str = "notion.json";

    pub fn has_token(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// Token plus at least one destination database.
    pub fn is_configured(&self) -> bool {
        self.has_token()
            && (self.tasks_database_id.is_some() || self.sessions_database_id.is_some())
    }

    /// Forget the token and databases, keeping tuning values.
    pub fn disconnect(&mut self) {
        self.token = None;
        self.tasks_database_id = None;
        self.sessions_database_id = None;
        self.auto_sync = false;
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join(Self::FILE_NAME))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from(Self::FILE_NAME),
                message: e.to_string(),
            })
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path()?)
    }

    /// A missing file is an unconfigured integration, not an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let load_failed = |message: String| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message,
        };
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| load_failed(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(load_failed(e.to_string())),
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = serde_json::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }
}
