//! Core error types for pomosync-core.
//!
//! The timer engine has no error states; everything else reports through
//! the enums below. None of them is fatal: a failed operation leaves the
//! in-memory state as it was before the call.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for pomosync-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Tracker (project/task/session) errors
    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    /// Document store errors outside of a tracker operation
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// External service errors
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The kind of entity a lookup failed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Project,
    Task,
    Session,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Project => "project",
            EntityKind::Task => "task",
            EntityKind::Session => "session",
        })
    }
}

/// Errors returned by [`crate::Tracker`] operations.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Referenced id is unknown
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// A project with the same name already exists
    #[error("a project named '{0}' already exists")]
    DuplicateName(String),

    /// Blank project or task name
    #[error("name must not be empty")]
    EmptyName,

    /// Session length does not fit on the calendar
    #[error("session duration of {secs}s is out of range")]
    DurationOutOfRange { secs: u64 },

    /// The document could not be written; the change was rolled back
    #[error("failed to persist changes: {0}")]
    Persistence(#[from] StoreError),
}

impl TrackerError {
    pub(crate) fn not_found(kind: EntityKind, id: impl fmt::Display) -> Self {
        TrackerError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Document store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to read the document file
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the document file
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a valid document
    #[error("Corrupt document at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The document could not be serialized
    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Store refused the write (in-memory store set to fail)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Errors from the external workspace service.
///
/// Reported to the user as a notification; local state is never touched.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Token rejected (HTTP 401/403)
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport failure before a response arrived
    #[error("network error: {0}")]
    Network(String),

    /// HTTP 429
    #[error("rate limited by the service{}", retry_hint(.retry_after_secs))]
    RateLimit { retry_after_secs: Option<u64> },

    /// Call exceeded the configured timeout
    #[error("request timed out")]
    Timeout,

    /// Any other non-success response
    #[error("service returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Missing token or database id
    #[error("sync is not configured: {0}")]
    NotConfigured(String),

    /// Response body did not have the expected shape
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}

impl SyncError {
    /// Whether the rest of a batch is pointless after this error.
    pub fn aborts_batch(&self) -> bool {
        !matches!(self, SyncError::Api { .. } | SyncError::InvalidResponse(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout
        } else if err.is_decode() {
            SyncError::InvalidResponse(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
