//! Document persistence.
//!
//! The store has no business logic: it loads a whole [`Document`] and
//! writes a whole [`Document`]. The tracker decides when.

use std::fs;
use std::path::{Path, PathBuf};

use super::data_dir;
use super::document::Document;
use crate::error::StoreError;

/// Where the tracker's document lives.
pub trait DocumentStore {
    /// Load the document. A store with nothing saved yet yields an empty
    /// document.
    fn load(&self) -> Result<Document, StoreError>;

    /// Replace the stored document.
    fn save(&mut self, doc: &Document) -> Result<(), StoreError>;
}

/// JSON file on disk, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub const FILE_NAME: &'static str = "pomosync.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data_dir>/pomosync.json`.
    pub fn open_default() -> Result<Self, StoreError> {
        let dir = data_dir().map_err(|source| StoreError::Read {
            path: PathBuf::from("."),
            source,
        })?;
        Ok(Self::new(dir.join(Self::FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| Self::FILE_NAME.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self) -> Result<Document, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no document yet, starting empty");
                return Ok(Document::default());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&mut self, doc: &Document) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(doc)?;
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        // Readers only ever see the old file or the complete new one.
        let tmp = self.temp_path();
        fs::write(&tmp, content).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        tracing::debug!(
            path = %self.path.display(),
            projects = doc.projects.len(),
            sessions = doc.sessions.len(),
            "document saved"
        );
        Ok(())
    }
}

/// In-memory store for headless use and tests. Can be told to reject
/// writes to exercise persistence failures.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    saved: Option<Document>,
    fail_writes: bool,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document.
    pub fn with_document(doc: Document) -> Self {
        Self {
            saved: Some(doc),
            ..Self::default()
        }
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Last successfully saved document.
    pub fn saved(&self) -> Option<&Document> {
        self.saved.as_ref()
    }

    /// Number of successful saves.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self) -> Result<Document, StoreError> {
        Ok(self.saved.clone().unwrap_or_default())
    }

    fn save(&mut self, doc: &Document) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        self.saved = Some(doc.clone());
        self.writes += 1;
        Ok(())
    }
}
