//! The persisted document: every project, task and session in one value.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::timer::Phase;
use crate::tracker::{Project, Session, SessionId};

pub const DOCUMENT_VERSION: u32 = 1;

fn default_version() -> u32 {
    DOCUMENT_VERSION
}

fn default_phase() -> Phase {
    Phase::Work
}

/// Timer state that survives a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    #[serde(default)]
    pub completed_work_count: u32,
    /// Phase after the last advance, so a pending long break survives.
    #[serde(default = "default_phase")]
    pub next_phase: Phase,
}

impl Default for TimerSnapshot {
    fn default() -> Self {
        Self {
            completed_work_count: 0,
            next_phase: default_phase(),
        }
    }
}

/// Root of the on-disk store.
///
/// Read fully at startup and rewritten fully on every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub projects: Vec<Project>,
    /// Ascending by `started_at`.
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub timer: TimerSnapshot,
    /// Sessions already logged to the external workspace.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub synced_sessions: BTreeSet<SessionId>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            projects: Vec::new(),
            sessions: Vec::new(),
            timer: TimerSnapshot::default(),
            synced_sessions: BTreeSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_parses_as_default() {
        let doc: Document = serde_json::from_str("{}").unwrap();
        assert_eq!(doc, Document::default());
    }

    #[test]
    fn unsynced_documents_omit_the_synced_list() {
        let json = serde_json::to_value(Document::default()).unwrap();
        assert!(json.get("synced_sessions").is_none());
        assert_eq!(json["version"], 1);
    }

    #[test]
    fn timer_without_phase_starts_at_work() {
        let doc: Document =
            serde_json::from_str(r#"{"timer":{"completed_work_count":2}}"#).unwrap();
        assert_eq!(doc.timer.completed_work_count, 2);
        assert_eq!(doc.timer.next_phase, Phase::Work);
    }
}
