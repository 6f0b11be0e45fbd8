//! # pomosync Core Library
//!
//! Core business logic for the pomosync Pomodoro timer and task tracker.
//! Every operation is available headless; the `pomosync` CLI is a thin
//! presentation layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: a tick-driven state machine; the caller supplies the
//!   elapsed time on every `tick()`
//! - **Tracker**: the project/task hierarchy and the append-only session log,
//!   persisted as one JSON document
//! - **Storage**: document store, TOML app configuration, JSON sync settings
//! - **Sync**: the Notion adapter and a background worker that hands results
//!   back over a single-consumer queue
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Pomodoro phase state machine
//! - [`Tracker`]: projects, tasks and sessions
//! - [`JsonFileStore`]: on-disk document persistence
//! - [`Config`]: application configuration management
//! - [`SyncAdapter`]: seam for the external workspace service

pub mod error;
pub mod events;
pub mod export;
pub mod storage;
pub mod sync;
pub mod timer;
pub mod tracker;

pub use error::{ConfigError, CoreError, StoreError, SyncError, TrackerError};
pub use events::Event;
pub use storage::{Config, Document, DocumentStore, JsonFileStore, MemoryStore, SyncConfig};
pub use sync::{NotionClient, SyncAdapter, SyncReport, SyncWorker};
pub use timer::{Phase, PhaseDurations, TimerEngine, TimerState};
pub use tracker::{
    DateRange, Project, ProjectId, Session, SessionFilter, SessionId, SessionOutcome, Task,
    TaskId, TaskRef, Tracker,
};
