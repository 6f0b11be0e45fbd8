//! Synchronisation with an external workspace service.
//!
//! [`SyncAdapter`] is the seam; [`NotionClient`] is the one implementation.
//! Adapters work on snapshots taken from the tracker and return reports
//! that the caller applies afterwards, usually via [`SyncWorker`].

mod adapter;
mod mapping;
mod notion;
mod worker;

pub use adapter::{RemoteTask, SessionPush, SyncAdapter, SyncFailure, SyncReport, TaskPush};
pub use mapping::{database_title, RemoteDatabase};
pub use notion::NotionClient;
pub use worker::{Applied, SyncOutcome, SyncRequest, SyncResult, SyncWorker, Ticket};
