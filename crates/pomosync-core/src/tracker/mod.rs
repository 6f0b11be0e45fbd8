//! Projects, tasks and the session log.

mod engine;
mod filter;
mod model;

pub use engine::{ImportReport, Tracker, DEFAULT_PROJECT_NAME};
pub use filter::{DateRange, SessionFilter, Sessions};
pub use model::{
    Project, ProjectId, Session, SessionId, SessionOutcome, Task, TaskId, TaskRef,
};
