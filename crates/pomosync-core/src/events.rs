use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{Phase, TimerState};

/// Every timer state change produces an Event.
/// The presentation layer renders them; the tracker records sessions from
/// `PhaseCompleted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        phase: Phase,
        remaining_ms: u64,
        /// True when continuing a paused phase.
        resumed: bool,
        at: DateTime<Utc>,
    },
    TimerPaused {
        phase: Phase,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        phase: Phase,
        /// Time already spent in a phase that was running or paused.
        abandoned_elapsed_ms: Option<u64>,
        at: DateTime<Utc>,
    },
    PhaseCompleted {
        phase: Phase,
        duration_ms: u64,
        completed_work_count: u32,
        at: DateTime<Utc>,
    },
    PhaseAdvanced {
        from: Phase,
        to: Phase,
        duration_ms: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        phase: Phase,
        remaining_ms: u64,
        total_ms: u64,
        completed_work_count: u32,
        awaiting_advance: bool,
        at: DateTime<Utc>,
    },
}
