//! Timer engine implementation.
//!
//! The timer engine is a tick-driven state machine. It does not use
//! internal threads or read the clock for its countdown - the caller
//! passes the elapsed time into `tick()`.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//! Running -(remaining hits zero)-> Idle (phase pending advance)
//! any -(reset)-> Idle
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(PhaseDurations::default());
//! engine.start();
//! // In a loop:
//! if let Some(Event::PhaseCompleted { .. }) = engine.tick(elapsed) {
//!     engine.advance_phase();
//! }
//! ```

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::phase::{Phase, PhaseDurations};
use crate::events::Event;

/// Work phases per cycle before the break is a long one.
pub const DEFAULT_LONG_BREAK_INTERVAL: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

/// Core timer engine.
///
/// All operations are total: calls that make no sense in the current state
/// return `None` instead of failing.
#[derive(Debug, Clone)]
pub struct TimerEngine {
    durations: PhaseDurations,
    long_break_interval: u32,
    phase: Phase,
    state: TimerState,
    /// Remaining time in milliseconds for the current phase.
    remaining_ms: u64,
    /// Work completions in the current cycle. Reset after a long break.
    completed_work_count: u32,
    /// Phase that reached zero and has not been advanced past yet.
    pending_advance: Option<Phase>,
}

impl TimerEngine {
    /// Create an idle engine at the start of a Work phase.
    pub fn new(durations: PhaseDurations) -> Self {
        Self {
            durations,
            long_break_interval: DEFAULT_LONG_BREAK_INTERVAL,
            phase: Phase::Work,
            state: TimerState::Idle,
            remaining_ms: durations.ms_for(Phase::Work),
            completed_work_count: 0,
            pending_advance: None,
        }
    }

    /// Number of work phases before a long break. Values below 1 are
    /// treated as 1 (every break is long).
    pub fn with_long_break_interval(mut self, interval: u32) -> Self {
        self.long_break_interval = interval.max(1);
        self
    }

    /// Restore a persisted cycle position: the completed-work-count and
    /// the phase the next start runs.
    ///
    /// A full count is only meaningful ahead of the long break it earned;
    /// with any other phase it wraps so the cycle restarts.
    pub fn with_progress(mut self, count: u32, next_phase: Phase) -> Self {
        self.completed_work_count = if next_phase == Phase::LongBreak {
            count
        } else {
            count % self.long_break_interval
        };
        self.phase = next_phase;
        self.remaining_ms = self.total_ms();
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn completed_work_count(&self) -> u32 {
        self.completed_work_count
    }

    pub fn long_break_interval(&self) -> u32 {
        self.long_break_interval
    }

    pub fn durations(&self) -> &PhaseDurations {
        &self.durations
    }

    /// True after a phase completed and before `advance_phase()`.
    pub fn awaiting_advance(&self) -> bool {
        self.pending_advance.is_some()
    }

    pub fn total_ms(&self) -> u64 {
        self.durations.ms_for(self.phase)
    }

    /// 0.0 .. 1.0 progress within the current phase.
    pub fn phase_progress(&self) -> f64 {
        let total = self.total_ms();
        if total == 0 {
            return 0.0;
        }
        1.0 - (self.remaining_ms.min(total) as f64 / total as f64)
    }

    /// Time spent so far in a phase that is running or paused.
    pub fn elapsed_in_phase_ms(&self) -> Option<u64> {
        match self.state {
            TimerState::Running | TimerState::Paused => {
                Some(self.total_ms().saturating_sub(self.remaining_ms))
            }
            TimerState::Idle => None,
        }
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            state: self.state,
            phase: self.phase,
            remaining_ms: self.remaining_ms,
            total_ms: self.total_ms(),
            completed_work_count: self.completed_work_count,
            awaiting_advance: self.awaiting_advance(),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        match self.state {
            TimerState::Running => None,
            TimerState::Paused => {
                self.state = TimerState::Running;
                Some(Event::TimerStarted {
                    phase: self.phase,
                    remaining_ms: self.remaining_ms,
                    resumed: true,
                    at: Utc::now(),
                })
            }
            TimerState::Idle => {
                if self.pending_advance.is_some() {
                    // Caller skipped advance_phase(); do it for them.
                    self.advance_phase();
                }
                self.remaining_ms = self.total_ms();
                self.state = TimerState::Running;
                Some(Event::TimerStarted {
                    phase: self.phase,
                    remaining_ms: self.remaining_ms,
                    resumed: false,
                    at: Utc::now(),
                })
            }
        }
    }

    pub fn pause(&mut self) -> Option<Event> {
        match self.state {
            TimerState::Running => {
                self.state = TimerState::Paused;
                Some(Event::TimerPaused {
                    phase: self.phase,
                    remaining_ms: self.remaining_ms,
                    at: Utc::now(),
                })
            }
            _ => None,
        }
    }

    /// Back to Idle with no remaining time. The phase and the
    /// completed-work-count are kept.
    pub fn reset(&mut self) -> Option<Event> {
        let abandoned_elapsed_ms = self.elapsed_in_phase_ms();
        self.state = TimerState::Idle;
        self.remaining_ms = 0;
        self.pending_advance = None;
        Some(Event::TimerReset {
            phase: self.phase,
            abandoned_elapsed_ms,
            at: Utc::now(),
        })
    }

    /// Call periodically with the time since the previous call.
    ///
    /// Returns `Some(Event::PhaseCompleted)` exactly once, on the tick that
    /// exhausts the phase. Ticks outside `Running` are ignored so that
    /// jittery UI callbacks are harmless.
    pub fn tick(&mut self, elapsed: Duration) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.remaining_ms = self.remaining_ms.saturating_sub(elapsed_ms);
        if self.remaining_ms > 0 {
            return None;
        }

        let phase = self.phase;
        if phase == Phase::Work {
            self.completed_work_count = self.completed_work_count.saturating_add(1);
        }
        self.state = TimerState::Idle;
        self.pending_advance = Some(phase);
        Some(Event::PhaseCompleted {
            phase,
            duration_ms: self.total_ms(),
            completed_work_count: self.completed_work_count,
            at: Utc::now(),
        })
    }

    /// Move to the phase that follows a completed one.
    ///
    /// After Work: a long break when the completed-work-count is a multiple
    /// of the interval, otherwise a short break. After any break: Work. The
    /// count goes back to zero once a long break has been taken.
    pub fn advance_phase(&mut self) -> Option<Event> {
        let completed = self.pending_advance.take()?;
        let next = match completed {
            Phase::Work => {
                if self.completed_work_count > 0
                    && self.completed_work_count % self.long_break_interval == 0
                {
                    Phase::LongBreak
                } else {
                    Phase::ShortBreak
                }
            }
            Phase::LongBreak => {
                self.completed_work_count = 0;
                Phase::Work
            }
            Phase::ShortBreak => Phase::Work,
        };
        self.phase = next;
        self.state = TimerState::Idle;
        self.remaining_ms = self.total_ms();
        Some(Event::PhaseAdvanced {
            from: completed,
            to: next,
            duration_ms: self.remaining_ms,
            at: Utc::now(),
        })
    }

    /// Swap in new phase lengths. A running or paused phase keeps its
    /// remaining time; the new lengths apply from the next fresh start.
    pub fn set_durations(&mut self, durations: PhaseDurations) {
        self.durations = durations;
        if self.state == TimerState::Idle && self.pending_advance.is_none() {
            self.remaining_ms = self.total_ms();
        }
    }
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new(PhaseDurations::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Duration = Duration::from_secs(60);

    fn complete_current(engine: &mut TimerEngine) -> Event {
        engine.start();
        engine
            .tick(Duration::from_millis(engine.total_ms()))
            .expect("phase should complete")
    }

    #[test]
    fn start_pause_resume() {
        let mut engine = TimerEngine::default();
        assert_eq!(engine.state(), TimerState::Idle);

        assert!(engine.start().is_some());
        assert_eq!(engine.state(), TimerState::Running);
        assert!(engine.start().is_none());

        engine.tick(MIN);
        assert!(engine.pause().is_some());
        assert_eq!(engine.state(), TimerState::Paused);
        assert!(engine.pause().is_none());

        match engine.start() {
            Some(Event::TimerStarted {
                resumed,
                remaining_ms,
                ..
            }) => {
                assert!(resumed);
                assert_eq!(remaining_ms, 24 * 60 * 1000);
            }
            other => panic!("expected TimerStarted, got {other:?}"),
        }
    }

    #[test]
    fn default_work_completes_after_1500_seconds() {
        let mut engine = TimerEngine::default();
        engine.start();
        assert!(engine.tick(Duration::from_secs(1499)).is_none());
        match engine.tick(Duration::from_secs(1)) {
            Some(Event::PhaseCompleted {
                phase,
                completed_work_count,
                ..
            }) => {
                assert_eq!(phase, Phase::Work);
                assert_eq!(completed_work_count, 1);
            }
            other => panic!("expected PhaseCompleted, got {other:?}"),
        }
        assert_eq!(engine.state(), TimerState::Idle);
        assert_eq!(engine.completed_work_count(), 1);

        engine.advance_phase();
        assert_eq!(engine.phase(), Phase::ShortBreak);
        assert_eq!(engine.remaining_ms(), 5 * 60 * 1000);
    }

    #[test]
    fn ticks_outside_running_are_ignored() {
        let mut engine = TimerEngine::default();
        assert!(engine.tick(Duration::from_secs(10_000)).is_none());
        assert_eq!(engine.remaining_ms(), 25 * 60 * 1000);

        engine.start();
        engine.pause();
        assert!(engine.tick(Duration::from_secs(10_000)).is_none());
        assert_eq!(engine.state(), TimerState::Paused);
    }

    #[test]
    fn completion_fires_once_even_with_overshoot() {
        let mut engine = TimerEngine::default();
        engine.start();
        assert!(engine.tick(Duration::from_secs(5000)).is_some());
        assert!(engine.tick(Duration::from_secs(5000)).is_none());
        assert_eq!(engine.completed_work_count(), 1);
    }

    #[test]
    fn fourth_work_completion_selects_long_break() {
        let mut engine = TimerEngine::default();
        let mut breaks = Vec::new();
        for _ in 0..4 {
            complete_current(&mut engine);
            engine.advance_phase();
            breaks.push(engine.phase());
            complete_current(&mut engine);
            engine.advance_phase();
            assert_eq!(engine.phase(), Phase::Work);
        }
        assert_eq!(
            breaks,
            vec![
                Phase::ShortBreak,
                Phase::ShortBreak,
                Phase::ShortBreak,
                Phase::LongBreak
            ]
        );
        // Long break taken: a new cycle starts.
        assert_eq!(engine.completed_work_count(), 0);
    }

    #[test]
    fn breaks_do_not_count_as_work() {
        let mut engine = TimerEngine::default();
        complete_current(&mut engine);
        engine.advance_phase();
        match complete_current(&mut engine) {
            Event::PhaseCompleted {
                phase,
                completed_work_count,
                ..
            } => {
                assert_eq!(phase, Phase::ShortBreak);
                assert_eq!(completed_work_count, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reset_keeps_count_and_reports_abandoned_time() {
        let mut engine = TimerEngine::default();
        complete_current(&mut engine);
        engine.advance_phase();
        complete_current(&mut engine);
        engine.advance_phase();

        engine.start();
        engine.tick(MIN * 3);
        match engine.reset() {
            Some(Event::TimerReset {
                abandoned_elapsed_ms,
                ..
            }) => assert_eq!(abandoned_elapsed_ms, Some(3 * 60 * 1000)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(engine.state(), TimerState::Idle);
        assert_eq!(engine.remaining_ms(), 0);
        assert_eq!(engine.completed_work_count(), 1);
    }

    #[test]
    fn reset_from_idle_reports_nothing_abandoned() {
        let mut engine = TimerEngine::default();
        match engine.reset() {
            Some(Event::TimerReset {
                abandoned_elapsed_ms,
                ..
            }) => assert_eq!(abandoned_elapsed_ms, None),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn advance_without_completion_is_noop() {
        let mut engine = TimerEngine::default();
        assert!(engine.advance_phase().is_none());
        assert_eq!(engine.phase(), Phase::Work);
    }

    #[test]
    fn start_after_completion_advances_first() {
        let mut engine = TimerEngine::default();
        complete_current(&mut engine);
        match engine.start() {
            Some(Event::TimerStarted { phase, .. }) => assert_eq!(phase, Phase::ShortBreak),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn custom_interval_and_restored_count() {
        let mut engine = TimerEngine::default()
            .with_long_break_interval(2)
            .with_progress(1, Phase::Work);
        complete_current(&mut engine);
        engine.advance_phase();
        assert_eq!(engine.phase(), Phase::LongBreak);
    }

    #[test]
    fn restored_long_break_keeps_the_cycle() {
        let mut engine = TimerEngine::default().with_progress(4, Phase::LongBreak);
        assert_eq!(engine.phase(), Phase::LongBreak);
        assert_eq!(engine.remaining_ms(), 15 * 60 * 1000);
        assert_eq!(engine.completed_work_count(), 4);

        complete_current(&mut engine);
        engine.advance_phase();
        assert_eq!(engine.phase(), Phase::Work);
        assert_eq!(engine.completed_work_count(), 0);
    }

    #[test]
    fn restored_full_count_without_long_break_wraps() {
        let engine = TimerEngine::default().with_progress(4, Phase::Work);
        assert_eq!(engine.completed_work_count(), 0);
        assert_eq!(engine.phase(), Phase::Work);
    }

    #[test]
    fn snapshot_returns_valid_event() {
        let engine = TimerEngine::default();
        match engine.snapshot() {
            Event::StateSnapshot {
                state,
                phase,
                remaining_ms,
                awaiting_advance,
                ..
            } => {
                assert_eq!(state, TimerState::Idle);
                assert_eq!(phase, Phase::Work);
                assert_eq!(remaining_ms, 25 * 60 * 1000);
                assert!(!awaiting_advance);
            }
            _ => panic!("Expected StateSnapshot"),
        }
    }
}
