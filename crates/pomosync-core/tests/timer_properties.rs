//! Property tests for the timer engine.

use std::time::Duration;

use pomosync_core::{Event, Phase, PhaseDurations, TimerEngine, TimerState};
use proptest::prelude::*;

fn engine(work_secs: u64) -> TimerEngine {
    TimerEngine::new(PhaseDurations {
        work: Duration::from_secs(work_secs),
        short_break: Duration::from_secs(300),
        long_break: Duration::from_secs(900),
    })
}

fn completions(engine: &mut TimerEngine, ticks: &[u64]) -> usize {
    ticks
        .iter()
        .filter_map(|ms| engine.tick(Duration::from_millis(*ms)))
        .filter(|e| matches!(e, Event::PhaseCompleted { .. }))
        .count()
}

proptest! {
    #[test]
    fn ticks_below_total_never_complete(
        work_secs in 1u64..=3600,
        ticks in prop::collection::vec(0u64..120_000, 0..64),
    ) {
        let total = work_secs * 1000;
        let mut t = engine(work_secs);
        t.start();

        let mut sum = 0u64;
        for ms in ticks {
            if sum + ms >= total {
                break;
            }
            sum += ms;
            prop_assert!(t.tick(Duration::from_millis(ms)).is_none());
        }
        prop_assert_eq!(t.remaining_ms(), total - sum);
        prop_assert_eq!(t.state(), TimerState::Running);
    }

    #[test]
    fn reaching_total_completes_exactly_once(
        work_secs in 1u64..=3600,
        ticks in prop::collection::vec(1u64..600_000, 1..64),
        extra in prop::collection::vec(0u64..10_000, 0..8),
    ) {
        let total = work_secs * 1000;
        let sum: u64 = ticks.iter().sum();
        prop_assume!(sum >= total);

        let mut t = engine(work_secs);
        t.start();
        prop_assert_eq!(completions(&mut t, &ticks), 1);
        // Further ticks after completion are ignored.
        prop_assert_eq!(completions(&mut t, &extra), 0);
        prop_assert_eq!(t.remaining_ms(), 0);
        prop_assert_eq!(t.completed_work_count(), 1);
        prop_assert!(t.awaiting_advance());
    }

    #[test]
    fn pause_freezes_remaining_time(
        before in 0u64..1_000_000,
        while_paused in prop::collection::vec(0u64..1_000_000, 0..16),
    ) {
        let mut t = engine(1500);
        t.start();
        t.tick(Duration::from_millis(before));
        t.pause();
        let frozen = t.remaining_ms();
        for ms in while_paused {
            prop_assert!(t.tick(Duration::from_millis(ms)).is_none());
        }
        prop_assert_eq!(t.remaining_ms(), frozen);
    }

    #[test]
    fn long_break_every_interval(interval in 1u32..=8, rounds in 1usize..=3) {
        let mut t = engine(1).with_long_break_interval(interval);
        let mut breaks = Vec::new();
        for _ in 0..(interval as usize * rounds) {
            t.start();
            t.tick(Duration::from_secs(1));
            t.advance_phase();
            breaks.push(t.phase());
            t.start();
            t.tick(Duration::from_secs(900));
            t.advance_phase();
        }
        for (i, phase) in breaks.iter().enumerate() {
            let expected = if (i + 1) % interval as usize == 0 {
                Phase::LongBreak
            } else {
                Phase::ShortBreak
            };
            prop_assert_eq!(*phase, expected);
        }
    }
}
