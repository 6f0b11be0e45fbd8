mod engine;
mod phase;

pub use engine::{TimerEngine, TimerState, DEFAULT_LONG_BREAK_INTERVAL};
pub use phase::{format_clock, Phase, PhaseDurations};
