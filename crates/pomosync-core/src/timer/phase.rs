use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Work,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn is_break(self) -> bool {
        !matches!(self, Phase::Work)
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Work => "Work",
            Phase::ShortBreak => "Short Break",
            Phase::LongBreak => "Long Break",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "work" | "focus" => Ok(Phase::Work),
            "short_break" | "short" => Ok(Phase::ShortBreak),
            "long_break" | "long" => Ok(Phase::LongBreak),
            other => Err(format!(
                "unknown phase '{other}' (expected work, short_break or long_break)"
            )),
        }
    }
}

/// Configured length of each phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseDurations {
    pub work: Duration,
    pub short_break: Duration,
    pub long_break: Duration,
}

impl PhaseDurations {
    /// Build from whole minutes.
    ///
    /// Uses saturating arithmetic so absurd config values cannot overflow.
    pub fn from_minutes(work: u64, short_break: u64, long_break: u64) -> Self {
        let mins = |m: u64| Duration::from_secs(m.saturating_mul(60));
        Self {
            work: mins(work),
            short_break: mins(short_break),
            long_break: mins(long_break),
        }
    }

    pub fn for_phase(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Work => self.work,
            Phase::ShortBreak => self.short_break,
            Phase::LongBreak => self.long_break,
        }
    }

    pub fn ms_for(&self, phase: Phase) -> u64 {
        u64::try_from(self.for_phase(phase).as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self::from_minutes(25, 5, 15)
    }
}

/// Render milliseconds as `MM:SS` (minutes keep growing past 59).
pub fn format_clock(ms: u64) -> String {
    let total_secs = ms.div_ceil(1000);
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_classic_pomodoro() {
        let d = PhaseDurations::default();
        assert_eq!(d.for_phase(Phase::Work), Duration::from_secs(25 * 60));
        assert_eq!(d.for_phase(Phase::ShortBreak), Duration::from_secs(5 * 60));
        assert_eq!(d.for_phase(Phase::LongBreak), Duration::from_secs(15 * 60));
    }

    #[test]
    fn parse_accepts_common_spellings() {
        assert_eq!("work".parse::<Phase>().unwrap(), Phase::Work);
        assert_eq!("short-break".parse::<Phase>().unwrap(), Phase::ShortBreak);
        assert_eq!("Long Break".parse::<Phase>().unwrap(), Phase::LongBreak);
        assert!("nap".parse::<Phase>().is_err());
    }

    #[test]
    fn clock_rounds_partial_seconds_up() {
        assert_eq!(format_clock(25 * 60 * 1000), "25:00");
        assert_eq!(format_clock(59_001), "01:00");
        assert_eq!(format_clock(0), "00:00");
    }
}
