/// Wall-clock display for positions on the day circle.
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Minutes, TOTAL_MINUTES};

/// A time of day at minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClockTime {
    pub hours: u32,
    pub minutes: u32,
}

impl ClockTime {
    /// Any minute value, folded onto the circle.
    pub fn from_minutes(minutes: Minutes) -> Self {
        let wrapped = minutes.rem_euclid(TOTAL_MINUTES) as u32;
        Self {
            hours: wrapped / 60,
            minutes: wrapped % 60,
        }
    }

    pub fn to_minutes(&self) -> Minutes {
        (self.hours * 60 + self.minutes) as Minutes
    }

    /// Accepts `H:MM`, `HH:MM` and `24:00` (read as midnight).
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s == "24:00" {
            return Ok(Self::from_minutes(0));
        }
        let time = NaiveTime::parse_from_str(s, "%H:%M")
            .map_err(|e| format!("invalid time of day '{}': {}", s, e))?;
        Ok(Self {
            hours: time.hour(),
            minutes: time.minute(),
        })
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hours, self.minutes)
    }
}

/// `HH:MM` for an absolute minute.
pub fn format_clock(minutes: Minutes) -> String {
    ClockTime::from_minutes(minutes).to_string()
}

/// Minute offset from midnight for a `HH:MM` string.
pub fn parse_clock(s: &str) -> Result<Minutes, String> {
    ClockTime::parse(s).map(|t| t.to_minutes())
}

/// Human duration: `45m`, `2h`, `7h 30m`.
pub fn format_duration(minutes: Minutes) -> String {
    let minutes = minutes.max(0);
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}

/// `HH:MM-HH:MM` for a segment starting at `start`.
pub fn format_span(start: Minutes, duration: Minutes) -> String {
    format!("{}-{}", format_clock(start), format_clock(start + duration))
}
