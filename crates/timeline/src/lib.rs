use serde::{Deserialize, Serialize};
use thiserror::Error;

mod segment;
pub use segment::*;
mod normalize;
pub use normalize::*;
mod projection;
pub use projection::*;
mod capabilities;
pub use capabilities::*;
mod edit_operations;
pub use edit_operations::*;
mod history;
pub use history::*;
mod snapshot;
pub use snapshot::*;
mod commands;
pub use commands::*;
mod gesture;
pub use gesture::*;
pub mod summary;
pub mod timecode;

/// Whole minutes. Signed so boundary deltas can be expressed directly.
pub type Minutes = i64;

/// Length of the circular day.
pub const TOTAL_MINUTES: Minutes = 24 * 60;
/// Smallest duration an activity may be edited down to.
pub const MIN_ACTIVITY_MINUTES: Minutes = 15;
/// Grid that boundary drags and click placement snap to.
pub const SNAP_MINUTES: Minutes = 15;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimelineError {
    #[error("not enough free time: need {required} minutes, only {available} available")]
    InsufficientSpace { required: Minutes, available: Minutes },
    #[error("segment not found: {0}")]
    NotFound(SegmentId),
    #[error("no boundary at index {0}")]
    IndexOutOfRange(usize),
    #[error("segment {0} is not a gap")]
    NotAGap(SegmentId),
    #[error("segment {0} is not an activity")]
    NotAnActivity(SegmentId),
    #[error("segment {id} would shrink to {duration} minutes (minimum {minimum})")]
    MinimumDurationViolation {
        id: SegmentId,
        duration: Minutes,
        minimum: Minutes,
    },
    #[error("a new activity needs at least {minimum} minutes, got {duration}")]
    TooShort { duration: Minutes, minimum: Minutes },
    #[error("moving the start of {0} would consume the segment itself")]
    WrapPastSelf(SegmentId),
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("history empty: {0}")]
    HistoryEmpty(&'static str),
}

/// Tunables for the edit operations. Defaults match the constants above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    pub min_activity_minutes: Minutes,
    pub snap_minutes: Minutes,
    /// Size of the activity created by "insert after".
    pub insert_minutes: Minutes,
    /// Largest activity carved out of a gap by a click.
    pub split_activity_minutes: Minutes,
    /// Gaps at or below this size are converted whole instead of split.
    pub convert_whole_gap_max_minutes: Minutes,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            min_activity_minutes: MIN_ACTIVITY_MINUTES,
            snap_minutes: SNAP_MINUTES,
            insert_minutes: 15,
            split_activity_minutes: 60,
            convert_whole_gap_max_minutes: 30,
        }
    }
}

impl EditConfig {
    /// Lowest duration a segment of `kind` may be left with by a boundary edit.
    pub fn floor_for(&self, kind: SegmentKind) -> Minutes {
        match kind {
            SegmentKind::Activity => self.min_activity_minutes,
            SegmentKind::Gap => 0,
        }
    }

    /// Round a minute value to the nearest grid line.
    pub fn snap(&self, minutes: Minutes) -> Minutes {
        self.snap_f64(minutes as f64)
    }

    /// Same as [`EditConfig::snap`] for fractional positions such as a pointer angle.
    pub fn snap_f64(&self, minutes: f64) -> Minutes {
        if self.snap_minutes <= 1 {
            return minutes.round() as Minutes;
        }
        let step = self.snap_minutes as f64;
        ((minutes / step).round() * step) as Minutes
    }
}
