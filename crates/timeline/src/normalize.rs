use tracing::debug;

use crate::{Minutes, Segment, SegmentId, Timeline, TOTAL_MINUTES};

/// Id given to the whole-day gap produced when nothing positive survives.
pub const FALLBACK_GAP_ID: &str = "day";

/// Merge runs of homogeneous neighbors. The first segment of a run keeps its
/// identity and absorbs the durations of the rest.
pub fn merge_adjacent(segments: Vec<Segment>) -> Vec<Segment> {
    let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        match merged.last_mut() {
            Some(current) if current.is_homogeneous(&segment) => {
                current.duration = current.duration.saturating_add(segment.duration);
            }
            _ => merged.push(segment),
        }
    }
    merged
}

/// Drop non-positive segments and merge neighbors. This is the cleanup pass
/// run at the end of a drag; it does not touch the total of a valid day.
/// No single segment may be longer than the day.
pub fn cleanup(segments: Vec<Segment>) -> Vec<Segment> {
    merge_adjacent(
        segments
            .into_iter()
            .filter(|s| s.duration > 0)
            .map(|s| {
                let duration = s.duration.min(TOTAL_MINUTES);
                s.with_duration(duration)
            })
            .collect(),
    )
}

/// Turn any raw sequence into a valid partition of the day.
///
/// Non-positive segments are dropped, homogeneous neighbors merged, and any
/// drift in the total is absorbed by the last segment. A last segment that
/// would be left with nothing is removed and the repair moves on to the new
/// last one. Drift is healed silently.
pub fn normalize(segments: impl Into<Vec<Segment>>) -> Timeline {
    let mut segments = cleanup(segments.into());

    let mut total: Minutes = segments
        .iter()
        .fold(0, |sum: Minutes, s| sum.saturating_add(s.duration));
    if total != TOTAL_MINUTES {
        debug!(total, "healing timeline drift");
    }
    while total != TOTAL_MINUTES {
        let Some(last) = segments.last_mut() else {
            break;
        };
        let adjusted = last.duration + (TOTAL_MINUTES - total);
        if adjusted > 0 {
            last.duration = adjusted;
            total = TOTAL_MINUTES;
        } else {
            total -= last.duration;
            segments.pop();
        }
    }

    if segments.is_empty() {
        segments.push(Segment::gap(SegmentId::new(FALLBACK_GAP_ID), TOTAL_MINUTES));
    }

    Timeline::from_raw(segments)
}

impl Timeline {
    /// Convenience for `normalize(self)`.
    pub fn normalized(self) -> Timeline {
        normalize(self.into_segments())
    }

    /// True when the sum, positive-duration and merge invariants all hold.
    /// The wrap-around pair (last, first) is not checked; merging it would
    /// move the origin.
    pub fn is_normalized(&self) -> bool {
        let segments = self.segments();
        self.total_minutes() == TOTAL_MINUTES
            && segments.iter().all(|s| s.duration > 0)
            && segments.windows(2).all(|w| !w[0].is_homogeneous(&w[1]))
    }
}
