use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Minutes, TOTAL_MINUTES};

/// Label every gap carries.
pub const GAP_TITLE: &str = "Free";
/// Fill color every gap carries.
pub const GAP_COLOR: &str = "#f3f4f6";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct SegmentId(pub String);

impl SegmentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SegmentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Activity,
    Gap,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Gap => "gap",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    pub id: SegmentId,
    pub kind: SegmentKind,
    /// Empty for activities the user has not named yet.
    pub title: String,
    pub color: String,
    pub duration: Minutes,
}

impl Segment {
    pub fn activity(
        id: SegmentId,
        title: impl Into<String>,
        color: impl Into<String>,
        duration: Minutes,
    ) -> Self {
        Self {
            id,
            kind: SegmentKind::Activity,
            title: title.into(),
            color: color.into(),
            duration,
        }
    }

    pub fn gap(id: SegmentId, duration: Minutes) -> Self {
        Self {
            id,
            kind: SegmentKind::Gap,
            title: GAP_TITLE.to_string(),
            color: GAP_COLOR.to_string(),
            duration,
        }
    }

    pub fn is_gap(&self) -> bool {
        self.kind == SegmentKind::Gap
    }

    pub fn is_activity(&self) -> bool {
        self.kind == SegmentKind::Activity
    }

    /// Two segments merge when both are gaps, or both are activities with the
    /// same title and color.
    pub fn is_homogeneous(&self, other: &Segment) -> bool {
        match (self.kind, other.kind) {
            (SegmentKind::Gap, SegmentKind::Gap) => true,
            (SegmentKind::Activity, SegmentKind::Activity) => {
                self.title == other.title && self.color == other.color
            }
            _ => false,
        }
    }

    /// Turn this segment into a gap in place, keeping id and duration.
    pub fn into_gap(self) -> Self {
        Self::gap(self.id, self.duration)
    }

    pub fn with_duration(mut self, duration: Minutes) -> Self {
        self.duration = duration;
        self
    }
}

/// Ordered, circular sequence of segments starting at minute 0.
///
/// Values are never mutated after they are handed out; every edit builds a new
/// `Timeline`. A timeline produced by [`crate::normalize`] satisfies the sum,
/// merge and positive-duration invariants. [`Timeline::from_raw`] skips that
/// pass and is only used for in-flight drag states.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Timeline {
    segments: Vec<Segment>,
}

impl Timeline {
    pub fn from_raw(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn position(&self, id: &SegmentId) -> Option<usize> {
        self.segments.iter().position(|s| &s.id == id)
    }

    pub fn find(&self, id: &SegmentId) -> Option<&Segment> {
        self.segments.iter().find(|s| &s.id == id)
    }

    pub fn total_minutes(&self) -> Minutes {
        self.segments
            .iter()
            .fold(0, |sum: Minutes, s| sum.saturating_add(s.duration))
    }

    /// Absolute start of the segment at `index` (prefix sum of what precedes it).
    pub fn start_of(&self, index: usize) -> Minutes {
        self.segments[..index.min(self.segments.len())]
            .iter()
            .map(|s| s.duration)
            .sum()
    }

    /// Index of the segment covering `minute`, taken modulo the day.
    pub fn index_at(&self, minute: Minutes) -> Option<usize> {
        let minute = minute.rem_euclid(TOTAL_MINUTES);
        let mut start = 0;
        for (index, segment) in self.segments.iter().enumerate() {
            let end = start + segment.duration;
            if minute >= start && minute < end {
                return Some(index);
            }
            start = end;
        }
        None
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}
