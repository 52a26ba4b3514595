use serde::Serialize;

use crate::{Minutes, Segment, Timeline};

/// A segment together with its absolute start on the day circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Positioned<'a> {
    #[serde(flatten)]
    pub segment: &'a Segment,
    pub start: Minutes,
}

impl Positioned<'_> {
    pub fn end(&self) -> Minutes {
        self.start + self.segment.duration
    }
}

/// Prefix sum of durations in timeline order, starting at minute 0.
pub fn project(timeline: &Timeline) -> Vec<Positioned<'_>> {
    let mut start = 0;
    timeline
        .iter()
        .map(|segment| {
            let positioned = Positioned { segment, start };
            start += segment.duration;
            positioned
        })
        .collect()
}
