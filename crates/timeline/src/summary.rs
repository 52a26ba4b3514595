//! Per-activity totals for a day.
use serde::Serialize;
use std::collections::HashMap;

use crate::{Minutes, SegmentKind, Timeline, TOTAL_MINUTES};

/// Label used for activities that have no title yet.
pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryEntry {
    pub title: String,
    pub kind: SegmentKind,
    pub color: String,
    pub minutes: Minutes,
    /// Fraction of the day, 0.0..=1.0.
    pub share: f64,
    pub segments: usize,
}

/// Total time per title, largest first. Gaps are counted together as free time.
pub fn summarize(timeline: &Timeline) -> Vec<SummaryEntry> {
    let mut order: Vec<(SegmentKind, String)> = Vec::new();
    let mut totals: HashMap<(SegmentKind, String), SummaryEntry> = HashMap::new();

    for segment in timeline {
        let title = match segment.title.trim() {
            "" => UNTITLED.to_string(),
            trimmed => trimmed.to_string(),
        };
        let key = (segment.kind, title.clone());
        let entry = totals.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            SummaryEntry {
                title,
                kind: segment.kind,
                color: segment.color.clone(),
                minutes: 0,
                share: 0.0,
                segments: 0,
            }
        });
        entry.minutes += segment.duration;
        entry.segments += 1;
    }

    let mut entries: Vec<SummaryEntry> = order
        .into_iter()
        .filter_map(|key| totals.remove(&key))
        .map(|mut entry| {
            entry.share = entry.minutes as f64 / TOTAL_MINUTES as f64;
            entry
        })
        .collect();
    // Stable, so equal totals keep first-appearance order.
    entries.sort_by(|a, b| b.minutes.cmp(&a.minutes));
    entries
}

/// Minutes not taken by any activity.
pub fn free_minutes(timeline: &Timeline) -> Minutes {
    timeline
        .iter()
        .filter(|s| s.is_gap())
        .map(|s| s.duration)
        .sum()
}
