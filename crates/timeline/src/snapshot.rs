use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::{
    normalize, Minutes, Segment, SegmentId, SegmentKind, Timeline, TimelineError, TOTAL_MINUTES,
};

/// One entry of the persisted array, in chronological order from midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub color: String,
    #[serde(deserialize_with = "minutes_from_number")]
    pub duration: Minutes,
}

impl From<&Segment> for SnapshotItem {
    fn from(segment: &Segment) -> Self {
        Self {
            id: segment.id.0.clone(),
            kind: segment.kind,
            title: segment.title.clone(),
            color: segment.color.clone(),
            duration: segment.duration,
        }
    }
}

impl From<SnapshotItem> for Segment {
    fn from(item: SnapshotItem) -> Self {
        match item.kind {
            SegmentKind::Gap => Segment::gap(SegmentId(item.id), item.duration),
            SegmentKind::Activity => Segment::activity(
                SegmentId(item.id),
                item.title,
                item.color,
                item.duration,
            ),
        }
    }
}

// Older snapshots stored fractional minutes from unsnapped drags.
fn minutes_from_number<'de, D>(deserializer: D) -> Result<Minutes, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value < 0.0 || value > TOTAL_MINUTES as f64 {
        return Err(D::Error::custom(format!(
            "duration {} is outside 0..={}",
            value, TOTAL_MINUTES
        )));
    }
    Ok(value.round() as Minutes)
}

pub fn to_snapshot(timeline: &Timeline) -> Vec<SnapshotItem> {
    timeline.iter().map(SnapshotItem::from).collect()
}

/// Rebuild a timeline from persisted items. The result is normalized, so a
/// snapshot with drift or unmerged neighbors heals on load.
pub fn from_snapshot(items: Vec<SnapshotItem>) -> Result<Timeline, TimelineError> {
    if items.is_empty() {
        return Err(TimelineError::InvalidSnapshot("snapshot is empty".into()));
    }
    let segments: Vec<Segment> = items.into_iter().map(Segment::from).collect();
    Ok(normalize(segments))
}

pub fn to_json(timeline: &Timeline) -> Result<String, TimelineError> {
    serde_json::to_string(&to_snapshot(timeline))
        .map_err(|e| TimelineError::InvalidSnapshot(e.to_string()))
}

/// Parse a stored snapshot. Anything other than a non-empty array of items
/// is rejected.
pub fn from_json(raw: &str) -> Result<Timeline, TimelineError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| TimelineError::InvalidSnapshot(e.to_string()))?;
    if !value.is_array() {
        return Err(TimelineError::InvalidSnapshot(
            "snapshot is not an array".into(),
        ));
    }
    let items: Vec<SnapshotItem> =
        serde_json::from_value(value).map_err(|e| TimelineError::InvalidSnapshot(e.to_string()))?;
    from_snapshot(items)
}

/// Parse `raw` if present, otherwise (or on any error) fall back to the seed day.
pub fn load_or_seed(raw: Option<&str>) -> Timeline {
    match raw.map(from_json) {
        Some(Ok(timeline)) => timeline,
        Some(Err(err)) => {
            warn!("failed to load schedule, using seed day: {}", err);
            seed_timeline()
        }
        None => seed_timeline(),
    }
}

/// A typical day used when nothing has been saved yet.
pub fn seed_timeline() -> Timeline {
    let activity = |id: &str, title: &str, color: &str, duration: Minutes| {
        Segment::activity(SegmentId::from(id), title, color, duration)
    };
    let gap = |id: &str, duration: Minutes| Segment::gap(SegmentId::from(id), duration);

    normalize(vec![
        activity("1", "Sleep", "#d1fae5", 420),
        gap("2", 30),
        activity("3", "Morning routine", "#e0f2fe", 60),
        activity("4", "Work", "#e0e7ff", 240),
        activity("5", "Lunch", "#fef3c7", 60),
        activity("6", "Work", "#e0e7ff", 240),
        gap("7", 60),
        activity("8", "Free time", "#fce7f3", 120),
        gap("9", 30),
        activity("10", "Sleep", "#d1fae5", 180),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_is_a_valid_day() {
        let seed = seed_timeline();
        assert!(seed.is_normalized());
        assert_eq!(seed.len(), 10);
        assert_eq!(seed.total_minutes(), TOTAL_MINUTES);
    }

    #[test]
    fn json_round_trip() {
        let seed = seed_timeline();
        let json = to_json(&seed).unwrap();
        assert_eq!(from_json(&json).unwrap(), seed);
    }

    #[test]
    fn wire_format_field_names() {
        let json = to_json(&seed_timeline()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let first = &value[0];
        assert_eq!(first["id"], "1");
        assert_eq!(first["type"], "activity");
        assert_eq!(first["title"], "Sleep");
        assert_eq!(first["color"], "#d1fae5");
        assert_eq!(first["duration"], 420);
        assert_eq!(value[1]["type"], "gap");
    }

    #[test]
    fn rejects_non_arrays_and_empty_arrays() {
        assert!(matches!(
            from_json("{\"id\":\"1\"}"),
            Err(TimelineError::InvalidSnapshot(_))
        ));
        assert!(matches!(from_json("[]"), Err(TimelineError::InvalidSnapshot(_))));
        assert!(matches!(from_json("nope"), Err(TimelineError::InvalidSnapshot(_))));
    }

    #[test]
    fn load_falls_back_to_seed() {
        assert_eq!(load_or_seed(None), seed_timeline());
        assert_eq!(load_or_seed(Some("[]")), seed_timeline());
        assert_eq!(load_or_seed(Some("42")), seed_timeline());
    }

    #[test]
    fn loading_heals_drift_and_fractional_minutes() {
        let raw = r##"[
            {"id":"a","type":"gap","title":"Free","color":"#f3f4f6","duration":30.4},
            {"id":"b","type":"gap","title":"Free","color":"#f3f4f6","duration":20},
            {"id":"c","type":"activity","title":"X","color":"#fee2e2","duration":1000}
        ]"##;
        let timeline = from_json(raw).unwrap();
        let durations: Vec<Minutes> = timeline.iter().map(|s| s.duration).collect();
        assert_eq!(durations, vec![50, 1390]);
    }

    #[test]
    fn out_of_range_durations_fall_back_to_seed() {
        let huge = r#"[
            {"id":"a","type":"gap","duration":9e18},
            {"id":"b","type":"gap","duration":9e18}
        ]"#;
        assert!(matches!(from_json(huge), Err(TimelineError::InvalidSnapshot(_))));
        assert_eq!(load_or_seed(Some(huge)), seed_timeline());

        let negative = r#"[{"id":"a","type":"gap","duration":-5}]"#;
        assert!(from_json(negative).is_err());
    }
}
