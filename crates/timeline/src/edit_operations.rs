/// Edit operations on the day circle.
///
/// Every operation takes the current timeline by reference and either returns
/// a new one or an error; the input is never modified, so an `Err` always
/// means the previous timeline is still the valid state.
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    normalize, ColorPicker, EditConfig, IdGenerator, Minutes, Segment, SegmentId, Timeline,
    TimelineError, TOTAL_MINUTES,
};

/// Outcome of an edit that went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub timeline: Timeline,
    /// Segment produced by the edit, when it creates one the caller may want to select.
    pub created: Option<SegmentId>,
}

impl Edit {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            created: None,
        }
    }

    pub fn with_created(timeline: Timeline, created: SegmentId) -> Self {
        Self {
            timeline,
            created: Some(created),
        }
    }

    pub fn unchanged(timeline: &Timeline) -> Self {
        Self::new(timeline.clone())
    }
}

/// A click inside free time, as reported by the gesture layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapClick {
    pub gap_id: SegmentId,
    pub gap_start: Minutes,
    pub gap_duration: Minutes,
    pub click_minute: Minutes,
}

impl GapClick {
    /// Build a click on the gap covering `click_minute`, if that minute falls in a gap.
    pub fn at(timeline: &Timeline, click_minute: Minutes) -> Option<Self> {
        let index = timeline.index_at(click_minute)?;
        let gap = timeline.get(index).filter(|s| s.is_gap())?;
        Some(Self {
            gap_id: gap.id.clone(),
            gap_start: timeline.start_of(index),
            gap_duration: gap.duration,
            click_minute,
        })
    }
}

/// Title/color change for an activity. `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentPatch {
    pub title: Option<String>,
    pub color: Option<String>,
}

/// Boundary drag between `timeline[index]` and its cyclic successor.
///
/// `target_minute` is the absolute minute the boundary should land on,
/// already snapped by the caller. The pair's combined duration is conserved
/// and nothing is merged; zero-length gaps survive until the gesture ends.
/// A drag of the boundary at the origin (`index == len - 1`) splits whichever
/// of the two segments ends up straddling midnight.
pub fn resize_pair(
    timeline: &Timeline,
    index: usize,
    target_minute: Minutes,
    ids: &mut dyn IdGenerator,
    config: &EditConfig,
) -> Result<Timeline, TimelineError> {
    let n = timeline.len();
    if n < 2 || index >= n {
        return Err(TimelineError::IndexOutOfRange(index));
    }

    let start = timeline.start_of(index);
    let mut frame = rotated(timeline.segments(), index);
    let combined = frame[0].duration + frame[1].duration;

    let raw = (target_minute - start).rem_euclid(TOTAL_MINUTES);
    let left = if raw <= combined {
        raw
    } else if raw - combined <= TOTAL_MINUTES - raw {
        combined
    } else {
        0
    };
    let right = combined - left;

    ensure_floor(&frame[0], left, config)?;
    ensure_floor(&frame[1], right, config)?;

    frame[0].duration = left;
    frame[1].duration = right;

    Ok(Timeline::from_raw(recut_at_origin(frame, start, ids, config)?))
}

/// Insert an untitled activity of `duration` minutes right after `after`.
///
/// The minutes are taken from the following segments, wrapping around:
/// first from gaps, then from activities down to their floor. Fails with
/// `InsufficientSpace` when the day cannot fund the insert and with `TooShort`
/// when `duration` is under the activity floor.
pub fn insert_after(
    timeline: &Timeline,
    after: &SegmentId,
    duration: Minutes,
    colors: &mut dyn ColorPicker,
    ids: &mut dyn IdGenerator,
    config: &EditConfig,
) -> Result<Edit, TimelineError> {
    let index = timeline
        .position(after)
        .ok_or_else(|| TimelineError::NotFound(after.clone()))?;
    if duration < config.min_activity_minutes {
        return Err(TimelineError::TooShort {
            duration,
            minimum: config.min_activity_minutes,
        });
    }

    let segments = timeline.segments();
    let n = segments.len();
    let insertion = index + 1;
    let scan: Vec<usize> = (0..n).map(|offset| (insertion + offset) % n).collect();

    let mut reductions = vec![0; n];
    let mut needed = duration;

    for &k in &scan {
        if needed == 0 {
            break;
        }
        if segments[k].is_gap() {
            let take = segments[k].duration.min(needed);
            reductions[k] += take;
            needed -= take;
        }
    }

    if needed > 0 {
        for &k in &scan {
            if needed == 0 {
                break;
            }
            let segment = &segments[k];
            if segment.is_activity() {
                let spare =
                    (segment.duration - reductions[k] - config.min_activity_minutes).max(0);
                let take = spare.min(needed);
                reductions[k] += take;
                needed -= take;
            }
        }
    }

    if needed > 0 {
        debug!(after = %after, duration, needed, "insert rejected, day is full");
        return Err(TimelineError::InsufficientSpace {
            required: duration,
            available: duration - needed,
        });
    }

    let mut next: Vec<Segment> = segments
        .iter()
        .zip(&reductions)
        .map(|(segment, reduction)| {
            let duration = segment.duration - reduction;
            segment.clone().with_duration(duration)
        })
        .collect();

    let created_start: Minutes = next[..insertion].iter().map(|s| s.duration).sum();
    let id = ids.next_id();
    next.insert(
        insertion,
        Segment::activity(id.clone(), "", colors.pick(), duration),
    );

    let timeline = normalize(next);
    let created = resolve_created(&timeline, id, created_start);
    Ok(Edit::with_created(timeline, created))
}

/// Carve a new activity out of a gap around the clicked minute.
///
/// Small gaps become the activity whole. Larger ones get an activity of at
/// most `split_activity_minutes`, centered on the click, kept inside the gap
/// and snapped to the grid; what is left on either side stays free.
pub fn split_gap_at_offset(
    timeline: &Timeline,
    click: &GapClick,
    colors: &mut dyn ColorPicker,
    ids: &mut dyn IdGenerator,
    config: &EditConfig,
) -> Result<Edit, TimelineError> {
    let index = timeline
        .position(&click.gap_id)
        .ok_or_else(|| TimelineError::NotFound(click.gap_id.clone()))?;
    let gap = &timeline.segments()[index];
    if !gap.is_gap() {
        return Err(TimelineError::NotAGap(gap.id.clone()));
    }

    let gap_start = timeline.start_of(index);
    let mut segments = timeline.segments().to_vec();

    if click.gap_duration <= config.convert_whole_gap_max_minutes {
        segments[index] = Segment::activity(gap.id.clone(), "", colors.pick(), gap.duration);
        let timeline = normalize(segments);
        let created = resolve_created(&timeline, gap.id.clone(), gap_start);
        return Ok(Edit::with_created(timeline, created));
    }

    let length = config.split_activity_minutes.min(click.gap_duration);
    let latest = click.gap_duration - length;
    let relative_click = (click.click_minute - click.gap_start).rem_euclid(TOTAL_MINUTES);
    let centered = (relative_click as f64 - length as f64 / 2.0).clamp(0.0, latest as f64);
    let lead = config.snap_f64(centered).clamp(0, latest);
    let trail = click.gap_duration - lead - length;

    let id = ids.next_id();
    let mut pieces = Vec::with_capacity(3);
    if lead > 0 {
        pieces.push(Segment::gap(gap.id.clone(), lead));
    }
    pieces.push(Segment::activity(id.clone(), "", colors.pick(), length));
    if trail > 0 {
        let trail_id = if lead > 0 { ids.next_id() } else { gap.id.clone() };
        pieces.push(Segment::gap(trail_id, trail));
    }
    segments.splice(index..=index, pieces);

    let timeline = normalize(segments);
    let created = resolve_created(&timeline, id, gap_start + lead);
    Ok(Edit::with_created(timeline, created))
}

/// Move the start of `id` to `requested_minute`, taking the shorter way
/// around the circle.
///
/// Later starts hand the freed minutes to a preceding gap, or open a new gap
/// when the predecessor is an activity. Earlier starts consume preceding
/// segments, removing those used up entirely.
pub fn change_start(
    timeline: &Timeline,
    id: &SegmentId,
    requested_minute: Minutes,
    ids: &mut dyn IdGenerator,
    config: &EditConfig,
) -> Result<Edit, TimelineError> {
    let index = timeline
        .position(id)
        .ok_or_else(|| TimelineError::NotFound(id.clone()))?;
    let start = timeline.start_of(index);
    let delta = circular_delta(requested_minute - start);
    if delta == 0 {
        return Ok(Edit::unchanged(timeline));
    }

    let end = start + timeline.segments()[index].duration;
    // Frame with the edited segment last; its end is the fixed point.
    let mut frame = rotated(timeline.segments(), index + 1);
    let last = frame.len() - 1;

    if delta > 0 {
        let grows_gap = last > 0 && frame[last - 1].is_gap();
        let remaining = frame[last].duration - delta;
        if grows_gap {
            ensure_floor(&frame[last], remaining, config)?;
        } else {
            // A new gap is opened; the edited segment keeps the activity floor whatever its kind.
            ensure_minimum(&frame[last], remaining, config.min_activity_minutes)?;
        }
        frame[last].duration = remaining;
        if grows_gap {
            frame[last - 1].duration += delta;
        } else {
            frame.insert(last, Segment::gap(ids.next_id(), delta));
        }
    } else {
        let mut needed = -delta;
        let mut cursor = last;
        while needed > 0 {
            if cursor == 0 {
                debug!(segment = %id, delta, "start change would wrap past itself");
                return Err(TimelineError::WrapPastSelf(id.clone()));
            }
            cursor -= 1;
            let available = frame[cursor].duration;
            if available > needed {
                let remaining = available - needed;
                ensure_floor(&frame[cursor], remaining, config)?;
                frame[cursor].duration = remaining;
                needed = 0;
            } else {
                frame[cursor].duration = 0;
                needed -= available;
            }
        }
        frame[last].duration -= delta;
    }

    frame.retain(|s| s.duration > 0);
    Ok(Edit::new(normalize(recut_at_origin(frame, end, ids, config)?)))
}

/// Move the end of `id` to `requested_minute`, taking the shorter way
/// around the circle.
///
/// Earlier ends give the minutes to a following gap, or open one. Later ends
/// borrow from the next segment, absorbing it entirely when the requested
/// growth would use it up.
pub fn change_end(
    timeline: &Timeline,
    id: &SegmentId,
    requested_minute: Minutes,
    ids: &mut dyn IdGenerator,
    config: &EditConfig,
) -> Result<Edit, TimelineError> {
    let index = timeline
        .position(id)
        .ok_or_else(|| TimelineError::NotFound(id.clone()))?;
    let start = timeline.start_of(index);
    let end = start + timeline.segments()[index].duration;
    let delta = circular_delta(requested_minute - end);
    if delta == 0 {
        return Ok(Edit::unchanged(timeline));
    }

    // Frame with the edited segment first; its start is the fixed point.
    let mut frame = rotated(timeline.segments(), index);

    if delta < 0 {
        let shrink = -delta;
        let grows_gap = frame.len() > 1 && frame[1].is_gap();
        let remaining = frame[0].duration - shrink;
        if grows_gap {
            ensure_floor(&frame[0], remaining, config)?;
        } else {
            ensure_minimum(&frame[0], remaining, config.min_activity_minutes)?;
        }
        frame[0].duration = remaining;
        if grows_gap {
            frame[1].duration += shrink;
        } else {
            frame.insert(1, Segment::gap(ids.next_id(), shrink));
        }
    } else {
        if frame.len() < 2 {
            return Err(TimelineError::WrapPastSelf(id.clone()));
        }
        if frame[1].duration > delta {
            let remaining = frame[1].duration - delta;
            ensure_floor(&frame[1], remaining, config)?;
            frame[1].duration = remaining;
            frame[0].duration += delta;
        } else {
            let absorbed = frame.remove(1);
            frame[0].duration += absorbed.duration;
        }
    }

    frame.retain(|s| s.duration > 0);
    Ok(Edit::new(normalize(recut_at_origin(frame, start, ids, config)?)))
}

/// Turn `id` into free time and merge it with neighboring gaps.
pub fn delete(timeline: &Timeline, id: &SegmentId) -> Result<Edit, TimelineError> {
    let index = timeline
        .position(id)
        .ok_or_else(|| TimelineError::NotFound(id.clone()))?;
    let mut segments = timeline.segments().to_vec();
    segments[index] = segments[index].clone().into_gap();
    Ok(Edit::new(normalize(segments)))
}

/// Replace the whole day with a single gap.
pub fn clear_all(ids: &mut dyn IdGenerator) -> Timeline {
    Timeline::from_raw(vec![Segment::gap(ids.next_id(), TOTAL_MINUTES)])
}

/// Move `source` to the position currently held by `target`.
pub fn reorder(
    timeline: &Timeline,
    source: &SegmentId,
    target: &SegmentId,
) -> Result<Edit, TimelineError> {
    let from = timeline
        .position(source)
        .ok_or_else(|| TimelineError::NotFound(source.clone()))?;
    let to = timeline
        .position(target)
        .ok_or_else(|| TimelineError::NotFound(target.clone()))?;
    if from == to {
        return Ok(Edit::unchanged(timeline));
    }

    let mut segments = timeline.segments().to_vec();
    let moved = segments.remove(from);
    let to = to.min(segments.len());
    segments.insert(to, moved);
    Ok(Edit::new(normalize(segments)))
}

/// Rename and/or recolor an activity.
///
/// Recoloring a titled activity recolors every activity sharing its title,
/// so repeated entries stay visually grouped.
pub fn update_segment(
    timeline: &Timeline,
    id: &SegmentId,
    patch: &SegmentPatch,
) -> Result<Edit, TimelineError> {
    let index = timeline
        .position(id)
        .ok_or_else(|| TimelineError::NotFound(id.clone()))?;
    let target = &timeline.segments()[index];
    if !target.is_activity() {
        return Err(TimelineError::NotAnActivity(id.clone()));
    }

    let previous_title = target.title.clone();
    let mut segments = timeline.segments().to_vec();

    if let Some(color) = &patch.color {
        if !previous_title.is_empty() {
            for segment in segments
                .iter_mut()
                .filter(|s| s.is_activity() && s.title == previous_title)
            {
                segment.color = color.clone();
            }
        }
        segments[index].color = color.clone();
    }
    if let Some(title) = &patch.title {
        segments[index].title = title.clone();
    }

    Ok(Edit::new(normalize(segments)))
}

/// End-of-drag cleanup: drop emptied segments and merge what now touches.
pub fn finish_gesture(timeline: &Timeline) -> Timeline {
    normalize(timeline.segments().to_vec())
}

/// Map a raw minute difference into (-720, 720], the shorter way around.
pub fn circular_delta(delta: Minutes) -> Minutes {
    let wrapped = delta.rem_euclid(TOTAL_MINUTES);
    if wrapped > TOTAL_MINUTES / 2 {
        wrapped - TOTAL_MINUTES
    } else {
        wrapped
    }
}

fn ensure_floor(
    segment: &Segment,
    duration: Minutes,
    config: &EditConfig,
) -> Result<(), TimelineError> {
    ensure_minimum(segment, duration, config.floor_for(segment.kind))
}

fn ensure_minimum(
    segment: &Segment,
    duration: Minutes,
    minimum: Minutes,
) -> Result<(), TimelineError> {
    if duration < minimum {
        debug!(segment = %segment.id, duration, minimum, "edit rejected below floor");
        return Err(TimelineError::MinimumDurationViolation {
            id: segment.id.clone(),
            duration,
            minimum,
        });
    }
    Ok(())
}

/// `segments[first..]` followed by `segments[..first]`.
fn rotated(segments: &[Segment], first: usize) -> Vec<Segment> {
    let first = first % segments.len().max(1);
    let mut frame = segments.to_vec();
    frame.rotate_left(first);
    frame
}

/// Cut a rotated frame, whose first segment begins at absolute `frame_start`,
/// back into a sequence starting at minute 0.
///
/// A segment straddling midnight is split; the larger piece keeps its id and
/// the smaller one gets a fresh id. Both pieces of a split activity must
/// still meet the activity floor.
fn recut_at_origin(
    mut frame: Vec<Segment>,
    frame_start: Minutes,
    ids: &mut dyn IdGenerator,
    config: &EditConfig,
) -> Result<Vec<Segment>, TimelineError> {
    let cut = (TOTAL_MINUTES - frame_start.rem_euclid(TOTAL_MINUTES)) % TOTAL_MINUTES;
    if cut == 0 {
        return Ok(frame);
    }

    let mut offset = 0;
    for k in 0..frame.len() {
        let duration = frame[k].duration;
        // Empty segments sitting on the cut stay with their predecessor.
        if offset == cut && duration > 0 {
            frame.rotate_left(k);
            return Ok(frame);
        }
        if cut < offset + duration {
            let before = cut - offset;
            let after = duration - before;
            ensure_floor(&frame[k], before.min(after), config)?;

            let original = frame[k].clone();
            let fresh = ids.next_id();
            let (head_id, tail_id) = if before >= after {
                (original.id.clone(), fresh)
            } else {
                (fresh, original.id.clone())
            };
            let head = Segment {
                id: head_id,
                duration: before,
                ..original.clone()
            };
            let tail = Segment {
                id: tail_id,
                duration: after,
                ..original
            };

            let mut result = Vec::with_capacity(frame.len() + 1);
            result.push(tail);
            result.extend(frame[k + 1..].iter().cloned());
            result.extend(frame[..k].iter().cloned());
            result.push(head);
            return Ok(result);
        }
        offset += duration;
    }
    Ok(frame)
}

/// Id of the segment that now holds a freshly created one. Normally that is
/// the new id itself; if normalization merged it into a neighbor, it is the
/// neighbor covering the start it was created at.
fn resolve_created(timeline: &Timeline, id: SegmentId, start: Minutes) -> SegmentId {
    if timeline.find(&id).is_some() {
        return id;
    }
    timeline
        .index_at(start)
        .and_then(|index| timeline.get(index))
        .map(|s| s.id.clone())
        .unwrap_or(id)
}
