/// End-to-end behavior of the day timeline: edits, history and snapshots.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use timeline::*;

fn durations(timeline: &Timeline) -> Vec<Minutes> {
    timeline.iter().map(|s| s.duration).collect()
}

fn deterministic(segments: Vec<Segment>) -> Schedule {
    Schedule::new(Timeline::from_raw(segments))
        .with_color_picker(CyclingColorPicker::new(["#fee2e2", "#dcfce7"]))
        .with_id_generator(SequentialIdGenerator::new("t"))
}

fn assert_valid(timeline: &Timeline) {
    assert_eq!(timeline.total_minutes(), TOTAL_MINUTES);
    assert!(timeline.is_normalized(), "not normalized: {:?}", timeline);
    assert!(timeline.iter().all(|s| s.duration > 0));
    let ids: HashSet<&SegmentId> = timeline.iter().map(|s| &s.id).collect();
    assert_eq!(ids.len(), timeline.len(), "duplicate ids: {:?}", timeline);
}

/// Every activity meets the floor, except the ones that took over a small gap whole.
fn assert_activity_floor(timeline: &Timeline, whole_gaps: &HashSet<SegmentId>) {
    for segment in timeline.iter().filter(|s| s.is_activity()) {
        assert!(
            segment.duration >= MIN_ACTIVITY_MINUTES || whole_gaps.contains(&segment.id),
            "activity under the floor: {:?}",
            segment
        );
    }
}

#[test]
fn test_insert_after_takes_from_following_gap() {
    let mut schedule = deterministic(vec![
        Segment::activity("work".into(), "Work", "#e0e7ff", 120),
        Segment::gap("free".into(), 1320),
    ]);
    let outcome = schedule.insert_after(&"work".into());
    assert!(outcome.is_applied());

    let timeline = schedule.timeline();
    assert_eq!(durations(timeline), vec![120, 15, 1305]);
    assert_eq!(timeline.segments()[1].title, "");
    assert!(timeline.segments()[1].is_activity());
    assert_eq!(outcome.created(), Some(&timeline.segments()[1].id));
}

#[test]
fn test_change_end_grows_into_gap() {
    let mut schedule = deterministic(vec![
        Segment::activity("a".into(), "A", "#fee2e2", 60),
        Segment::gap("g".into(), 1380),
    ]);
    assert!(schedule.change_end(&"a".into(), 90).is_applied());
    assert_eq!(durations(schedule.timeline()), vec![90, 1350]);
}

#[test]
fn test_click_in_gap_creates_hour_block() {
    let mut schedule = deterministic(vec![
        Segment::activity("a".into(), "Sleep", "#d1fae5", 500),
        Segment::gap("g".into(), 100),
        Segment::activity("b".into(), "Work", "#e0e7ff", 840),
    ]);
    let outcome = schedule.add_in_gap(&"g".into(), 530);
    let created = outcome.created().cloned().unwrap();

    let positioned = schedule.positioned();
    assert_eq!(positioned.len(), 4);
    assert_eq!(positioned[1].segment.id, created);
    assert_eq!(positioned[1].start, 500);
    assert_eq!(positioned[1].segment.duration, 60);
    assert!(positioned[2].segment.is_gap());
    assert_eq!(positioned[2].start, 560);
    assert_eq!(positioned[2].segment.duration, 40);
}

#[test]
fn test_normalize_merges_gaps() {
    let timeline = normalize(vec![
        Segment::gap("g1".into(), 30),
        Segment::gap("g2".into(), 20),
        Segment::activity("x".into(), "X", "#fee2e2", 1390),
    ]);
    assert_eq!(durations(&timeline), vec![50, 1390]);
    assert_eq!(timeline.segments()[0].id, SegmentId::from("g1"));
}

#[test]
fn test_full_day_rejects_insert() {
    let segments: Vec<Segment> = (0..TOTAL_MINUTES / MIN_ACTIVITY_MINUTES)
        .map(|i| {
            let title = if i % 2 == 0 { "Even" } else { "Odd" };
            Segment::activity(SegmentId::new(format!("s{}", i)), title, "#fee2e2", 15)
        })
        .collect();
    let mut schedule = deterministic(segments);
    let before = schedule.timeline().clone();

    let outcome = schedule.insert_after(&"s0".into());
    assert_eq!(
        outcome,
        EditOutcome::Rejected(TimelineError::InsufficientSpace {
            required: 15,
            available: 0
        })
    );
    assert_eq!(schedule.timeline(), &before);
    assert!(!schedule.history().can_undo());
}

#[test]
fn test_undo_walks_back_through_every_edit() {
    let mut schedule = deterministic(seed_timeline().into_segments());
    let initial = schedule.timeline().clone();

    schedule.delete(&"5".into());
    schedule.insert_after(&"3".into());
    schedule.update(
        &"1".into(),
        SegmentPatch {
            title: None,
            color: Some("#ffe4e6".into()),
        },
    );
    assert_eq!(schedule.history().past().len(), 3);
    // Both sleep blocks follow the new color.
    assert_eq!(schedule.timeline().find(&"10".into()).unwrap().color, "#ffe4e6");

    while schedule.history().can_undo() {
        schedule.undo().unwrap();
    }
    assert_eq!(schedule.timeline(), &initial);
    assert_eq!(schedule.history().future().len(), 3);
    assert!(schedule.undo().is_err());
}

#[test]
fn test_drag_is_isolated_from_committed_history() {
    let mut schedule = deterministic(seed_timeline().into_segments());
    schedule.delete(&"8".into());
    let committed = schedule.timeline().clone();

    let mut drag = schedule.begin_drag(0).unwrap();
    for minute in [430, 445, 460, 440] {
        drag.update(minute).unwrap();
    }
    drag.finish(true);
    assert_eq!(schedule.history().past().len(), 2);

    schedule.undo().unwrap();
    assert_eq!(schedule.timeline(), &committed);
}

#[test]
fn test_snapshot_survives_edits() {
    let mut schedule = deterministic(seed_timeline().into_segments());
    schedule.change_start(&"3".into(), 435);
    schedule.add_in_gap(&"7".into(), 1000);

    let json = to_json(schedule.timeline()).unwrap();
    let restored = from_json(&json).unwrap();
    assert_eq!(&restored, schedule.timeline());
    assert_eq!(load_or_seed(Some(json.as_str())), restored);
}

#[test]
fn test_random_edit_sequences_keep_invariants() {
    for seed in 0..20u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut schedule = Schedule::new(seed_timeline())
            .with_color_picker(PaletteColorPicker::with_seed(seed))
            .with_id_generator(SequentialIdGenerator::new(format!("r{}", seed)));
        let mut whole_gaps = HashSet::new();

        for _ in 0..200 {
            let timeline = schedule.timeline().clone();
            let pick = |rng: &mut StdRng| {
                let index = rng.gen_range(0..timeline.len());
                timeline.segments()[index].id.clone()
            };
            let minute = rng.gen_range(0..TOTAL_MINUTES);

            match rng.gen_range(0..9) {
                0 => {
                    let id = pick(&mut rng);
                    schedule.insert_after(&id);
                }
                1 => {
                    if let Some(click) = GapClick::at(&timeline, minute) {
                        let outcome = schedule.add_in_gap(&click.gap_id, minute);
                        if let Some(id) = outcome.created() {
                            let created = schedule.timeline().iter().find(|s| &s.id == id);
                            if created.map_or(false, |s| s.duration < MIN_ACTIVITY_MINUTES) {
                                whole_gaps.insert(id.clone());
                            }
                        }
                    }
                }
                2 => {
                    let id = pick(&mut rng);
                    schedule.change_start(&id, minute);
                }
                3 => {
                    let id = pick(&mut rng);
                    schedule.change_end(&id, minute);
                }
                4 => {
                    let id = pick(&mut rng);
                    schedule.delete(&id);
                }
                5 => {
                    let source = pick(&mut rng);
                    let target = pick(&mut rng);
                    schedule.reorder(&source, &target);
                }
                6 => {
                    let index = rng.gen_range(0..timeline.len());
                    schedule.resize_boundary(index, minute);
                }
                7 => {
                    let _ = schedule.undo();
                }
                _ => {
                    let _ = schedule.redo();
                }
            }

            assert_valid(schedule.timeline());
            assert_activity_floor(schedule.timeline(), &whole_gaps);
        }
    }
}
