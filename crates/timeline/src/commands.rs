use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    change_end, change_start, clear_all, delete, insert_after, normalize, project, reorder,
    split_gap_at_offset, to_snapshot, update_segment, ColorPicker, Edit, EditConfig, GapClick,
    History, IdGenerator, Minutes, PaletteColorPicker, Positioned, SegmentId, SegmentPatch,
    SnapshotItem, Timeline, TimelineError, UuidIdGenerator,
};

/// Where committed timelines are written after every change.
pub trait SnapshotSink {
    fn persist(&self, snapshot: &[SnapshotItem]) -> anyhow::Result<()>;
}

/// A single user-level edit, as sent by a frontend or read from a script.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ScheduleCommand {
    InsertAfter {
        after: SegmentId,
        #[serde(default)]
        duration: Option<Minutes>,
    },
    AddInGap {
        gap_id: SegmentId,
        minute: Minutes,
    },
    ChangeStart {
        id: SegmentId,
        minute: Minutes,
    },
    ChangeEnd {
        id: SegmentId,
        minute: Minutes,
    },
    Delete {
        id: SegmentId,
    },
    ClearAll,
    Reorder {
        source: SegmentId,
        target: SegmentId,
    },
    Update {
        id: SegmentId,
        #[serde(default)]
        patch: SegmentPatch,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// A new undo step was recorded.
    Applied { created: Option<SegmentId> },
    /// Nothing to do: the edit was a no-op or its target has gone away.
    Unchanged,
    /// The edit was refused; the timeline is as it was.
    Rejected(TimelineError),
}

impl EditOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn created(&self) -> Option<&SegmentId> {
        match self {
            Self::Applied { created } => created.as_ref(),
            _ => None,
        }
    }
}

/// Owns the undo history of one day and routes every edit through it.
pub struct Schedule {
    pub(crate) history: History<Timeline>,
    pub(crate) config: EditConfig,
    colors: Box<dyn ColorPicker>,
    pub(crate) ids: Box<dyn IdGenerator>,
    sink: Option<Box<dyn SnapshotSink>>,
}

impl Schedule {
    pub fn new(timeline: Timeline) -> Self {
        Self::from_history(History::new(timeline.normalized()))
    }

    pub fn from_history(history: History<Timeline>) -> Self {
        Self {
            history,
            config: EditConfig::default(),
            colors: Box::new(PaletteColorPicker::new()),
            ids: Box::new(UuidIdGenerator),
            sink: None,
        }
    }

    pub fn with_config(mut self, config: EditConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_color_picker(mut self, colors: impl ColorPicker + 'static) -> Self {
        self.colors = Box::new(colors);
        self
    }

    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn with_sink(mut self, sink: impl SnapshotSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn timeline(&self) -> &Timeline {
        self.history.present()
    }

    pub fn history(&self) -> &History<Timeline> {
        &self.history
    }

    pub fn config(&self) -> &EditConfig {
        &self.config
    }

    pub fn positioned(&self) -> Vec<Positioned<'_>> {
        project(self.history.present())
    }

    pub fn apply(&mut self, command: ScheduleCommand) -> EditOutcome {
        debug!(?command, "applying schedule command");
        let current = self.history.present().clone();
        let config = self.config;
        let result = match command {
            ScheduleCommand::InsertAfter { after, duration } => insert_after(
                &current,
                &after,
                duration.unwrap_or(config.insert_minutes),
                self.colors.as_mut(),
                self.ids.as_mut(),
                &config,
            ),
            ScheduleCommand::AddInGap { gap_id, minute } => {
                match current.position(&gap_id) {
                    Some(index) => {
                        let click = GapClick {
                            gap_id,
                            gap_start: current.start_of(index),
                            gap_duration: current.segments()[index].duration,
                            click_minute: minute,
                        };
                        split_gap_at_offset(
                            &current,
                            &click,
                            self.colors.as_mut(),
                            self.ids.as_mut(),
                            &config,
                        )
                    }
                    None => Err(TimelineError::NotFound(gap_id)),
                }
            }
            ScheduleCommand::ChangeStart { id, minute } => {
                change_start(&current, &id, minute, self.ids.as_mut(), &config)
            }
            ScheduleCommand::ChangeEnd { id, minute } => {
                change_end(&current, &id, minute, self.ids.as_mut(), &config)
            }
            ScheduleCommand::Delete { id } => delete(&current, &id),
            ScheduleCommand::ClearAll => Ok(Edit::new(clear_all(self.ids.as_mut()))),
            ScheduleCommand::Reorder { source, target } => reorder(&current, &source, &target),
            ScheduleCommand::Update { id, patch } => update_segment(&current, &id, &patch),
        };
        self.record(result)
    }

    pub fn insert_after(&mut self, after: &SegmentId) -> EditOutcome {
        self.apply(ScheduleCommand::InsertAfter {
            after: after.clone(),
            duration: None,
        })
    }

    /// Click inside the gap `gap_id` at the absolute `minute`.
    pub fn add_in_gap(&mut self, gap_id: &SegmentId, minute: Minutes) -> EditOutcome {
        self.apply(ScheduleCommand::AddInGap {
            gap_id: gap_id.clone(),
            minute,
        })
    }

    pub fn change_start(&mut self, id: &SegmentId, minute: Minutes) -> EditOutcome {
        self.apply(ScheduleCommand::ChangeStart {
            id: id.clone(),
            minute,
        })
    }

    pub fn change_end(&mut self, id: &SegmentId, minute: Minutes) -> EditOutcome {
        self.apply(ScheduleCommand::ChangeEnd {
            id: id.clone(),
            minute,
        })
    }

    pub fn delete(&mut self, id: &SegmentId) -> EditOutcome {
        self.apply(ScheduleCommand::Delete { id: id.clone() })
    }

    pub fn clear_all(&mut self) -> EditOutcome {
        self.apply(ScheduleCommand::ClearAll)
    }

    pub fn reorder(&mut self, source: &SegmentId, target: &SegmentId) -> EditOutcome {
        self.apply(ScheduleCommand::Reorder {
            source: source.clone(),
            target: target.clone(),
        })
    }

    pub fn update(&mut self, id: &SegmentId, patch: SegmentPatch) -> EditOutcome {
        self.apply(ScheduleCommand::Update {
            id: id.clone(),
            patch,
        })
    }

    /// Drag the boundary after `index` to `minute` and commit it as one step.
    pub fn resize_boundary(&mut self, index: usize, minute: Minutes) -> EditOutcome {
        let mut drag = match self.begin_drag(index) {
            Ok(drag) => drag,
            Err(err) => return EditOutcome::Rejected(err),
        };
        if let Err(err) = drag.update(minute) {
            drag.cancel();
            return EditOutcome::Rejected(err);
        }
        drag.finish(true)
    }

    pub fn undo(&mut self) -> Result<(), TimelineError> {
        self.history.undo()?;
        self.persist();
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), TimelineError> {
        self.history.redo()?;
        self.persist();
        Ok(())
    }

    fn record(&mut self, result: Result<Edit, TimelineError>) -> EditOutcome {
        match result {
            Ok(edit) => {
                let timeline = normalize(edit.timeline.into_segments());
                if self.history.set(timeline, true) {
                    self.persist();
                    EditOutcome::Applied {
                        created: edit.created,
                    }
                } else {
                    EditOutcome::Unchanged
                }
            }
            Err(TimelineError::NotFound(id)) => {
                debug!(segment = %id, "edit target no longer exists");
                EditOutcome::Unchanged
            }
            Err(err) => {
                debug!("edit rejected: {}", err);
                EditOutcome::Rejected(err)
            }
        }
    }

    pub(crate) fn persist(&self) {
        if let Some(sink) = &self.sink {
            if let Err(err) = sink.persist(&to_snapshot(self.history.present())) {
                warn!("failed to persist schedule: {:#}", err);
            }
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new(crate::seed_timeline())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CyclingColorPicker, Segment, SequentialIdGenerator, TOTAL_MINUTES};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn schedule(segments: Vec<Segment>) -> Schedule {
        Schedule::new(Timeline::from_raw(segments))
            .with_color_picker(CyclingColorPicker::new(["#fee2e2"]))
            .with_id_generator(SequentialIdGenerator::new("n"))
    }

    fn morning() -> Vec<Segment> {
        vec![
            Segment::activity("a".into(), "Sleep", "#d1fae5", 420),
            Segment::gap("g".into(), 120),
            Segment::activity("b".into(), "Work", "#e0e7ff", 900),
        ]
    }

    #[derive(Clone, Default)]
    struct RecordingSink(Rc<RefCell<Vec<Vec<SnapshotItem>>>>);

    impl SnapshotSink for RecordingSink {
        fn persist(&self, snapshot: &[SnapshotItem]) -> anyhow::Result<()> {
            self.0.borrow_mut().push(snapshot.to_vec());
            Ok(())
        }
    }

    struct FailingSink;

    impl SnapshotSink for FailingSink {
        fn persist(&self, _snapshot: &[SnapshotItem]) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[test]
    fn insert_records_one_undo_step() {
        let mut schedule = schedule(morning());
        let outcome = schedule.insert_after(&"a".into());
        assert_eq!(
            outcome,
            EditOutcome::Applied {
                created: Some("n-1".into())
            }
        );
        assert_eq!(schedule.history().past().len(), 1);
        assert_eq!(schedule.timeline().total_minutes(), TOTAL_MINUTES);

        schedule.undo().unwrap();
        assert_eq!(schedule.timeline(), &Timeline::from_raw(morning()));
        schedule.redo().unwrap();
        assert_eq!(schedule.timeline().len(), 4);
    }

    #[test]
    fn missing_target_is_a_no_op() {
        let mut schedule = schedule(morning());
        assert_eq!(schedule.delete(&"ghost".into()), EditOutcome::Unchanged);
        assert!(!schedule.history().can_undo());
    }

    #[test]
    fn rejected_edit_keeps_timeline() {
        let mut schedule = schedule(vec![
            Segment::activity("a".into(), "Sleep", "#d1fae5", 720),
            Segment::activity("b".into(), "Work", "#e0e7ff", 720),
        ]);
        let before = schedule.timeline().clone();
        // Activity b may not shrink to 10 minutes.
        let outcome = schedule.change_start(&"b".into(), 1430);
        assert!(matches!(
            outcome,
            EditOutcome::Rejected(TimelineError::MinimumDurationViolation { .. })
        ));
        assert_eq!(schedule.timeline(), &before);
        assert!(!schedule.history().can_undo());
    }

    #[test]
    fn midnight_sliver_is_rejected() {
        let mut schedule = schedule(vec![
            Segment::activity("s".into(), "Sleep", "#d1fae5", 420),
            Segment::gap("g".into(), 600),
            Segment::activity("n".into(), "Night", "#d1fae5", 420),
        ]);
        let before = schedule.timeline().clone();
        let outcome = schedule.change_end(&"n".into(), 5);
        assert!(matches!(
            outcome,
            EditOutcome::Rejected(TimelineError::MinimumDurationViolation { duration: 5, .. })
        ));
        assert_eq!(schedule.timeline(), &before);
        assert!(!schedule.history().can_undo());
    }

    #[test]
    fn add_in_gap_reports_created_activity() {
        let mut schedule = schedule(morning());
        let outcome = schedule.add_in_gap(&"g".into(), 480);
        let created = outcome.created().cloned().unwrap();
        let segment = schedule.timeline().find(&created).unwrap();
        assert!(segment.is_activity());
        assert_eq!(segment.duration, 60);
    }

    #[test]
    fn same_result_does_not_add_history() {
        let mut schedule = schedule(morning());
        assert_eq!(schedule.reorder(&"a".into(), &"a".into()), EditOutcome::Unchanged);
        assert_eq!(schedule.change_end(&"a".into(), 420), EditOutcome::Unchanged);
        assert!(!schedule.history().can_undo());
    }

    #[test]
    fn commits_and_history_moves_are_persisted() {
        let sink = RecordingSink::default();
        let mut schedule = schedule(morning()).with_sink(sink.clone());
        schedule.delete(&"b".into());
        schedule.undo().unwrap();
        let writes = sink.0.borrow();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].len(), 2);
        assert_eq!(writes[1].len(), 3);
    }

    #[test]
    fn sink_failure_does_not_block_edit() {
        let mut schedule = schedule(morning()).with_sink(FailingSink);
        assert!(schedule.delete(&"b".into()).is_applied());
        assert_eq!(schedule.timeline().len(), 2);
    }

    #[test]
    fn commands_deserialize_from_tagged_json() {
        let command: ScheduleCommand =
            serde_json::from_str(r#"{"command":"change_end","id":"a","minute":450}"#).unwrap();
        assert_eq!(
            command,
            ScheduleCommand::ChangeEnd {
                id: "a".into(),
                minute: 450
            }
        );

        let mut schedule = schedule(morning());
        assert!(schedule.apply(command).is_applied());
        assert_eq!(schedule.timeline().segments()[0].duration, 450);
        assert_eq!(schedule.timeline().segments()[1].duration, 90);
    }
}
