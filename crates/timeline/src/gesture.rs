use tracing::debug;

use crate::{
    finish_gesture, resize_pair, EditOutcome, IdGenerator, Minutes, Schedule, SegmentId,
    Timeline, TimelineError,
};

/// Hands out the same id every time, so replaying a drag from its origin
/// names a split piece identically on every pointer move.
struct ReservedId(SegmentId);

impl IdGenerator for ReservedId {
    fn next_id(&mut self) -> SegmentId {
        self.0.clone()
    }
}

/// An in-progress boundary drag.
///
/// Every pointer move recomputes the pair from the timeline as it was when
/// the drag began and stores the result as a transient state, so the whole
/// gesture becomes a single undo step once finished.
pub struct DragSession<'a> {
    schedule: &'a mut Schedule,
    index: usize,
    origin: Timeline,
    reserved: SegmentId,
}

impl Schedule {
    /// Start dragging the boundary between `index` and its cyclic successor.
    pub fn begin_drag(&mut self, index: usize) -> Result<DragSession<'_>, TimelineError> {
        let origin = self.history.present().clone();
        if origin.len() < 2 || index >= origin.len() {
            return Err(TimelineError::IndexOutOfRange(index));
        }
        let reserved = self.ids.next_id();
        debug!(index, "drag started");
        Ok(DragSession {
            schedule: self,
            index,
            origin,
            reserved,
        })
    }
}

impl DragSession<'_> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn timeline(&self) -> &Timeline {
        self.schedule.history.present()
    }

    /// Move the boundary toward the absolute `minute`, snapped to the grid.
    /// A position that would break a floor leaves the last valid state shown.
    pub fn update(&mut self, minute: Minutes) -> Result<(), TimelineError> {
        let config = self.schedule.config;
        let target = config.snap(minute);
        let mut ids = ReservedId(self.reserved.clone());
        let next = resize_pair(&self.origin, self.index, target, &mut ids, &config)?;
        self.schedule.history.set(next, false);
        Ok(())
    }

    /// End the gesture: drop emptied segments, merge neighbors and, with
    /// `commit`, record the gesture as one undo step.
    pub fn finish(self, commit: bool) -> EditOutcome {
        let cleaned = finish_gesture(self.schedule.history.present());
        self.schedule.history.set(cleaned, false);
        if !commit {
            return EditOutcome::Unchanged;
        }
        if self.schedule.history.commit() {
            debug!(index = self.index, "drag committed");
            self.schedule.persist();
            EditOutcome::Applied { created: None }
        } else {
            EditOutcome::Unchanged
        }
    }

    /// Abandon the gesture and restore the pre-drag timeline.
    pub fn cancel(self) {
        debug!(index = self.index, "drag cancelled");
        self.schedule.history.revert();
    }
}
