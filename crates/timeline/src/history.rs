use serde::{Deserialize, Serialize};

use crate::TimelineError;

/// Undo/redo over whole snapshots.
///
/// `present` is what the user sees and may be rewritten many times by
/// transient updates (a drag in progress). `last_committed` is the state the
/// next commit will push onto `past`, so a whole gesture collapses into a
/// single undo step from "before the gesture" to "after the gesture".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct History<T> {
    past: Vec<T>,
    present: T,
    future: Vec<T>,
    last_committed: T,
}

impl<T: Clone + PartialEq> History<T> {
    pub fn new(initial: T) -> Self {
        Self {
            past: Vec::new(),
            present: initial.clone(),
            future: Vec::new(),
            last_committed: initial,
        }
    }

    pub fn present(&self) -> &T {
        &self.present
    }

    pub fn past(&self) -> &[T] {
        &self.past
    }

    pub fn future(&self) -> &[T] {
        &self.future
    }

    pub fn last_committed(&self) -> &T {
        &self.last_committed
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// True while transient updates have moved `present` away from the last commit.
    pub fn is_dirty(&self) -> bool {
        self.present != self.last_committed
    }

    /// Replace `present`.
    ///
    /// With `commit` the previous committed state becomes an undo step.
    /// Without it only `present` changes. Either way redo is invalidated.
    /// Returns false when nothing changed.
    pub fn set(&mut self, value: T, commit: bool) -> bool {
        if value == self.present && (!commit || !self.is_dirty()) {
            return false;
        }

        if commit {
            let previous = std::mem::replace(&mut self.last_committed, value.clone());
            self.past.push(previous);
        }
        self.present = value;
        self.future.clear();
        true
    }

    /// Commit whatever transient state `present` holds.
    pub fn commit(&mut self) -> bool {
        let present = self.present.clone();
        self.set(present, true)
    }

    /// Throw away transient updates and return to the last commit.
    pub fn revert(&mut self) {
        self.present = self.last_committed.clone();
    }

    pub fn undo(&mut self) -> Result<(), TimelineError> {
        let previous = self
            .past
            .pop()
            .ok_or(TimelineError::HistoryEmpty("undo stack"))?;
        let current = std::mem::replace(&mut self.present, previous.clone());
        self.last_committed = previous;
        self.future.insert(0, current);
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), TimelineError> {
        if self.future.is_empty() {
            return Err(TimelineError::HistoryEmpty("redo stack"));
        }
        let next = self.future.remove(0);
        let current = std::mem::replace(&mut self.present, next.clone());
        self.last_committed = next;
        self.past.push(current);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
        self.last_committed = self.present.clone();
    }
}

impl<T: Default + Clone + PartialEq> Default for History<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_pushes_previous_state() {
        let mut history = History::new(1);
        assert!(history.set(2, true));
        assert!(history.set(3, true));
        assert_eq!(history.past(), &[1, 2]);
        assert_eq!(*history.present(), 3);
        assert_eq!(*history.last_committed(), 3);
    }

    #[test]
    fn transient_updates_collapse_into_one_step() {
        let mut history = History::new(10);
        history.set(20, true);
        for value in 21..30 {
            history.set(value, false);
        }
        assert_eq!(history.past(), &[10]);
        assert!(history.is_dirty());

        history.set(35, true);
        assert_eq!(history.past(), &[10, 20]);
        assert_eq!(*history.present(), 35);
        assert!(!history.is_dirty());
    }

    #[test]
    fn commit_after_transient_updates_records_pre_gesture_state() {
        let mut history = History::new("before");
        history.set("dragging-1", false);
        history.set("dragging-2", false);
        assert!(history.commit());
        assert_eq!(history.past(), &["before"]);
        assert_eq!(*history.present(), "dragging-2");
    }

    #[test]
    fn undo_redo_round_trip() {
        let mut history = History::new('a');
        history.set('b', true);
        history.set('c', true);

        history.undo().unwrap();
        assert_eq!(*history.present(), 'b');
        assert_eq!(history.future(), &['c']);

        history.undo().unwrap();
        assert_eq!(*history.present(), 'a');
        assert_eq!(history.future(), &['b', 'c']);
        assert!(history.undo().is_err());

        history.redo().unwrap();
        assert_eq!(*history.present(), 'b');
        assert_eq!(*history.last_committed(), 'b');
        assert_eq!(history.past(), &['a']);
        assert_eq!(history.future(), &['c']);
    }

    #[test]
    fn new_change_invalidates_redo() {
        let mut history = History::new(0);
        history.set(1, true);
        history.undo().unwrap();
        assert!(history.can_redo());

        history.set(5, false);
        assert!(!history.can_redo());
        assert_eq!(history.redo(), Err(TimelineError::HistoryEmpty("redo stack")));
    }

    #[test]
    fn identical_values_are_ignored() {
        let mut history = History::new(4);
        assert!(!history.set(4, true));
        assert!(!history.set(4, false));
        assert!(history.past().is_empty());
    }

    #[test]
    fn revert_discards_transient_state() {
        let mut history = History::new(1);
        history.set(2, false);
        history.revert();
        assert_eq!(*history.present(), 1);
        assert!(!history.is_dirty());
    }
}
