//! Bounded undo/redo over whole-ledger snapshots.
//!
//! Every mutation is represented as "replace the whole row sequence", so a
//! snapshot is simply a frozen copy of all rows. The undo stack holds at most
//! `max_undo + 1` snapshots (the extra slot is the seeded initial state) and
//! the redo stack at most `max_undo`.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::record::Record;

/// Undo depth used when the settings do not say otherwise.
pub const DEFAULT_MAX_UNDO: usize = 5;

/// Largest undo depth accepted from the settings file.
pub const MAX_UNDO_LIMIT: usize = 100;

/// Immutable copy of a ledger's rows at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot(Arc<[Record]>);

impl Snapshot {
    pub fn capture(records: &[Record]) -> Self {
        Snapshot(Arc::from(records))
    }

    pub fn records(&self) -> &[Record] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of an undo or redo request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryStep {
    Restored,
    NothingToUndo,
    NothingToRedo,
}

#[derive(Debug, Clone)]
pub struct UndoRedoState {
    undo: VecDeque<Snapshot>,
    redo: VecDeque<Snapshot>,
    max_undo: usize,
}

impl Default for UndoRedoState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNDO)
    }
}

impl UndoRedoState {
    pub fn new(max_undo: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            max_undo,
        }
    }

    pub fn max_undo(&self) -> usize {
        self.max_undo
    }

    /// Push the freshly loaded state so the first edit has a baseline.
    pub fn seed_initial_state(&mut self, records: &[Record]) {
        self.undo.clear();
        self.redo.clear();
        self.undo.push_back(Snapshot::capture(records));
    }

    /// Capture `records` ahead of a mutation and invalidate redo.
    pub fn record_before_mutation(&mut self, records: &[Record]) {
        let cap = self.max_undo.saturating_add(1);
        push_dedup(&mut self.undo, Snapshot::capture(records), cap);
        self.redo.clear();
    }

    /// Step back. `current` becomes a redo candidate and the snapshot to
    /// restore is returned.
    pub fn undo(&mut self, current: &[Record]) -> Option<Snapshot> {
        if self.undo.is_empty() {
            return None;
        }
        push_dedup(&mut self.redo, Snapshot::capture(current), self.max_undo);
        self.undo.pop_back()
    }

    /// Step forward. Mirror image of [`UndoRedoState::undo`].
    pub fn redo(&mut self, current: &[Record]) -> Option<Snapshot> {
        if self.redo.is_empty() {
            return None;
        }
        let cap = self.max_undo.saturating_add(1);
        push_dedup(&mut self.undo, Snapshot::capture(current), cap);
        self.redo.pop_back()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }
}

/// Append unless equal to the current top, then evict the oldest past `cap`.
fn push_dedup(stack: &mut VecDeque<Snapshot>, snapshot: Snapshot, cap: usize) {
    if stack.back() == Some(&snapshot) {
        return;
    }
    stack.push_back(snapshot);
    while stack.len() > cap {
        stack.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::from_cells("8", "10", i.to_string(), "50 Kg", "01/01/2024"))
            .collect()
    }

    #[test]
    fn identical_snapshots_are_not_stacked() {
        let mut h = UndoRedoState::default();
        h.seed_initial_state(&rows(0));
        h.record_before_mutation(&rows(0));
        h.record_before_mutation(&rows(0));
        assert_eq!(h.undo_depth(), 1);
        h.record_before_mutation(&rows(1));
        assert_eq!(h.undo_depth(), 2);
    }

    #[test]
    fn undo_stack_is_bounded() {
        let mut h = UndoRedoState::new(5);
        h.seed_initial_state(&rows(0));
        for n in 1..20 {
            h.record_before_mutation(&rows(n));
            assert!(h.undo_depth() <= 6);
        }
        assert_eq!(h.undo_depth(), 6);
        // oldest entries were evicted, newest kept
        assert_eq!(h.undo(&rows(20)).unwrap().len(), 19);
    }

    #[test]
    fn redo_stack_is_bounded() {
        let mut h = UndoRedoState::new(5);
        h.seed_initial_state(&rows(0));
        for n in 1..=8 {
            h.record_before_mutation(&rows(n));
        }
        let mut current = rows(9);
        while let Some(s) = h.undo(&current) {
            current = s.records().to_vec();
        }
        assert_eq!(h.redo_depth(), 5);
    }

    #[test]
    fn empty_stacks_report_nothing() {
        let mut h = UndoRedoState::default();
        assert!(h.undo(&rows(1)).is_none());
        assert!(h.redo(&rows(1)).is_none());
        assert_eq!(h.redo_depth(), 0);
    }

    #[test]
    fn mutation_clears_redo() {
        let mut h = UndoRedoState::default();
        h.seed_initial_state(&rows(0));
        h.record_before_mutation(&rows(0));
        let restored = h.undo(&rows(1)).unwrap();
        assert_eq!(restored.len(), 0);
        assert!(h.can_redo());
        h.record_before_mutation(&rows(0));
        assert!(!h.can_redo());
    }

    #[test]
    fn seeding_resets_both_stacks() {
        let mut h = UndoRedoState::default();
        h.seed_initial_state(&rows(0));
        h.record_before_mutation(&rows(1));
        h.undo(&rows(2));
        h.seed_initial_state(&rows(3));
        assert_eq!(h.undo_depth(), 1);
        assert_eq!(h.redo_depth(), 0);
    }

    #[test]
    fn huge_depth_does_not_overflow() {
        let mut h = UndoRedoState::new(usize::MAX);
        h.seed_initial_state(&rows(0));
        h.record_before_mutation(&rows(1));
        assert_eq!(h.undo(&rows(2)).unwrap().len(), 1);
        assert_eq!(h.redo(&rows(1)).unwrap().len(), 2);

        let h = UndoRedoState::new(usize::MAX / 2);
        assert_eq!(h.undo_depth(), 0);
    }
}
