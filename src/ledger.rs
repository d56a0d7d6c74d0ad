//! Ordered rows for one (profile, exercise) pair.

use std::fmt;

use crate::error::ValidationError;
use crate::history::{DEFAULT_MAX_UNDO, HistoryStep, Snapshot, UndoRedoState};
use crate::record::Record;

/// Callback fired after every change to a ledger's rows, including undo and
/// redo. Display collaborators use it to recompute totals and charts.
pub type ChangeListener = Box<dyn Fn(&Ledger)>;

/// Rows in entry order plus their undo history and unsaved-changes flag.
///
/// All row mutations go through methods that snapshot the previous state
/// first. Undo and redo restore through a separate path that never records a
/// snapshot of its own.
pub struct Ledger {
    profile: String,
    exercise: String,
    records: Vec<Record>,
    dirty: bool,
    history: UndoRedoState,
    listeners: Vec<ChangeListener>,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("profile", &self.profile)
            .field("exercise", &self.exercise)
            .field("records", &self.records)
            .field("dirty", &self.dirty)
            .field("history", &self.history)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Ledger {
    /// A fresh, empty ledger.
    pub fn new(profile: impl Into<String>, exercise: impl Into<String>) -> Self {
        Self::with_records(profile, exercise, Vec::new(), DEFAULT_MAX_UNDO)
    }

    /// A ledger holding previously stored rows. The rows become the first
    /// undo entry and the ledger starts clean.
    pub fn with_records(
        profile: impl Into<String>,
        exercise: impl Into<String>,
        records: Vec<Record>,
        max_undo: usize,
    ) -> Self {
        let mut history = UndoRedoState::new(max_undo);
        history.seed_initial_state(&records);
        Self {
            profile: profile.into(),
            exercise: exercise.into(),
            records,
            dirty: false,
            history,
            listeners: Vec::new(),
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn exercise(&self) -> &str {
        &self.exercise
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `true` when rows changed since the last successful save.
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_saved(&mut self) {
        self.dirty = false;
    }

    pub fn history(&self) -> &UndoRedoState {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn on_change(&mut self, listener: impl Fn(&Ledger) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn push(&mut self, record: Record) {
        self.mutate(|rows| rows.push(record));
    }

    pub fn insert(&mut self, index: usize, record: Record) -> Result<(), ValidationError> {
        if index > self.records.len() {
            return Err(self.out_of_range(index));
        }
        self.mutate(|rows| rows.insert(index, record));
        Ok(())
    }

    /// Overwrite one row, returning the previous value.
    pub fn replace(&mut self, index: usize, record: Record) -> Result<Record, ValidationError> {
        self.check_index(index)?;
        Ok(self.mutate(|rows| std::mem::replace(&mut rows[index], record)))
    }

    pub fn remove(&mut self, index: usize) -> Result<Record, ValidationError> {
        self.check_index(index)?;
        Ok(self.mutate(|rows| rows.remove(index)))
    }

    /// Move the row at `from` so that it ends up at position `to`.
    pub fn move_row(&mut self, from: usize, to: usize) -> Result<(), ValidationError> {
        self.check_index(from)?;
        self.check_index(to)?;
        self.mutate(|rows| {
            let row = rows.remove(from);
            rows.insert(to, row);
        });
        Ok(())
    }

    pub fn clear(&mut self) {
        self.mutate(Vec::clear);
    }

    /// Replace every row at once (used for bulk edits such as a sorted view
    /// being committed back).
    pub fn set_records(&mut self, records: Vec<Record>) {
        self.mutate(|rows| *rows = records);
    }

    pub fn undo(&mut self) -> HistoryStep {
        match self.history.undo(&self.records) {
            Some(snapshot) => {
                log::debug!("Undo on {}/{}", self.profile, self.exercise);
                self.restore(snapshot);
                HistoryStep::Restored
            }
            None => HistoryStep::NothingToUndo,
        }
    }

    pub fn redo(&mut self) -> HistoryStep {
        match self.history.redo(&self.records) {
            Some(snapshot) => {
                log::debug!("Redo on {}/{}", self.profile, self.exercise);
                self.restore(snapshot);
                HistoryStep::Restored
            }
            None => HistoryStep::NothingToRedo,
        }
    }

    fn mutate<R>(&mut self, f: impl FnOnce(&mut Vec<Record>) -> R) -> R {
        self.history.record_before_mutation(&self.records);
        let out = f(&mut self.records);
        self.dirty = true;
        self.notify();
        out
    }

    /// Replace the rows with a stored snapshot without touching the undo
    /// stacks.
    fn restore(&mut self, snapshot: Snapshot) {
        self.records = snapshot.records().to_vec();
        self.dirty = true;
        self.notify();
    }

    fn notify(&self) {
        for listener in &self.listeners {
            listener(self);
        }
    }

    fn check_index(&self, index: usize) -> Result<(), ValidationError> {
        if index < self.records.len() {
            Ok(())
        } else {
            Err(self.out_of_range(index))
        }
    }

    fn out_of_range(&self, index: usize) -> ValidationError {
        ValidationError::RowOutOfRange {
            index,
            len: self.records.len(),
        }
    }
}
