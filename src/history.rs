//! Batch composition and undo/redo history (§4.7).

use std::time::{Duration, Instant};

use crate::clock::SharedClock;
use crate::error::SyncError;
use crate::ot::TextOperation;

fn char_count(s: &str) -> u64 {
    s.chars().count() as u64
}

/// `startBatch()`/`endBatch()`/`cancelBatch()`: primitives issued while a
/// batch is open are composed into an accumulator and applied to a scratch
/// replica used only to compute subsequent edits' base lengths, instead of
/// being fed to the OT state machine one at a time.
#[derive(Debug, Clone)]
pub struct Batch {
    scratch: String,
    accumulator: TextOperation,
}

impl Batch {
    pub fn start(current_document: &str) -> Self {
        Self {
            scratch: current_document.to_string(),
            accumulator: TextOperation::identity(char_count(current_document)),
        }
    }

    pub fn scratch_document(&self) -> &str {
        &self.scratch
    }

    /// Folds one more primitive's operation (computed against
    /// `scratch_document()`) into the batch.
    pub fn record(&mut self, op: TextOperation) -> Result<(), SyncError> {
        self.scratch = op.apply(&self.scratch)?;
        self.accumulator = self.accumulator.compose(&op)?;
        Ok(())
    }

    /// `endBatch()`: consumes the batch, returning the single composed
    /// operation to submit.
    pub fn into_operation(self) -> TextOperation {
        self.accumulator
    }
}

/// `HistoryEntry { inverse, at, groupKey }`.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub inverse: TextOperation,
    pub at: Instant,
    pub group_key: u64,
}

/// Two stacks of [`HistoryEntry`], merging entries created within
/// `undo_group_interval` of each other.
#[derive(Debug)]
pub struct UndoHistory {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<TextOperation>,
    clock: SharedClock,
    group_interval: Duration,
    max_size: usize,
    next_group_key: u64,
}

impl UndoHistory {
    pub fn new(clock: SharedClock, group_interval: Duration, max_size: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            clock,
            group_interval,
            max_size,
            next_group_key: 0,
        }
    }

    /// Records the inverse of a just-submitted edit (batched or not) and
    /// clears the redo stack. A push within `undo_group_interval` of the
    /// previous one is merged into the same entry by composing the
    /// inverses in reverse order (new-then-old), matching forward
    /// composition of the original edits.
    pub fn record(&mut self, inverse: TextOperation) {
        self.redo_stack.clear();
        let now = self.clock.now();

        if let Some(last) = self.undo_stack.last_mut() {
            if now.duration_since(last.at) <= self.group_interval {
                if let Ok(merged) = inverse.compose(&last.inverse) {
                    last.inverse = merged;
                    last.at = now;
                    return;
                }
            }
        }

        self.next_group_key += 1;
        self.undo_stack.push(HistoryEntry {
            inverse,
            at: now,
            group_key: self.next_group_key,
        });
        if self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
        }
    }

    /// Pops the most recent undo entry's inverse, for the caller to submit
    /// through the OT state machine. Call [`Self::record_redo`] once the
    /// submission's own inverse (computed against the pre-undo document)
    /// is known.
    pub fn pop_undo(&mut self) -> Option<TextOperation> {
        self.undo_stack.pop().map(|e| e.inverse)
    }

    pub fn record_redo(&mut self, op: TextOperation) {
        self.redo_stack.push(op);
    }

    /// Pushes `inverse` onto the undo stack without clearing the redo
    /// stack, unlike [`Self::record`]. Used by `redo()`: replaying a redo
    /// operation must itself become undoable again without discarding any
    /// further redo entries still queued ahead of it.
    pub fn push_undo_after_redo(&mut self, inverse: TextOperation) {
        self.next_group_key += 1;
        self.undo_stack.push(HistoryEntry {
            inverse,
            at: self.clock.now(),
            group_key: self.next_group_key,
        });
        if self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
        }
    }

    /// Pops the most recent redo operation, for the caller to submit
    /// through the OT state machine.
    pub fn pop_redo(&mut self) -> Option<TextOperation> {
        self.redo_stack.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }
}
