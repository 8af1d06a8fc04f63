//! Bounded undo history for the manager view.
//!
//! Snapshots are full states captured immediately before each mutation.
//! The stack also remembers the engine's remote epoch at the time of the
//! snapshots: once another view's update has been applied locally, older
//! snapshots describe a timeline the other views never saw, so they are
//! discarded instead of being resurrected by undo.

use std::collections::VecDeque;

use crate::quiz::QuizState;

/// Maximum number of snapshots kept
pub const HISTORY_CAPACITY: usize = 20;

#[derive(Debug, Clone)]
pub struct HistoryStack {
    entries: VecDeque<QuizState>,
    capacity: usize,
    epoch: u64,
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStack {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            epoch: 0,
        }
    }

    /// Capture a snapshot, evicting the oldest one beyond capacity
    pub fn push(&mut self, snapshot: QuizState) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    /// Remove and return the most recent snapshot
    pub fn pop(&mut self) -> Option<QuizState> {
        self.entries.pop_back()
    }

    /// Drop all snapshots if remote updates arrived since they were taken.
    ///
    /// Returns true if the history was invalidated.
    pub fn sync_epoch(&mut self, remote_epoch: u64) -> bool {
        if remote_epoch == self.epoch {
            return false;
        }
        self.epoch = remote_epoch;
        let invalidated = !self.entries.is_empty();
        self.entries.clear();
        invalidated
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
