//! Bounded, snapshot-based undo history.

use crate::snapshot::SceneSnapshot;
use std::collections::VecDeque;

/// Default number of snapshots kept per page.
pub const DEFAULT_HISTORY_CAPACITY: usize = 30;

/// Snapshots taken after each committed local mutation, oldest first.
///
/// The top entry always mirrors the scene at the time it was pushed, so
/// undoing means going back to the entry below it.
#[derive(Debug, Clone)]
pub struct HistoryStack {
    entries: VecDeque<SceneSnapshot>,
    capacity: usize,
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryStack {
    /// Create a stack holding at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a snapshot, evicting the oldest entry past capacity.
    pub fn push(&mut self, snapshot: SceneSnapshot) {
        self.entries.push_back(snapshot);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Pop the top entry and return the state to restore: the entry below
    /// it, or an empty snapshot if it was the only one.
    ///
    /// Returns None (and does nothing) when the stack is empty.
    pub fn undo(&mut self) -> Option<SceneSnapshot> {
        self.entries.pop_back()?;
        Some(self.entries.back().cloned().unwrap_or_default())
    }

    /// The most recent entry.
    pub fn top(&self) -> Option<&SceneSnapshot> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
