// Bounded undo/redo of period snapshots, owned by one editing session.
use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 20;

#[derive(Debug, Clone)]
pub struct History<T> {
    entries: VecDeque<T>,
    // Index of the snapshot currently shown; meaningless while empty.
    cursor: usize,
    capacity: usize,
}

impl<T: Clone> History<T> {
    pub fn new(capacity: usize) -> Self {
        History {
            entries: VecDeque::with_capacity(capacity.max(1)),
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Push a new snapshot. Anything redoable is discarded first, and the
    /// oldest snapshot falls out once capacity is exceeded.
    pub fn record(&mut self, snapshot: T) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push_back(snapshot);
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn undo(&mut self) -> Option<T> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).cloned()
    }

    pub fn redo(&mut self) -> Option<T> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor).cloned()
    }

    pub fn current(&self) -> Option<&T> {
        self.entries.get(self.cursor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 1-based position of the current snapshot, 0 while empty.
    pub fn position(&self) -> usize {
        if self.entries.is_empty() {
            0
        } else {
            self.cursor + 1
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}

impl<T: Clone> Default for History<T> {
    fn default() -> Self {
        History::new(DEFAULT_CAPACITY)
    }
}
