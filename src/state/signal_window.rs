use std::collections::VecDeque;

use crate::models::Signal;

/// Number of signals kept on screen.
pub const SIGNAL_WINDOW: usize = 20;

/// Most-recent-first window of signals, unique by id.
///
/// Only signals with a confidence in [0, 1] are ever admitted.
#[derive(Debug, Clone)]
pub struct SignalWindow {
    entries: VecDeque<Signal>,
    capacity: usize,
}

impl Default for SignalWindow {
    fn default() -> Self {
        Self::with_capacity(SIGNAL_WINDOW)
    }
}

impl SignalWindow {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Prepend a newly arrived signal, evicting the oldest past capacity.
    ///
    /// Returns `false` if a signal with the same id is already present or
    /// its confidence is out of range.
    pub fn push(&mut self, signal: Signal) -> bool {
        if !signal.has_valid_confidence() || self.contains(&signal.id) {
            return false;
        }
        self.entries.push_front(signal);
        self.entries.truncate(self.capacity);
        true
    }

    /// Merge a fetched list into the window, keeping the newest `capacity`
    /// entries ordered by creation time.
    pub fn seed(&mut self, fetched: Vec<Signal>) {
        for signal in fetched {
            if !signal.has_valid_confidence() {
                tracing::debug!(signal_id = %signal.id, confidence = %signal.confidence, "Dropping fetched signal");
                continue;
            }
            if !self.contains(&signal.id) {
                self.entries.push_back(signal);
            }
        }
        self.entries
            .make_contiguous()
            .sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.entries.truncate(self.capacity);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|s| s.id == id)
    }

    pub fn latest(&self) -> Option<&Signal> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signal> {
        self.entries.iter()
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
}
