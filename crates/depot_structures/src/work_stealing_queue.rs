//! Per-worker double-ended queue
//!
//! The owning worker pushes and pops at the front, so its own work runs
//! most-recent-first. Other workers steal from the back, taking the oldest
//! item. A short mutex guards the deque; owner and thieves only meet there.

use core::fmt;
use std::collections::VecDeque;

use parking_lot::Mutex;

/// Double-ended work queue with owner/thief ends
pub struct WorkStealingQueue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> WorkStealingQueue<T> {
    /// Create a new empty queue
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    /// Push an item at the owner's end
    pub fn push(&self, item: T) {
        self.items.lock().push_front(item);
    }

    /// Pop the most recently pushed item (owner side)
    pub fn try_pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Take the oldest item (thief side)
    pub fn try_steal(&self) -> Option<T> {
        self.items.lock().pop_back()
    }

    /// Check if empty (approximate)
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Get approximate length
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Remove and return everything still queued, oldest first
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain(..).rev().collect()
    }
}

impl<T> Default for WorkStealingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for WorkStealingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkStealingQueue")
            .field("len", &self.len())
            .finish()
    }
}
