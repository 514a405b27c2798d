//! Anti-repeat memory for media replies
//!
//! Remembers the last few media picks so the prompt can steer the backend
//! away from sending the same meme twice in a row.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use tracing::debug;

/// A media pick will not be offered again within this many replies
pub const ANTI_REPEAT_CAPACITY: usize = 10;

/// Bounded FIFO of recently delivered media identifiers
#[derive(Debug)]
pub struct AntiRepeatWindow {
    capacity: usize,
    recent: Mutex<VecDeque<String>>,
}

impl Default for AntiRepeatWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl AntiRepeatWindow {
    pub fn new() -> Self {
        Self::with_capacity(ANTI_REPEAT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Identifiers to keep out of the next candidate list
    pub fn excluded(&self) -> HashSet<String> {
        self.lock().iter().cloned().collect()
    }

    /// Append a delivered pick, evicting the oldest when full
    pub fn record(&self, id: &str) {
        let mut recent = self.lock();
        while recent.len() >= self.capacity {
            if let Some(evicted) = recent.pop_front() {
                debug!("Anti-repeat evicted '{}'", evicted);
            }
        }
        recent.push_back(id.to_string());
    }

    /// Oldest first
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // The deque holds plain strings, so a poisoned guard is still coherent.
    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<String>> {
        self.recent.lock().unwrap_or_else(|e| e.into_inner())
    }
}
