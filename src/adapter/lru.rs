//! Recency tracking for the memory adapter's capacity bound.

use std::collections::VecDeque;

// == LRU Tracker ==
/// Keys ordered by last use: front is most recent, back is the eviction candidate.
#[derive(Debug, Default)]
pub(crate) struct LruTracker {
    order: VecDeque<String>,
}

impl LruTracker {
    /// Marks `key` as just used.
    pub fn touch(&mut self, key: &str) {
        if self.order.front().map(String::as_str) == Some(key) {
            return;
        }
        self.remove(key);
        self.order.push_front(key.to_string());
    }

    pub fn remove(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
    }

    /// Pops the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<String> {
        self.order.pop_back()
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.order.len()
    }
}
