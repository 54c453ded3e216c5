//! Reorder buffer for results that complete out of order

use std::collections::BTreeMap;

/// Releases items strictly in index order, starting at 0
#[derive(Debug)]
pub struct OrderedMerge<T> {
    next: usize,
    pending: BTreeMap<usize, T>,
}

impl<T> Default for OrderedMerge<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OrderedMerge<T> {
    pub fn new() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Accept item `index` and return every item that is now contiguous
    /// with what was already released.
    pub fn push(&mut self, index: usize, item: T) -> Vec<T> {
        if index < self.next || self.pending.contains_key(&index) {
            tracing::warn!(index, "Ignoring duplicate result");
            return Vec::new();
        }
        self.pending.insert(index, item);

        let mut ready = Vec::new();
        while let Some(item) = self.pending.remove(&self.next) {
            ready.push(item);
            self.next += 1;
        }
        ready
    }

    /// Index of the next item to be released
    pub fn next_index(&self) -> usize {
        self.next
    }

    /// Items held back waiting for an earlier index
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
