//! Primary-key index for indexed tables

use ahash::AHashMap;

use crate::cell::Cell;

/// Maps primary-key values to their row position
#[derive(Debug, Clone, Default)]
pub struct RowIndex {
    rows: AHashMap<String, usize>,
}

impl RowIndex {
    /// Create a new, empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the row holding a key
    pub fn get(&self, key: &Cell) -> Option<usize> {
        self.rows.get(&key.key()).copied()
    }

    pub fn insert(&mut self, key: &Cell, row: usize) {
        self.rows.insert(key.key(), row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Clear the index
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}
