//! Skiplist secondary index: an in-memory `i64 → u64` mapping backed by
//! `crossbeam_skiplist::SkipMap`, exposing the same `common::index::Index`
//! contract as the ordered-tree crate so the planner and executor can pick
//! either kind interchangeably.

use common::index::Index;
use crossbeam_skiplist::SkipMap;

/// A skiplist index over one `(table, column)` pair.
pub struct SkiplistIndex {
    name: String,
    table: String,
    column: String,
    entries: SkipMap<i64, u64>,
}

impl SkiplistIndex {
    pub fn create(
        name: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            column: column.into(),
            entries: SkipMap::new(),
        }
    }

    /// Returns `(key, row_id)` pairs with `low <= key <= high`, in key
    /// order, mirroring the ordered-tree index's range helper.
    pub fn range(&self, low: i64, high: i64) -> Vec<(i64, u64)> {
        self.entries
            .range(low..=high)
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }
}

impl Index for SkiplistIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn table(&self) -> &str {
        &self.table
    }

    fn column(&self) -> &str {
        &self.column
    }

    fn insert(&self, key: i64, row_id: u64) {
        self.entries.insert(key, row_id);
    }

    fn get(&self, key: i64) -> Option<u64> {
        self.entries.get(&key).map(|entry| *entry.value())
    }

    fn remove(&self, key: i64) -> bool {
        self.entries.remove(&key).is_some()
    }

    fn count(&self) -> usize {
        self.entries.len()
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let idx = SkiplistIndex::create("idx_id", "users", "id");
        idx.insert(42, 7);
        assert_eq!(idx.get(42), Some(7));
        assert_eq!(idx.get(99), None);
    }

    #[test]
    fn duplicate_key_is_last_writer_wins() {
        let idx = SkiplistIndex::create("idx_id", "users", "id");
        idx.insert(1, 10);
        idx.insert(1, 20);
        assert_eq!(idx.get(1), Some(20));
        assert_eq!(idx.count(), 1);
    }

    #[test]
    fn remove_reports_existence() {
        let idx = SkiplistIndex::create("idx_id", "users", "id");
        idx.insert(5, 1);
        assert!(idx.remove(5));
        assert!(!idx.remove(5));
    }

    #[test]
    fn clear_empties_index() {
        let idx = SkiplistIndex::create("idx_id", "users", "id");
        idx.insert(1, 1);
        idx.insert(2, 2);
        idx.clear();
        assert_eq!(idx.count(), 0);
    }

    #[test]
    fn range_is_inclusive_and_ordered() {
        let idx = SkiplistIndex::create("idx_id", "users", "id");
        for (k, v) in [(1, 10), (5, 50), (3, 30), (10, 100)] {
            idx.insert(k, v);
        }
        assert_eq!(idx.range(2, 5), vec![(3, 30), (5, 50)]);
    }

    #[test]
    fn behaves_equivalently_to_ordered_tree_on_the_shared_contract() {
        let idx = SkiplistIndex::create("idx", "t", "c");
        idx.insert(1, 100);
        idx.insert(2, 200);
        assert_eq!(idx.count(), 2);
        assert!(idx.remove(1));
        assert_eq!(idx.get(1), None);
        assert_eq!(idx.get(2), Some(200));
    }
}
