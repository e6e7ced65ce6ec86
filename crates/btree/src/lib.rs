//! Ordered-tree secondary index: an in-memory `i64 → u64` mapping backed by
//! `std::collections::BTreeMap`, exposing the shared `common::index::Index`
//! contract. Index state is purely in-memory; it is rebuilt by the caller
//! (not persisted by the WAL).

use common::index::Index;
use std::{
    collections::BTreeMap,
    sync::RwLock,
};

/// An ordered-tree index over one `(table, column)` pair.
pub struct OrderedTreeIndex {
    name: String,
    table: String,
    column: String,
    entries: RwLock<BTreeMap<i64, u64>>,
}

impl OrderedTreeIndex {
    pub fn create(name: impl Into<String>, table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            column: column.into(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns `(key, row_id)` pairs with `low <= key <= high`, in key
    /// order. Not part of the minimal index contract, but the ordered
    /// shape makes range scans cheap, and the executor's `IndexRangeScan`
    /// node relies on it.
    pub fn range(&self, low: i64, high: i64) -> Vec<(i64, u64)> {
        self.entries
            .read()
            .unwrap()
            .range(low..=high)
            .map(|(k, v)| (*k, *v))
            .collect()
    }
}

impl Index for OrderedTreeIndex {
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
        self.entries.write().unwrap().insert(key, row_id);
    }

    fn get(&self, key: i64) -> Option<u64> {
        self.entries.read().unwrap().get(&key).copied()
    }

    fn remove(&self, key: i64) -> bool {
        self.entries.write().unwrap().remove(&key).is_some()
    }

    fn count(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn insert_and_get() {
        let idx = OrderedTreeIndex::create("idx_id", "users", "id");
        idx.insert(42, 7);
        assert_eq!(idx.get(42), Some(7));
        assert_eq!(idx.get(99), None);
    }

    #[test]
    fn duplicate_key_is_last_writer_wins() {
        let idx = OrderedTreeIndex::create("idx_id", "users", "id");
        idx.insert(1, 10);
        idx.insert(1, 20);
        assert_eq!(idx.get(1), Some(20));
        assert_eq!(idx.count(), 1);
    }

    #[test]
    fn remove_reports_existence() {
        let idx = OrderedTreeIndex::create("idx_id", "users", "id");
        idx.insert(5, 1);
        assert!(idx.remove(5));
        assert!(!idx.remove(5));
        assert_eq!(idx.get(5), None);
    }

    #[test]
    fn clear_empties_index() {
        let idx = OrderedTreeIndex::create("idx_id", "users", "id");
        idx.insert(1, 1);
        idx.insert(2, 2);
        idx.clear();
        assert_eq!(idx.count(), 0);
    }

    #[test]
    fn range_is_inclusive_and_ordered() {
        let idx = OrderedTreeIndex::create("idx_id", "users", "id");
        for (k, v) in [(1, 10), (5, 50), (3, 30), (10, 100)] {
            idx.insert(k, v);
        }
        assert_eq!(idx.range(2, 5), vec![(3, 30), (5, 50)]);
    }

    proptest! {
        #[test]
        fn insert_get_remove_agree(keys in proptest::collection::vec(any::<i64>(), 0..50)) {
            let idx = OrderedTreeIndex::create("idx", "t", "c");
            for (i, k) in keys.iter().enumerate() {
                idx.insert(*k, i as u64);
            }
            for k in &keys {
                prop_assert!(idx.get(*k).is_some());
            }
        }
    }
}
