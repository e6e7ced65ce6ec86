//! The shared secondary-index contract. Both the ordered-tree crate
//! (`btree`) and the skiplist crate (`skiplist`) implement this trait so
//! the planner and executor can treat either kind interchangeably — a
//! tagged variant over the two shapes, rather than a type-erased pointer
//! with downcasting.

/// Key→row-id mapping exposed identically by every index kind.
///
/// Duplicate keys replace the existing mapping (last-writer-wins); see the
/// open question about multi-valued keys.
pub trait Index: Send + Sync {
    fn name(&self) -> &str;
    fn table(&self) -> &str;
    fn column(&self) -> &str;

    /// Inserts or overwrites the mapping for `key`.
    fn insert(&self, key: i64, row_id: u64);

    /// Looks up the row id mapped to `key`, if any.
    fn get(&self, key: i64) -> Option<u64>;

    /// Removes the mapping for `key`, returning whether it existed.
    fn remove(&self, key: i64) -> bool;

    /// Number of live entries.
    fn count(&self) -> usize;

    /// Empties the index.
    fn clear(&self);
}

/// The two interchangeable index shapes named in the data model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum IndexKind {
    OrderedTree,
    Skiplist,
}

impl IndexKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            IndexKind::OrderedTree => "ordered-tree",
            IndexKind::Skiplist => "skiplist",
        }
    }
}
