//! In-memory schema registry: tables keyed by name, each holding an ordered
//! column list and a growing list of row versions, plus the metadata
//! registry for secondary indexes consulted by the planner.

use ahash::RandomState;
use common::{DbError, DbResult, Row, TxnId};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use types::{SqlType, Value};

/// One column of a table schema: a name and its declared type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ty: SqlType,
}

/// A row tagged with the transaction that created it and, if deleted, the
/// transaction that deleted it. Used to implement isolation-level-driven
/// visibility without mutating history in place.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RowVersion {
    pub values: Vec<Value>,
    pub created_by: TxnId,
    pub deleted_by: Option<TxnId>,
}

/// A table: an ordered column list and its accumulated row versions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<RowVersion>,
}

impl Table {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Metadata describing a registered secondary index. The index's live
/// key→row-id structure is owned by the execution context, not the
/// catalog; the catalog only remembers that it exists, over which
/// `(table, column)`, and of which kind, so the planner can select it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexMeta {
    pub name: String,
    pub table: String,
    pub column: String,
    pub kind: common::index::IndexKind,
}

/// Per-(table, column) statistics feeding the planner's selectivity
/// heuristics and parallelism decision.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ColumnStats {
    pub distinct_count: u64,
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub null_count: u64,
    pub histogram: Option<Vec<(Value, u64)>>,
}

/// Per-table statistics: row count and row size estimate, plus one
/// [`ColumnStats`] per column the caller has registered stats for.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TableStats {
    pub row_count: u64,
    pub row_size_estimate: u64,
    pub columns: std::collections::HashMap<String, ColumnStats>,
}

/// In-memory registry of tables, index metadata, and statistics, keyed by
/// name.
#[derive(Default)]
pub struct Catalog {
    tables: HashMap<String, Table, RandomState>,
    indexes: HashMap<String, IndexMeta, RandomState>,
    stats: HashMap<String, TableStats, RandomState>,
}

/// On-disk representation used by `save`/`load`, independent of the
/// `hashbrown`-backed in-memory indices used for fast lookup.
#[derive(Serialize, Deserialize)]
struct CatalogSnapshot {
    tables: Vec<Table>,
    indexes: Vec<IndexMeta>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table with an empty row list. Fails with
    /// `TableAlreadyExists` if `name` is taken.
    pub fn create_table(&mut self, name: &str, columns: Vec<Column>) -> DbResult<()> {
        if self.tables.contains_key(name) {
            return Err(DbError::TableAlreadyExists(name.to_string()));
        }
        self.tables.insert(
            name.to_string(),
            Table {
                name: name.to_string(),
                columns,
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn drop_table(&mut self, name: &str) -> DbResult<()> {
        self.tables
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    /// Appends a row created by `created_by` (use `0` for the
    /// non-transactional / recovery path). Fails with `TableNotFound` or
    /// `ColumnCountMismatch`.
    pub fn append_row(
        &mut self,
        table: &str,
        values: Vec<Value>,
        created_by: TxnId,
    ) -> DbResult<()> {
        let table = self
            .tables
            .get_mut(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;

        if values.len() != table.columns.len() {
            return Err(DbError::ColumnCountMismatch {
                expected: table.columns.len(),
                found: values.len(),
            });
        }

        table.rows.push(RowVersion {
            values,
            created_by,
            deleted_by: None,
        });
        Ok(())
    }

    /// Pops the most recently appended row version from `table`. Used to
    /// revert an `append_row` whose subsequent WAL write failed.
    pub fn remove_last_row(&mut self, table: &str) -> DbResult<()> {
        let table = self
            .tables
            .get_mut(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;
        table.rows.pop();
        Ok(())
    }

    pub fn lookup(&self, table: &str) -> Option<&Table> {
        self.tables.get(table)
    }

    pub fn table_mut(&mut self, table: &str) -> Option<&mut Table> {
        self.tables.get_mut(table)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Every row in `table`, ignoring visibility. Used by the
    /// non-transactional fast path and by recovery.
    pub fn iterate(&self, table: &str) -> DbResult<Vec<Row>> {
        let table = self
            .lookup(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;
        Ok(table
            .rows
            .iter()
            .map(|rv| Row::new(rv.values.clone()))
            .collect())
    }

    /// Rows in `table` visible to `reader`, per the rule in the data
    /// model: visible if created by the reader or by a transaction that has
    /// committed, and not deleted by the reader or by a transaction that
    /// has committed. An aborted creator's rows never become visible to
    /// anyone but stay invisible forever, matching "abort(T) implies none
    /// of T's writes are visible". `read_uncommitted` bypasses the rule
    /// entirely (every non-deleted row, including in-progress writes, is
    /// visible).
    pub fn iterate_visible(
        &self,
        table: &str,
        reader: TxnId,
        is_committed: impl Fn(TxnId) -> bool,
        read_uncommitted: bool,
    ) -> DbResult<Vec<Row>> {
        let table = self
            .lookup(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;

        let rows = table
            .rows
            .iter()
            .filter(|rv| {
                if read_uncommitted {
                    return rv.deleted_by.is_none();
                }
                let created_visible = rv.created_by == reader || is_committed(rv.created_by);
                let deleted_visible = match rv.deleted_by {
                    None => true,
                    Some(deleter) => !(deleter == reader || is_committed(deleter)),
                };
                created_visible && deleted_visible
            })
            .map(|rv| Row::new(rv.values.clone()))
            .collect();

        Ok(rows)
    }

    /// Registers index metadata. Fails if the name is already taken.
    pub fn register_index(&mut self, meta: IndexMeta) -> DbResult<()> {
        if self.indexes.contains_key(&meta.name) {
            return Err(DbError::TableAlreadyExists(meta.name));
        }
        self.indexes.insert(meta.name.clone(), meta);
        Ok(())
    }

    pub fn index_by_name(&self, name: &str) -> Option<&IndexMeta> {
        self.indexes.get(name)
    }

    /// The first registered index (if any) covering `(table, column)`.
    pub fn index_for_column(&self, table: &str, column: &str) -> Option<&IndexMeta> {
        self.indexes
            .values()
            .find(|m| m.table == table && m.column.eq_ignore_ascii_case(column))
    }

    pub fn indexes(&self) -> impl Iterator<Item = &IndexMeta> {
        self.indexes.values()
    }

    /// Replaces the registered statistics for `table`.
    pub fn set_stats(&mut self, table: &str, stats: TableStats) {
        self.stats.insert(table.to_string(), stats);
    }

    pub fn stats(&self, table: &str) -> Option<&TableStats> {
        self.stats.get(table)
    }

    pub fn column_stats(&self, table: &str, column: &str) -> Option<&ColumnStats> {
        self.stats.get(table)?.columns.get(column)
    }

    /// The live row count for `table`, from statistics if registered,
    /// falling back to the catalog's own row list length.
    pub fn row_count(&self, table: &str) -> u64 {
        if let Some(stats) = self.stats.get(table) {
            return stats.row_count;
        }
        self.lookup(table).map(|t| t.rows.len() as u64).unwrap_or(0)
    }

    /// Persists the catalog as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> DbResult<()> {
        let snapshot = CatalogSnapshot {
            tables: self.tables.values().cloned().collect(),
            indexes: self.indexes.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| DbError::WriteFailed(e.to_string()))?;
        std::fs::write(path, bytes).map_err(|e| DbError::WriteFailed(e.to_string()))
    }

    /// Loads a catalog previously written by `save`. Returns an empty
    /// catalog if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let bytes = std::fs::read(path).map_err(|e| DbError::ReadFailed(e.to_string()))?;
        let snapshot: CatalogSnapshot =
            serde_json::from_slice(&bytes).map_err(|e| DbError::ReadFailed(e.to_string()))?;

        let mut catalog = Self::new();
        for table in snapshot.tables {
            catalog.tables.insert(table.name.clone(), table);
        }
        for index in snapshot.indexes {
            catalog.indexes.insert(index.name.clone(), index);
        }
        Ok(catalog)
    }
}
