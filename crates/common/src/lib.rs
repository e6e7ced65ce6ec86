//! Shared types used across the database crates: the canonical error
//! enum, runtime configuration, row/result-set representations, and the
//! `Index` contract implemented by the pluggable secondary index crates.

pub mod index;

use serde::{Deserialize, Serialize};
use std::{io, path::PathBuf};
use thiserror::Error;
use types::{SqlType, Value};

/// Monotonic transaction identifier minted by the transaction manager.
pub type TxnId = u64;

/// 64-bit unsigned row identifier, the value type of every secondary index.
pub type RowId = u64;

/// Positional row representation backed by `types::Value`.
///
/// # Examples
/// - `Row::new(vec![Value::Int(1)])`
/// - `Row::new(vec![Value::Text("alice".into()), Value::Bool(true)])`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::new(values)
    }
}

/// One column of a [`ResultSet`]: a name, a declared data type, the
/// column's values, and an optional null bitmap (`true` = not null). When
/// the bitmap is absent every value is assumed non-null.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResultColumn {
    pub name: String,
    pub data_type: SqlType,
    pub bytes: Vec<Value>,
    pub null_bitmap: Option<Vec<bool>>,
}

impl ResultColumn {
    pub fn new(name: impl Into<String>, data_type: SqlType, bytes: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            data_type,
            bytes,
            null_bitmap: None,
        }
    }

    /// Reads the value at `row`. Fails with `IndexOutOfBounds` if `row` is
    /// past the column's length, and with `NullValue` if the row is marked
    /// null (by bitmap, or by holding `Value::Null` when no bitmap is set).
    pub fn get(&self, row: usize) -> DbResult<&Value> {
        let value = self.bytes.get(row).ok_or(DbError::IndexOutOfBounds)?;
        if let Some(bitmap) = &self.null_bitmap {
            let not_null = *bitmap.get(row).ok_or(DbError::IndexOutOfBounds)?;
            if !not_null {
                return Err(DbError::NullValue);
            }
        } else if value.is_null() {
            return Err(DbError::NullValue);
        }
        Ok(value)
    }
}

/// Column-oriented query output. Every column shares `row_count`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<ResultColumn>,
    pub row_count: usize,
}

impl ResultSet {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            row_count: 0,
        }
    }

    /// Builds a result set from a set of column names, a matching schema,
    /// and the row-major data produced by the executor.
    pub fn from_rows(columns: Vec<(String, SqlType)>, rows: Vec<Row>) -> Self {
        let row_count = rows.len();
        let mut result_columns: Vec<ResultColumn> = columns
            .into_iter()
            .map(|(name, ty)| ResultColumn::new(name, ty, Vec::with_capacity(row_count)))
            .collect();

        for row in rows {
            for (idx, value) in row.values.into_iter().enumerate() {
                if let Some(col) = result_columns.get_mut(idx) {
                    col.bytes.push(value);
                }
            }
        }

        Self {
            columns: result_columns,
            row_count,
        }
    }

    pub fn single_column(name: impl Into<String>, data_type: SqlType, values: Vec<Value>) -> Self {
        let row_count = values.len();
        Self {
            columns: vec![ResultColumn::new(name, data_type, values)],
            row_count,
        }
    }

    /// Informational single-row, single-column text result set, used by the
    /// executor to surface a message without raising an error.
    pub fn message(text: impl Into<String>) -> Self {
        Self::single_column("message", SqlType::Text, vec![Value::Text(text.into())])
    }

    pub fn get(&self, col: usize, row: usize) -> DbResult<&Value> {
        let column = self.columns.get(col).ok_or(DbError::IndexOutOfBounds)?;
        column.get(row)
    }
}

/// Canonical error type shared across database subsystems. Grouped by cause,
/// matching the taxonomy the rest of the crate documentation refers to.
#[derive(Error, Debug)]
pub enum DbError {
    // Input / shape
    #[error("empty query")]
    EmptyQuery,
    #[error("invalid syntax: {0}")]
    InvalidSyntax(String),
    #[error("key must not be empty")]
    EmptyKey,
    #[error("column count mismatch: expected {expected}, found {found}")]
    ColumnCountMismatch { expected: usize, found: usize },
    #[error("unsupported key type for index")]
    UnsupportedKeyType,
    #[error("predicate required for this plan")]
    MissingPredicate,
    #[error("table name required")]
    MissingTableName,
    #[error("unsupported query type: {0}")]
    UnsupportedQueryType(String),
    #[error("unsupported logical node type: {0}")]
    UnsupportedLogicalNodeType(String),
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    // Catalog / state
    #[error("table not found: {0}")]
    TableNotFound(String),
    #[error("table already exists: {0}")]
    TableAlreadyExists(String),
    #[error("index not found: {0}")]
    IndexNotFound(String),

    // Transaction
    #[error("transaction is not active")]
    TransactionNotActive,
    #[error("lock conflict")]
    LockConflict,

    // Storage
    #[error("failed to open store: {0}")]
    OpenFailed(String),
    #[error("store is closed")]
    Closed,
    #[error("store is not initialized")]
    NotInitialized,
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("read failed: {0}")]
    ReadFailed(String),
    #[error("disk read error: {0}")]
    DiskReadError(String),
    #[error("disk write error: {0}")]
    DiskWriteError(String),
    #[error("backup engine failed: {0}")]
    BackupEngineFailed(String),
    #[error("backup failed: {0}")]
    BackupFailed(String),
    #[error("restore failed: {0}")]
    RestoreFailed(String),
    #[error("backup corrupted: {0}")]
    BackupCorrupted(String),
    #[error("file not found: {0}")]
    FileNotFound(String),

    // Iterator
    #[error("invalid iterator state")]
    InvalidIterator,
    #[error("failed to read iterator key")]
    IteratorKeyFailed,
    #[error("failed to read iterator value")]
    IteratorValueFailed,
    #[error("iterator not initialized")]
    IteratorNotInitialized,

    // Result access
    #[error("value is null")]
    NullValue,
    #[error("index out of bounds")]
    IndexOutOfBounds,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Runtime configuration for the database components.
///
/// # Example
/// ```
/// use common::Config;
/// use std::path::PathBuf;
///
/// let config = Config::builder()
///     .data_dir(PathBuf::from("./my_db"))
///     .wal_enabled(true)
///     .build();
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Directory where the KV store's files and `wal.log` live.
    #[builder(default = PathBuf::from("./db_data"))]
    pub data_dir: PathBuf,
    /// Controls whether the write-ahead log is enabled.
    #[builder(default = true)]
    pub wal_enabled: bool,
    /// Minimum table row count above which `TableScan`/`IndexScan`/
    /// `IndexRangeScan` receive a parallel degree greater than one.
    #[builder(default = 10_000)]
    pub parallel_threshold: u64,
    /// Ceiling on the planner's parallel degree.
    #[builder(default = 8)]
    pub max_parallel_degree: u64,
    /// Whether a GPU is declared available to the planner's cost hook.
    #[builder(default = false)]
    pub gpu_available: bool,
    /// When set, every node is marked `use_gpu` regardless of the cost hook.
    #[builder(default = false)]
    pub gpu_force_enabled: bool,
    /// Return demo rows from `TableScan` for a handful of well-known table
    /// names when the table does not exist in the catalog. Exists as an
    /// explicit flag (rather than unconditional behavior) per the
    /// "DatabaseContext flag" design note.
    #[builder(default = true)]
    pub demo_fallback_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./db_data"),
            wal_enabled: true,
            parallel_threshold: 10_000,
            max_parallel_degree: 8,
            gpu_available: false,
            gpu_force_enabled: false,
            demo_fallback_enabled: true,
        }
    }
}

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::{
        Config, DbError, DbResult, ResultColumn, ResultSet, Row, RowId, TxnId,
    };
    pub use types::{SqlType, Value};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_are_sane() {
        let cfg = Config::default();
        assert!(cfg.wal_enabled);
        assert_eq!(cfg.parallel_threshold, 10_000);
    }

    #[test]
    fn db_error_formats_cleanly() {
        let err = DbError::TableNotFound("users".into());
        assert!(format!("{err}").contains("users"));
    }

    #[test]
    fn io_error_converts() {
        let e = io::Error::other("oops");
        let db_err: DbError = e.into();
        assert!(matches!(db_err, DbError::Io(_)));
    }

    #[test]
    fn result_set_from_rows_shares_row_count() {
        let rs = ResultSet::from_rows(
            vec![("id".into(), SqlType::Int), ("name".into(), SqlType::Text)],
            vec![
                Row::new(vec![Value::Int(1), Value::Text("a".into())]),
                Row::new(vec![Value::Int(2), Value::Text("b".into())]),
            ],
        );
        assert_eq!(rs.row_count, 2);
        assert_eq!(rs.columns.len(), 2);
        assert_eq!(rs.get(0, 1).unwrap(), &Value::Int(2));
    }

    #[test]
    fn reading_null_value_fails() {
        let rs = ResultSet::single_column("x", SqlType::Int, vec![Value::Null]);
        assert!(matches!(rs.get(0, 0), Err(DbError::NullValue)));
    }

    #[test]
    fn reading_out_of_bounds_fails() {
        let rs = ResultSet::single_column("x", SqlType::Int, vec![Value::Int(1)]);
        assert!(matches!(rs.get(0, 5), Err(DbError::IndexOutOfBounds)));
    }
}
