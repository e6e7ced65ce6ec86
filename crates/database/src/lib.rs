//! Database façade: composes the KV store, WAL, catalog, transaction
//! manager, index registry, and planner/executor pipeline (§4.8). Routes
//! `CREATE TABLE`/`INSERT INTO` through the direct catalog+WAL path;
//! everything else through parse → plan → optimize → execute. Replays
//! the WAL on `recover` to rebuild catalog state after a crash.

use catalog::Catalog;
use common::index::{Index, IndexKind};
use common::{Config, DbError, DbResult, ResultSet};
use executor::{ExecutionContext, ExecutionMode, IndexRegistry};
use parser::Statement;
use planner::{GpuCostHook, Planner, PhysicalNode};
use std::path::Path;
use storage::KvStore;
use txn::TransactionManager;
use wal::Wal;

/// Owns every long-lived subsystem named in the data model's ownership
/// section: the catalog, the KV store handle, the WAL handle, the
/// transaction manager, and the index registry backing the execution
/// context. A single process holds at most one `Database` per data
/// directory.
pub struct Database {
    catalog: Catalog,
    store: KvStore,
    wal: Wal,
    txn_manager: TransactionManager,
    indexes: IndexRegistry,
    config: Config,
}

impl Database {
    /// Creates the data directory if absent and opens the KV store and
    /// WAL within it, with default configuration. Does not replay WAL
    /// records into the catalog — use `recover` after a crash.
    pub fn open(dir: impl AsRef<Path>) -> DbResult<Self> {
        Self::open_with_config(dir, Config::default())
    }

    pub fn open_with_config(dir: impl AsRef<Path>, config: Config) -> DbResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| DbError::OpenFailed(e.to_string()))?;

        let store = KvStore::open(&dir)?;
        let wal = Wal::open(&dir)?;
        let config = Config {
            data_dir: dir,
            ..config
        };

        Ok(Self {
            catalog: Catalog::new(),
            store,
            wal,
            txn_manager: TransactionManager::new(),
            indexes: IndexRegistry::new(),
            config,
        })
    }

    /// Opens `dir` and replays every WAL record into the catalog, in
    /// txn-id order, via the normal execute path with
    /// `ExecutionMode::Recovery` so replay never re-appends to the WAL.
    pub fn recover(dir: impl AsRef<Path>) -> DbResult<Self> {
        Self::recover_with_config(dir, Config::default())
    }

    pub fn recover_with_config(dir: impl AsRef<Path>, config: Config) -> DbResult<Self> {
        let mut db = Self::open_with_config(dir, config)?;
        db.replay_wal()?;
        Ok(db)
    }

    fn replay_wal(&mut self) -> DbResult<()> {
        let records: Vec<(u64, Vec<u8>)> = self
            .wal
            .records()
            .map(|(id, payload)| (id, payload.to_vec()))
            .collect();

        if let Some(&(max_id, _)) = records.last() {
            self.txn_manager.fast_forward(max_id + 1);
        }

        for (txn_id, payload) in records {
            let text = String::from_utf8_lossy(&payload).into_owned();

            let query = if let Some(rest) = text.strip_prefix("CREATE_TABLE:") {
                rest.splitn(2, ':').nth(1)
            } else if let Some(rest) = text.strip_prefix("INSERT:") {
                rest.splitn(2, ':').nth(1)
            } else {
                None
            };
            let Some(query) = query else { continue };

            let stmt = parser::parse_sql(query)?
                .pop()
                .ok_or(DbError::EmptyQuery)?;

            match stmt {
                Statement::CreateTable { name, columns } => {
                    executor::execute_create_table(
                        &name,
                        &columns,
                        query,
                        txn_id,
                        &mut self.catalog,
                        &mut self.wal,
                        ExecutionMode::Recovery,
                    )?;
                }
                Statement::Insert { table, values } => {
                    executor::execute_insert(
                        &table,
                        &values,
                        query,
                        txn_id,
                        &mut self.catalog,
                        &mut self.wal,
                        ExecutionMode::Recovery,
                    )?;
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Mints a fresh, globally unique transaction id from the transaction
    /// manager's own counter and immediately commits it, so the
    /// non-transactional direct write path never reuses an id — the WAL's
    /// `txn_id`-keyed storage would silently clobber an earlier record on
    /// reuse (see DESIGN.md).
    fn mint_txn_id(&mut self) -> common::TxnId {
        let id = self.txn_manager.begin();
        let _ = self.txn_manager.commit(id);
        id
    }

    /// Runs one query. `CREATE TABLE`/`INSERT INTO` (case-insensitively,
    /// leading whitespace tolerated) follow the direct catalog+WAL path;
    /// everything else goes through the planner and executor.
    pub fn execute(&mut self, query: &str) -> DbResult<ResultSet> {
        self.execute_with_gpu_hook(query, None)
    }

    pub fn execute_with_gpu_hook(
        &mut self,
        query: &str,
        gpu_hook: Option<GpuCostHook>,
    ) -> DbResult<ResultSet> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(DbError::EmptyQuery);
        }

        let upper = trimmed.to_ascii_uppercase();
        if upper.starts_with("CREATE TABLE") {
            return self.execute_create_table_direct(trimmed);
        }
        if upper.starts_with("INSERT INTO") {
            return self.execute_insert_direct(trimmed);
        }

        self.execute_pipeline(trimmed, gpu_hook)
    }

    fn execute_create_table_direct(&mut self, query: &str) -> DbResult<ResultSet> {
        let stmt = parser::parse_sql(query)?.pop().ok_or(DbError::EmptyQuery)?;
        let Statement::CreateTable { name, columns } = stmt else {
            return Err(DbError::InvalidSyntax("expected CREATE TABLE".into()));
        };

        let txn_id = self.mint_txn_id();
        executor::execute_create_table(
            &name,
            &columns,
            query,
            txn_id,
            &mut self.catalog,
            &mut self.wal,
            ExecutionMode::Normal,
        )?;
        Ok(ResultSet::message(format!("table {name} created")))
    }

    fn execute_insert_direct(&mut self, query: &str) -> DbResult<ResultSet> {
        let stmt = parser::parse_sql(query)?.pop().ok_or(DbError::EmptyQuery)?;
        let Statement::Insert { table, values } = stmt else {
            return Err(DbError::InvalidSyntax("expected INSERT INTO".into()));
        };

        let txn_id = self.mint_txn_id();
        executor::execute_insert(
            &table,
            &values,
            query,
            txn_id,
            &mut self.catalog,
            &mut self.wal,
            ExecutionMode::Normal,
        )?;
        Ok(ResultSet::message(format!("1 row inserted into {table}")))
    }

    fn execute_pipeline(&self, query: &str, gpu_hook: Option<GpuCostHook>) -> DbResult<ResultSet> {
        let stmt = parser::parse_sql(query)?.pop().ok_or(DbError::EmptyQuery)?;
        let plan = Planner::optimize(&stmt, &self.catalog, &self.config, gpu_hook)
            .map_err(remap_facade_error)?;

        let ctx = ExecutionContext {
            catalog: &self.catalog,
            indexes: &self.indexes,
            config: &self.config,
        };
        executor::execute(&plan, &ctx).map_err(remap_facade_error)
    }

    /// Builds the physical plan for `query` without running it, for tests
    /// and tooling that inspect planner decisions directly.
    pub fn plan(&self, query: &str) -> DbResult<PhysicalNode> {
        let stmt = parser::parse_sql(query)?.pop().ok_or(DbError::EmptyQuery)?;
        Planner::optimize(&stmt, &self.catalog, &self.config, None)
    }

    /// Registers a secondary index over `(table, column)`, of the given
    /// kind, in both the catalog's metadata registry and the live index
    /// registry the executor consults.
    pub fn register_index(
        &mut self,
        name: &str,
        table: &str,
        column: &str,
        kind: IndexKind,
    ) -> DbResult<()> {
        self.catalog.register_index(catalog::IndexMeta {
            name: name.to_string(),
            table: table.to_string(),
            column: column.to_string(),
            kind,
        })?;

        let index: Box<dyn Index> = match kind {
            IndexKind::OrderedTree => Box::new(btree::OrderedTreeIndex::create(name, table, column)),
            IndexKind::Skiplist => Box::new(skiplist::SkiplistIndex::create(name, table, column)),
        };
        self.indexes.register(index);
        Ok(())
    }

    /// Writes a KV-store snapshot plus `metadata.json` recording the
    /// current WAL position, alongside a copy of the WAL itself so that
    /// `restore` can rebuild the catalog by replaying it.
    pub fn backup(&self, dir: impl AsRef<Path>) -> DbResult<()> {
        let dir = dir.as_ref();
        self.store.backup(dir, self.wal.current_position())?;
        std::fs::copy(self.config.data_dir.join("wal.log"), dir.join("wal.log"))
            .map_err(|e| DbError::BackupFailed(e.to_string()))?;
        Ok(())
    }

    /// Restores a KV-store snapshot and WAL into `dir` and reopens both,
    /// then replays the WAL to rebuild the catalog.
    pub fn restore(dir: impl AsRef<Path>, backup_dir: impl AsRef<Path>) -> DbResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let backup_dir = backup_dir.as_ref();
        let (store, _wal_position) = KvStore::restore(&dir, backup_dir)?;

        std::fs::copy(backup_dir.join("wal.log"), dir.join("wal.log"))
            .map_err(|e| DbError::RestoreFailed(e.to_string()))?;
        let wal = Wal::open(&dir)?;

        let mut db = Self {
            catalog: Catalog::new(),
            store,
            wal,
            txn_manager: TransactionManager::new(),
            indexes: IndexRegistry::new(),
            config: Config::builder().data_dir(dir).build(),
        };
        db.replay_wal()?;
        Ok(db)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn transactions(&mut self) -> &mut TransactionManager {
        &mut self.txn_manager
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.config.data_dir
    }
}

/// IndexNotFound/MissingTableName are remapped to TableNotFound at the
/// façade boundary so unknown names surface as one error kind,
/// regardless of which internal lookup found them missing (§9 "Error
/// mapping at the Façade").
fn remap_facade_error(err: DbError) -> DbError {
    match err {
        DbError::IndexNotFound(name) => DbError::TableNotFound(name),
        DbError::MissingTableName => DbError::TableNotFound(String::new()),
        other => other,
    }
}
