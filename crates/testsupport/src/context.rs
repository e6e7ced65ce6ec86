//! Isolated, temp-directory-backed `Database` fixtures for tests.
//!
//! Every `TestContext` owns its own `tempfile::TempDir`, so tests never
//! share on-disk state and cleanup happens automatically on drop.

use common::{Config, DbResult};
use database::Database;
use tempfile::TempDir;

/// A `Database` opened against a fresh temporary directory.
///
/// The `TempDir` is held for the context's lifetime so the backing
/// directory isn't removed out from under the open WAL and KV store.
pub struct TestContext {
    db: Database,
    temp_dir: TempDir,
}

impl TestContext {
    /// Opens a fresh database in a new temp directory with default config.
    pub fn new() -> DbResult<Self> {
        Self::with_config(Config::default())
    }

    /// Opens a fresh database in a new temp directory, with `config`'s
    /// `data_dir` overwritten to point at the temp directory.
    pub fn with_config(config: Config) -> DbResult<Self> {
        let temp_dir = TempDir::new().map_err(common::DbError::Io)?;
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..config
        };
        let db = Database::open_with_config(temp_dir.path(), config)?;
        Ok(Self { db, temp_dir })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    /// The temp directory backing this context, for tests that want to
    /// recover or back up against the same path.
    pub fn path(&self) -> &std::path::Path {
        self.temp_dir.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_opens_a_usable_database() {
        let mut ctx = TestContext::new().unwrap();
        ctx.database_mut()
            .execute("CREATE TABLE users (id INT, name TEXT)")
            .unwrap();
        assert!(ctx.database().catalog().lookup("users").is_some());
    }

    #[test]
    fn two_contexts_are_isolated() {
        let mut ctx1 = TestContext::new().unwrap();
        let ctx2 = TestContext::new().unwrap();

        ctx1.database_mut()
            .execute("CREATE TABLE users (id INT)")
            .unwrap();

        assert!(ctx1.database().catalog().lookup("users").is_some());
        assert!(ctx2.database().catalog().lookup("users").is_none());
    }

    #[test]
    fn with_config_overrides_data_dir() {
        let ctx = TestContext::with_config(Config::default()).unwrap();
        assert_eq!(ctx.database().config().data_dir, ctx.path());
    }
}
