//! Ordered byte-key/byte-value KV store.
//!
//! The in-memory `BTreeMap` is the source of truth for reads. Every
//! mutation is first appended, length-prefixed, to a single log file in the
//! store's directory and flushed before the map is updated, so `open` can
//! rebuild the map by replaying that file from scratch. This mirrors the
//! append-then-index pattern the rest of this workspace uses for its
//! write-ahead log, applied here to a log-structured KV store instead of a
//! page file.

use common::{DbError, DbResult};
use std::{
    collections::BTreeMap,
    fs::{self, File, OpenOptions},
    io::{BufReader, Read, Write},
    path::{Path, PathBuf},
};

const LOG_FILE_NAME: &str = "data.log";
const METADATA_FILE_NAME: &str = "metadata.json";

#[derive(Clone, Copy, Debug)]
enum RecordTag {
    Put = 0,
    Delete = 1,
}

impl RecordTag {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(RecordTag::Put),
            1 => Some(RecordTag::Delete),
            _ => None,
        }
    }
}

/// An open handle to a directory-backed ordered KV store.
pub struct KvStore {
    dir: PathBuf,
    log: File,
    map: BTreeMap<Vec<u8>, Vec<u8>>,
}

/// A batch of put/delete operations committed atomically.
#[derive(Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Put(key.into(), value.into()));
        self
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Delete(key.into()));
        self
    }
}

impl KvStore {
    /// Opens (creating if absent) the store rooted at `path`, replaying its
    /// log file to rebuild the in-memory map.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let dir = path.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| DbError::OpenFailed(e.to_string()))?;

        let log_path = dir.join(LOG_FILE_NAME);
        let map = Self::replay(&log_path);

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| DbError::OpenFailed(e.to_string()))?;

        Ok(Self { dir, log, map })
    }

    fn replay(log_path: &Path) -> BTreeMap<Vec<u8>, Vec<u8>> {
        let mut map = BTreeMap::new();
        let Ok(file) = File::open(log_path) else {
            return map;
        };
        let mut reader = BufReader::new(file);

        loop {
            let mut tag_buf = [0u8; 1];
            if reader.read_exact(&mut tag_buf).is_err() {
                break;
            }
            let Some(tag) = RecordTag::from_byte(tag_buf[0]) else {
                break;
            };

            let Some(key) = read_framed(&mut reader) else {
                break;
            };

            match tag {
                RecordTag::Put => {
                    let Some(value) = read_framed(&mut reader) else {
                        break;
                    };
                    map.insert(key, value);
                }
                RecordTag::Delete => {
                    map.remove(&key);
                }
            }
        }

        map
    }

    fn append_put(&mut self, key: &[u8], value: &[u8]) -> DbResult<()> {
        self.log
            .write_all(&[RecordTag::Put as u8])
            .map_err(|e| DbError::WriteFailed(e.to_string()))?;
        write_framed(&mut self.log, key)?;
        write_framed(&mut self.log, value)?;
        self.log
            .flush()
            .map_err(|e| DbError::WriteFailed(e.to_string()))?;
        self.log
            .sync_data()
            .map_err(|e| DbError::WriteFailed(e.to_string()))
    }

    fn append_delete(&mut self, key: &[u8]) -> DbResult<()> {
        self.log
            .write_all(&[RecordTag::Delete as u8])
            .map_err(|e| DbError::WriteFailed(e.to_string()))?;
        write_framed(&mut self.log, key)?;
        self.log
            .flush()
            .map_err(|e| DbError::WriteFailed(e.to_string()))?;
        self.log
            .sync_data()
            .map_err(|e| DbError::WriteFailed(e.to_string()))
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) -> DbResult<()> {
        if key.is_empty() {
            return Err(DbError::EmptyKey);
        }
        self.append_put(key, value)?;
        self.map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    pub fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        Ok(self.map.get(key).cloned())
    }

    pub fn delete(&mut self, key: &[u8]) -> DbResult<()> {
        if key.is_empty() {
            return Err(DbError::EmptyKey);
        }
        self.append_delete(key)?;
        self.map.remove(key);
        Ok(())
    }

    /// Atomically applies every operation in `batch`. All-or-nothing with
    /// respect to readers: the in-memory map is only mutated after every
    /// operation has been durably logged.
    pub fn write_batch(&mut self, batch: WriteBatch) -> DbResult<()> {
        for op in &batch.ops {
            let key = match op {
                BatchOp::Put(k, _) | BatchOp::Delete(k) => k,
            };
            if key.is_empty() {
                return Err(DbError::EmptyKey);
            }
        }
        for op in &batch.ops {
            match op {
                BatchOp::Put(k, v) => self.append_put(k, v)?,
                BatchOp::Delete(k) => self.append_delete(k)?,
            }
        }
        for op in batch.ops {
            match op {
                BatchOp::Put(k, v) => {
                    self.map.insert(k, v);
                }
                BatchOp::Delete(k) => {
                    self.map.remove(&k);
                }
            }
        }
        Ok(())
    }

    /// An ordered forward iterator over the store's current contents,
    /// starting before the first entry.
    pub fn iterator(&self) -> KvIterator<'_> {
        KvIterator {
            range: self.map.range::<Vec<u8>, _>(..),
            current: None,
        }
    }

    /// An ordered forward iterator starting at the first key `>= key`.
    pub fn iterator_from(&self, key: &[u8]) -> KvIterator<'_> {
        KvIterator {
            range: self.map.range::<Vec<u8>, _>(key.to_vec()..),
            current: None,
        }
    }

    /// Writes a self-contained snapshot of the store plus a sibling
    /// `metadata.json` document recording `wal_position`.
    pub fn backup(&self, dir: impl AsRef<Path>, wal_position: u64) -> DbResult<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| DbError::BackupFailed(e.to_string()))?;
        fs::copy(self.dir.join(LOG_FILE_NAME), dir.join(LOG_FILE_NAME))
            .map_err(|e| DbError::BackupFailed(e.to_string()))?;

        let metadata = serde_json::json!({ "wal_position": wal_position });
        fs::write(
            dir.join(METADATA_FILE_NAME),
            serde_json::to_vec_pretty(&metadata)
                .map_err(|e| DbError::BackupFailed(e.to_string()))?,
        )
        .map_err(|e| DbError::BackupFailed(e.to_string()))
    }

    /// Closes the store, restores its data from `backup_dir`, and reopens.
    /// Returns the `wal_position` recorded in the backup's metadata.
    pub fn restore(path: impl AsRef<Path>, backup_dir: impl AsRef<Path>) -> DbResult<(Self, u64)> {
        let dir = path.as_ref().to_path_buf();
        let backup_dir = backup_dir.as_ref();

        let log_backup = backup_dir.join(LOG_FILE_NAME);
        if !log_backup.exists() {
            return Err(DbError::BackupCorrupted(format!(
                "missing {LOG_FILE_NAME} in backup"
            )));
        }

        let metadata_path = backup_dir.join(METADATA_FILE_NAME);
        let metadata_bytes =
            fs::read(&metadata_path).map_err(|e| DbError::RestoreFailed(e.to_string()))?;
        let metadata: serde_json::Value = serde_json::from_slice(&metadata_bytes)
            .map_err(|e| DbError::BackupCorrupted(e.to_string()))?;
        let wal_position = metadata
            .get("wal_position")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| DbError::BackupCorrupted("missing wal_position".into()))?;

        fs::create_dir_all(&dir).map_err(|e| DbError::RestoreFailed(e.to_string()))?;
        fs::copy(&log_backup, dir.join(LOG_FILE_NAME))
            .map_err(|e| DbError::RestoreFailed(e.to_string()))?;

        let store = Self::open(dir)?;
        Ok((store, wal_position))
    }
}

fn write_framed(w: &mut impl Write, bytes: &[u8]) -> DbResult<()> {
    w.write_all(&(bytes.len() as u64).to_le_bytes())
        .map_err(|e| DbError::WriteFailed(e.to_string()))?;
    w.write_all(bytes)
        .map_err(|e| DbError::WriteFailed(e.to_string()))
}

fn read_framed(r: &mut impl Read) -> Option<Vec<u8>> {
    let mut len_buf = [0u8; 8];
    r.read_exact(&mut len_buf).ok()?;
    let len = u64::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).ok()?;
    Some(buf)
}

/// Single-pass forward iterator over a [`KvStore`]'s contents, ordered by
/// key byte order. `key()`/`value()` are valid only while the cursor has
/// not advanced past the end.
pub struct KvIterator<'a> {
    range: std::collections::btree_map::Range<'a, Vec<u8>, Vec<u8>>,
    current: Option<(&'a Vec<u8>, &'a Vec<u8>)>,
}

impl<'a> KvIterator<'a> {
    /// Advances the cursor, returning whether a new entry is available.
    pub fn advance(&mut self) -> bool {
        match self.range.next() {
            Some((k, v)) => {
                self.current = Some((k, v));
                true
            }
            None => {
                self.current = None;
                false
            }
        }
    }

    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    pub fn key(&self) -> DbResult<&'a [u8]> {
        self.current
            .map(|(k, _)| k.as_slice())
            .ok_or(DbError::InvalidIterator)
    }

    pub fn value(&self) -> DbResult<&'a [u8]> {
        self.current
            .map(|(_, v)| v.as_slice())
            .ok_or(DbError::InvalidIterator)
    }
}
