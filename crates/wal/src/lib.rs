//! Write-Ahead Log (WAL) for crash recovery and durability.
//!
//! The WAL ensures that every change to the database is first recorded in a
//! durable, sequential log before it's applied to storage. If the process
//! crashes mid-update, the WAL can replay ("redo") those operations to
//! bring state back to a consistent point.
//!
//! Each record is framed as `(txn_id: u64 LE, payload_len: u64 LE, payload
//! bytes)`. Recovery reads the file from the start and tolerates a
//! truncated trailing record by treating it as end of file.

use common::{DbError, DbResult};
use std::{
    collections::BTreeMap,
    fs::{File, OpenOptions},
    io::{BufReader, Read, Write},
    path::{Path, PathBuf},
};

const FRAME_HEADER_LEN: u64 = 16; // txn_id (8) + payload_len (8)

/// An open write-ahead log. `open` replays the existing file automatically.
pub struct Wal {
    path: PathBuf,
    file: File,
    position: u64,
    records: BTreeMap<u64, Vec<u8>>,
}

impl Wal {
    /// Creates `wal.log` in `dir` if absent, opens it read/write without
    /// truncating, and replays it.
    pub fn open(dir: impl AsRef<Path>) -> DbResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| DbError::OpenFailed(e.to_string()))?;
        let path = dir.join("wal.log");

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| DbError::OpenFailed(e.to_string()))?;

        let mut wal = Self {
            path,
            file,
            position: 0,
            records: BTreeMap::new(),
        };
        wal.recover()?;
        Ok(wal)
    }

    /// Appends one framed record and durably flushes it. Updates the
    /// in-memory current position by `16 + len(payload)` on success.
    pub fn log_transaction(&mut self, txn_id: u64, payload: &[u8]) -> DbResult<()> {
        self.file
            .write_all(&txn_id.to_le_bytes())
            .map_err(|e| DbError::WriteFailed(e.to_string()))?;
        self.file
            .write_all(&(payload.len() as u64).to_le_bytes())
            .map_err(|e| DbError::WriteFailed(e.to_string()))?;
        self.file
            .write_all(payload)
            .map_err(|e| DbError::WriteFailed(e.to_string()))?;
        self.file
            .flush()
            .map_err(|e| DbError::WriteFailed(e.to_string()))?;
        self.file
            .sync_data()
            .map_err(|e| DbError::WriteFailed(e.to_string()))?;

        self.position += FRAME_HEADER_LEN + payload.len() as u64;
        self.records.insert(txn_id, payload.to_vec());
        Ok(())
    }

    /// Reads the file from the start, populating the ordered `txn_id →
    /// payload` mapping. Tolerates a truncated trailing record. Safe to
    /// call more than once; subsequent calls simply re-derive the same
    /// state from the file.
    pub fn recover(&mut self) -> DbResult<()> {
        let file = File::open(&self.path).map_err(|e| DbError::ReadFailed(e.to_string()))?;
        let mut reader = BufReader::new(file);

        let mut records = BTreeMap::new();
        let mut position = 0u64;

        loop {
            let mut header = [0u8; 16];
            if reader.read_exact(&mut header).is_err() {
                break;
            }
            let txn_id = u64::from_le_bytes(header[0..8].try_into().unwrap());
            let payload_len = u64::from_le_bytes(header[8..16].try_into().unwrap());

            let mut payload = vec![0u8; payload_len as usize];
            if reader.read_exact(&mut payload).is_err() {
                break;
            }

            records.insert(txn_id, payload);
            position += FRAME_HEADER_LEN + payload_len;
        }

        self.records = records;
        self.position = position;
        Ok(())
    }

    /// Returns the payload logged for `txn_id`, if any.
    pub fn read_transaction(&self, txn_id: u64) -> Option<&[u8]> {
        self.records.get(&txn_id).map(Vec::as_slice)
    }

    /// Every recorded `(txn_id, payload)` pair, in ascending txn_id order.
    pub fn records(&self) -> impl Iterator<Item = (u64, &[u8])> {
        self.records.iter().map(|(id, payload)| (*id, payload.as_slice()))
    }

    /// Byte offset just past the last durably written record.
    pub fn current_position(&self) -> u64 {
        self.position
    }
}
