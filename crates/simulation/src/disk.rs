use crate::scheduler::Scheduler;
use common::{DbError, DbResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// An in-memory path→bytes disk that models the latency and failure
/// modes real storage exhibits: independent read/write delay ranges,
/// independent read/write error probabilities, and a per-byte corruption
/// probability applied at read time. All randomness is drawn from the
/// owning scheduler's PRNG, so repeated runs with the same seed see
/// identical delays, errors, and corruption.
pub struct SimulatedDisk {
    files: HashMap<PathBuf, Vec<u8>>,
    read_delay: (u64, u64),
    write_delay: (u64, u64),
    read_error_probability: f64,
    write_error_probability: f64,
    corruption_probability: f64,
}

impl SimulatedDisk {
    pub fn new(
        read_delay: (u64, u64),
        write_delay: (u64, u64),
        read_error_probability: f64,
        write_error_probability: f64,
        corruption_probability: f64,
    ) -> Self {
        Self {
            files: HashMap::new(),
            read_delay,
            write_delay,
            read_error_probability,
            write_error_probability,
            corruption_probability,
        }
    }

    /// Writes `bytes` to `path`, returning the simulated delay in ticks.
    /// Fails with `DiskWriteError` by `write_error_probability` before
    /// the write takes effect.
    pub fn write(
        &mut self,
        scheduler: &mut Scheduler,
        path: impl Into<PathBuf>,
        bytes: Vec<u8>,
    ) -> DbResult<u64> {
        let path = path.into();
        let delay = scheduler
            .rng_mut()
            .next_range(self.write_delay.0, self.write_delay.1);
        if scheduler.rng_mut().next_bool(self.write_error_probability) {
            return Err(DbError::DiskWriteError(path.display().to_string()));
        }
        self.files.insert(path, bytes);
        Ok(delay)
    }

    /// Reads `path`, returning its bytes (after per-byte corruption is
    /// rolled) and the simulated delay in ticks. Fails with
    /// `DiskReadError` by `read_error_probability`, or `FileNotFound` if
    /// nothing was ever written there.
    pub fn read(&mut self, scheduler: &mut Scheduler, path: &Path) -> DbResult<(Vec<u8>, u64)> {
        let delay = scheduler
            .rng_mut()
            .next_range(self.read_delay.0, self.read_delay.1);
        if scheduler.rng_mut().next_bool(self.read_error_probability) {
            return Err(DbError::DiskReadError(path.display().to_string()));
        }
        let mut bytes = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| DbError::FileNotFound(path.display().to_string()))?;

        for byte in bytes.iter_mut() {
            if scheduler.rng_mut().next_bool(self.corruption_probability) {
                *byte ^= 0xFF;
            }
        }
        Ok((bytes, delay))
    }

    /// Flips one random bit of one random byte of `path`'s stored
    /// contents, for tests that want to force a corrupted read
    /// deterministically rather than wait on `corruption_probability`.
    pub fn inject_corruption(&mut self, scheduler: &mut Scheduler, path: &Path) -> DbResult<()> {
        let bytes = self
            .files
            .get_mut(path)
            .ok_or_else(|| DbError::FileNotFound(path.display().to_string()))?;
        if bytes.is_empty() {
            return Ok(());
        }
        let idx = scheduler.rng_mut().next_range(0, bytes.len() as u64 - 1) as usize;
        let bit = 1u8 << scheduler.rng_mut().next_range(0, 7);
        bytes[idx] ^= bit;
        Ok(())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
}
