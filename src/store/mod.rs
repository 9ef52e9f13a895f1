//! Top-level orchestrator: routes `put`/`get`/`del`/`scan`, triggers a
//! flush when the memtable would overflow, triggers compaction when a
//! level exceeds its capacity, and re-hydrates state on open by rescanning
//! the base directory — there is no manifest or write-ahead log.
//!
//! Single-threaded, cooperative: every mutating operation takes `&mut
//! self`. Unlike the teacher crate's `Engine` (`Arc<RwLock<EngineInner>>`),
//! there is no internal synchronization here — concurrent mutation from
//! multiple threads is out of scope.

use crate::compaction::{self, CompactionError};
use crate::memtable::{Lookup, MemTable, MemtableError, TOMBSTONE};
use crate::sstable::{self, GetResult, SSTable, SSTableError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("memtable error: {0}")]
    Memtable(#[from] MemtableError),
    #[error("sstable error: {0}")]
    SSTable(#[from] SSTableError),
    #[error("compaction error: {0}")]
    Compaction(#[from] CompactionError),
    #[error("value equals the reserved tombstone sentinel; use `del` instead of `put`")]
    ReservedValue,
}

/// An embedded, single-process LSM-tree key-value store rooted at a
/// directory on the local filesystem.
pub struct Store {
    memtable: MemTable,
    levels: Vec<Vec<SSTable>>,
    counter: u64,
    base_dir: PathBuf,
}

impl Store {
    /// Opens (creating if necessary) the store rooted at `dir`.
    ///
    /// Recovery is a pure directory rescan: every `Level<n>` directory,
    /// starting from 0 and stopping at the first one that doesn't exist, is
    /// opened and its tables loaded; the next SSTable counter value is one
    /// past the largest header timestamp observed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;

        let mut levels: Vec<Vec<SSTable>> = Vec::new();
        let mut max_ts: Option<u64> = None;
        let mut level = 0usize;
        loop {
            let level_dir = base_dir.join(compaction::level_dir_name(level));
            if !level_dir.exists() {
                break;
            }
            let mut paths: Vec<PathBuf> = std::fs::read_dir(&level_dir)?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "sst"))
                .collect();
            paths.sort();

            let mut tables = Vec::with_capacity(paths.len());
            for path in paths {
                let table = SSTable::open(path)?;
                max_ts = Some(max_ts.map_or(table.time_stamp(), |m| m.max(table.time_stamp())));
                tables.push(table);
            }
            info!(level, tables = tables.len(), "recovered level");
            levels.push(tables);
            level += 1;
        }

        let counter = max_ts.map_or(1, |m| m + 1);
        Ok(Self {
            memtable: MemTable::new(),
            levels,
            counter,
            base_dir,
        })
    }

    /// Inserts or overwrites `key` with `value`, flushing the memtable to a
    /// new level-0 SSTable first if the insert would overflow it.
    pub fn put(&mut self, key: u64, value: Vec<u8>) -> Result<(), StoreError> {
        if value.as_slice() == TOMBSTONE {
            return Err(StoreError::ReservedValue);
        }
        if self.memtable.would_exceed(key, value.len()) {
            self.flush_memtable()?;
        }
        self.memtable.put_raw(key, value);
        Ok(())
    }

    /// Looks `key` up: memtable first (distinguishing live from
    /// tombstoned), then every SSTable, keeping the greatest-timestamp hit.
    pub fn get(&self, key: u64) -> Option<Vec<u8>> {
        match self.memtable.get(key) {
            Lookup::Found(value) => Some(value),
            Lookup::Tombstoned => None,
            Lookup::Absent => match self.lookup_sstables(key) {
                GetResult::Found(value) => Some(value),
                GetResult::Tombstoned | GetResult::NotFound => None,
            },
        }
    }

    /// Deletes `key`. Returns `false` if it is already absent or already
    /// tombstoned.
    pub fn del(&mut self, key: u64) -> Result<bool, StoreError> {
        match self.memtable.get(key) {
            Lookup::Tombstoned => Ok(false),
            Lookup::Found(_) => Ok(self.memtable.del(key)),
            Lookup::Absent => match self.lookup_sstables(key) {
                GetResult::Found(_) => {
                    self.put_tombstone(key)?;
                    Ok(true)
                }
                GetResult::Tombstoned | GetResult::NotFound => Ok(false),
            },
        }
    }

    /// Returns every live `(key, value)` pair with `key1 <= key <= key2`,
    /// ascending. An inverted range (`key1 > key2`) returns an empty
    /// result rather than panicking.
    pub fn scan(&self, key1: u64, key2: u64) -> Vec<(u64, Vec<u8>)> {
        if key1 > key2 {
            return Vec::new();
        }

        let from_memtable = self.memtable.scan(key1, key2);

        let mut overlapping: Vec<&SSTable> = self
            .levels
            .iter()
            .flatten()
            .filter(|table| table.overlaps(key1, key2))
            .collect();
        overlapping.sort_by_key(|table| table.time_stamp());

        let mut merged_tables = MemTable::new();
        for table in overlapping {
            for (key, value) in table.scan(key1, key2) {
                merged_tables.put_raw(key, value);
            }
        }
        let from_sstables: Vec<(u64, Vec<u8>)> = merged_tables
            .iter()
            .map(|(k, v)| (k, v.to_vec()))
            .collect();

        merge_preferring_memtable(from_memtable, from_sstables)
    }

    /// Removes every key-value pair: clears the memtable, deletes every
    /// SSTable, and removes the now-empty level directories.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.memtable.reset();
        let level_count = self.levels.len();
        for level in self.levels.drain(..) {
            for table in level {
                table.remove()?;
            }
        }
        for i in 0..level_count {
            let level_dir = self.base_dir.join(compaction::level_dir_name(i));
            if level_dir.exists() {
                std::fs::remove_dir(&level_dir)?;
            }
        }
        Ok(())
    }

    fn flush_memtable(&mut self) -> Result<(), StoreError> {
        if self.memtable.is_empty() {
            return Ok(());
        }
        let level0_dir = self.base_dir.join(compaction::level_dir_name(0));
        std::fs::create_dir_all(&level0_dir)?;

        let ts = self.counter;
        self.counter += 1;
        let path = level0_dir.join(format!("sstable{ts}.sst"));

        if let Some(table) = sstable::build_from_memtable(&self.memtable, ts, &path)? {
            if self.levels.is_empty() {
                self.levels.push(Vec::new());
            }
            debug!(path = ?path, entries = table.entry_count(), "flushed memtable");
            self.levels[0].push(table);
        }
        self.memtable.reset();

        compaction::maybe_compact(&mut self.levels, &self.base_dir, &mut self.counter)?;
        Ok(())
    }

    /// Puts the tombstone sentinel directly, flushing first if necessary —
    /// used by `del` when the live value to delete lives only in an
    /// SSTable, never by external callers (who must go through `del`).
    fn put_tombstone(&mut self, key: u64) -> Result<(), StoreError> {
        if self.memtable.would_exceed(key, TOMBSTONE.len()) {
            self.flush_memtable()?;
        }
        self.memtable.put_raw(key, TOMBSTONE.to_vec());
        Ok(())
    }

    /// Authoritative SSTable-only lookup: the hit with the greatest
    /// timestamp across every level wins.
    fn lookup_sstables(&self, key: u64) -> GetResult {
        let mut best: Option<(u64, GetResult)> = None;
        for table in self.levels.iter().flatten() {
            match table.get(key) {
                GetResult::NotFound => continue,
                hit => {
                    let newer = best.as_ref().map(|(ts, _)| table.time_stamp() > *ts).unwrap_or(true);
                    if newer {
                        best = Some((table.time_stamp(), hit));
                    }
                }
            }
        }
        best.map(|(_, hit)| hit).unwrap_or(GetResult::NotFound)
    }
}

/// Two-way merges the memtable's scan output with the SSTable-derived scan
/// output, ascending by key, breaking ties in favour of the memtable (it is
/// always newer). Tombstones — from either source — suppress their key
/// from the final result.
fn merge_preferring_memtable(a: Vec<(u64, Vec<u8>)>, b: Vec<(u64, Vec<u8>)>) -> Vec<(u64, Vec<u8>)> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => {
                out.push(a[i].clone());
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j].clone());
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i].clone());
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out.retain(|(_, value)| value.as_slice() != TOMBSTONE);
    out
}

#[cfg(test)]
mod tests;
