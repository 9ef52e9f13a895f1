//! Immutable on-disk sorted runs.
//!
//! # On-disk layout
//!
//! ```text
//! [ 32 bytes   header    ]  timeStamp:u64 | entryCount:u64 | minKey:u64 | maxKey:u64  (all little-endian)
//! [ 10240 bytes bloom    ]  byte-per-cell bloom filter, see crate::bloom
//! [ 12*N bytes directory ]  N records of (key:u64, offset:u32), ascending by key
//! [ remaining   values   ]  concatenated value bytes, no length prefix, no padding
//! ```
//!
//! A directory entry's value runs from its `offset` to the next entry's
//! `offset` (or end of file, for the last entry). There is no CRC or block
//! structure — the whole file is read once via [`memmap2`] on open and
//! every subsequent lookup is a slice into that mapping.

mod builder;
mod iterator;

pub use builder::build_from_memtable;
pub use iterator::SSTableIter;

use crate::bloom::{BloomError, BloomFilter, CAPACITY as BLOOM_CAPACITY};
use crate::memtable::TOMBSTONE;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::trace;

pub const HEADER_LEN: usize = 32;
pub const DIR_ENTRY_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum SSTableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bloom filter error: {0}")]
    Bloom(#[from] BloomError),
    #[error("SSTable file {0:?} is truncated: expected at least {1} bytes, found {2}")]
    Truncated(PathBuf, usize, usize),
    #[error("SSTable directory in {0:?} is not sorted ascending by key")]
    UnsortedDirectory(PathBuf),
}

/// Fixed-size fields persisted at the front of every SSTable file.
#[derive(Debug, Clone, Copy)]
pub struct SSTableHeader {
    pub time_stamp: u64,
    pub entry_count: u64,
    pub min_key: u64,
    pub max_key: u64,
}

impl SSTableHeader {
    pub(crate) fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..8].copy_from_slice(&self.time_stamp.to_le_bytes());
        buf[8..16].copy_from_slice(&self.entry_count.to_le_bytes());
        buf[16..24].copy_from_slice(&self.min_key.to_le_bytes());
        buf[24..32].copy_from_slice(&self.max_key.to_le_bytes());
        buf
    }

    fn decode(bytes: &[u8]) -> Self {
        Self {
            time_stamp: u64::from_le_bytes(bytes[0..8].try_into().unwrap()),
            entry_count: u64::from_le_bytes(bytes[8..16].try_into().unwrap()),
            min_key: u64::from_le_bytes(bytes[16..24].try_into().unwrap()),
            max_key: u64::from_le_bytes(bytes[24..32].try_into().unwrap()),
        }
    }
}

/// The outcome of a point lookup, distinguishing "never written" from
/// "written, then deleted".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetResult {
    Found(Vec<u8>),
    Tombstoned,
    NotFound,
}

/// A memory-mapped, immutable sorted run.
pub struct SSTable {
    header: SSTableHeader,
    bloom: BloomFilter,
    directory: Vec<(u64, u32)>,
    path: PathBuf,
    mmap: Mmap,
}

impl SSTable {
    /// Opens an existing file, memory-mapping it and parsing the header,
    /// bloom filter, and directory eagerly. Value bytes stay on disk and are
    /// sliced out of the mapping on demand.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SSTableError> {
        let path = path.into();
        let file = File::open(&path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        let dir_start = HEADER_LEN + BLOOM_CAPACITY;
        if mmap.len() < dir_start {
            return Err(SSTableError::Truncated(path, dir_start, mmap.len()));
        }

        let header = SSTableHeader::decode(&mmap[0..HEADER_LEN]);
        let bloom = BloomFilter::from_bytes(&mmap[HEADER_LEN..dir_start])?;

        let dir_len = DIR_ENTRY_LEN * header.entry_count as usize;
        if mmap.len() < dir_start + dir_len {
            return Err(SSTableError::Truncated(path, dir_start + dir_len, mmap.len()));
        }

        let mut directory = Vec::with_capacity(header.entry_count as usize);
        for i in 0..header.entry_count as usize {
            let rec = &mmap[dir_start + i * DIR_ENTRY_LEN..dir_start + (i + 1) * DIR_ENTRY_LEN];
            let key = u64::from_le_bytes(rec[0..8].try_into().unwrap());
            let offset = u32::from_le_bytes(rec[8..12].try_into().unwrap());
            directory.push((key, offset));
        }
        if !directory.windows(2).all(|w| w[0].0 < w[1].0) {
            return Err(SSTableError::UnsortedDirectory(path));
        }

        Ok(Self {
            header,
            bloom,
            directory,
            path,
            mmap,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn time_stamp(&self) -> u64 {
        self.header.time_stamp
    }

    pub fn min_key(&self) -> u64 {
        self.header.min_key
    }

    pub fn max_key(&self) -> u64 {
        self.header.max_key
    }

    pub fn entry_count(&self) -> u64 {
        self.header.entry_count
    }

    /// Whether this table's key range overlaps `[lo, hi]`.
    ///
    /// Two ranges overlap iff neither lies wholly below nor wholly above the
    /// other; a naive `min < lo || max > hi` test (matching the reference's
    /// bug) would reject overlapping-but-not-containing ranges.
    pub fn overlaps(&self, lo: u64, hi: u64) -> bool {
        !(self.header.max_key < lo || self.header.min_key > hi)
    }

    /// Looks `key` up: range check, then bloom filter, then directory binary
    /// search, then a tombstone check on the resolved value.
    pub fn get(&self, key: u64) -> GetResult {
        if key < self.header.min_key || key > self.header.max_key {
            return GetResult::NotFound;
        }
        if !self.bloom.might_contain(key) {
            return GetResult::NotFound;
        }
        match self.directory.binary_search_by(|&(k, _)| k.cmp(&key)) {
            Err(_) => GetResult::NotFound,
            Ok(idx) => {
                let value = self.value_at(idx);
                trace!(key, table = ?self.path, "sstable hit");
                if value == TOMBSTONE {
                    GetResult::Tombstoned
                } else {
                    GetResult::Found(value.to_vec())
                }
            }
        }
    }

    /// Every entry with `key1 <= key <= key2`, ascending. Tombstones are
    /// included as-is; callers filter them during their own merge.
    pub fn scan(&self, key1: u64, key2: u64) -> Vec<(u64, Vec<u8>)> {
        if key1 > key2 || !self.overlaps(key1, key2) {
            return Vec::new();
        }
        let start = self.directory.partition_point(|&(k, _)| k < key1);
        self.directory[start..]
            .iter()
            .take_while(|&&(k, _)| k <= key2)
            .enumerate()
            .map(|(i, &(k, _))| (k, self.value_at(start + i).to_vec()))
            .collect()
    }

    /// Every entry in the table, ascending. Used by compaction's k-way
    /// merge.
    pub fn iter(&self) -> SSTableIter<'_> {
        SSTableIter::new(self)
    }

    pub(crate) fn dir_len(&self) -> usize {
        self.directory.len()
    }

    pub(crate) fn key_at(&self, dir_idx: usize) -> u64 {
        self.directory[dir_idx].0
    }

    pub(crate) fn value_at(&self, dir_idx: usize) -> &[u8] {
        let offset = self.directory[dir_idx].1 as usize;
        let end = self
            .directory
            .get(dir_idx + 1)
            .map(|&(_, next_offset)| next_offset as usize)
            .unwrap_or(self.mmap.len());
        &self.mmap[offset..end]
    }

    /// Unmaps and deletes the backing file.
    pub fn remove(self) -> Result<(), SSTableError> {
        let path = self.path.clone();
        drop(self);
        std::fs::remove_file(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
