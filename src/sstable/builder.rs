//! Flushes a [`MemTable`] (or a compaction merge's output buffer, which is
//! itself a `MemTable`) to a new SSTable file.

use super::{SSTable, SSTableError, SSTableHeader, DIR_ENTRY_LEN, HEADER_LEN};
use crate::bloom::{BloomFilter, CAPACITY as BLOOM_CAPACITY};
use crate::memtable::MemTable;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Writes every entry currently in `memtable` (tombstones included) to a new
/// SSTable at `path`, stamped with `time_stamp`, then reopens it to build the
/// in-memory index. Returns `Ok(None)` if the memtable has no entries — an
/// empty table would have no valid `min_key`/`max_key`.
pub fn build_from_memtable(
    memtable: &MemTable,
    time_stamp: u64,
    path: impl AsRef<Path>,
) -> Result<Option<SSTable>, SSTableError> {
    let entries: Vec<(u64, &[u8])> = memtable.iter().collect();
    if entries.is_empty() {
        return Ok(None);
    }

    let path = path.as_ref();
    let entry_count = entries.len() as u64;
    let header = SSTableHeader {
        time_stamp,
        entry_count,
        min_key: memtable.min_key(),
        max_key: memtable.max_key(),
    };

    let mut bloom = BloomFilter::new();
    for &(key, _) in &entries {
        bloom.insert(key);
    }

    let dir_start = HEADER_LEN + BLOOM_CAPACITY;
    let values_start = dir_start + DIR_ENTRY_LEN * entries.len();
    let mut directory = Vec::with_capacity(entries.len());
    let mut offset = values_start as u32;
    for &(key, value) in &entries {
        directory.push((key, offset));
        offset += value.len() as u32;
    }

    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&header.encode())?;
    writer.write_all(&bloom.as_bytes()[..])?;
    for &(key, offset) in &directory {
        writer.write_all(&key.to_le_bytes())?;
        writer.write_all(&offset.to_le_bytes())?;
    }
    for &(_, value) in &entries {
        writer.write_all(value)?;
    }
    writer.flush()?;

    info!(path = ?path, entry_count, time_stamp, "flushed sstable");
    Ok(Some(SSTable::open(path.to_path_buf())?))
}
