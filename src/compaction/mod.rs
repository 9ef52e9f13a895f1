//! Leveled compaction.
//!
//! Levels are numbered `0, 1, 2, ...`; level `L` holds at most `2^(L+1)`
//! tables. Level 0 is merged wholesale whenever it overflows (its tables'
//! key ranges may overlap each other, since they come straight from
//! memtable flushes). Level `L > 0` selects its oldest
//! `count(L) - 2^(L+1)` tables (ties broken by the smaller `minKey`) as
//! victims, pulls in every overlapping table from `L+1`, and k-way-merges
//! the union into new tables written to `L+1`. If `L+1` did not exist
//! before this round, the merge additionally drops every tombstone — there
//! is nothing further down for them to suppress.
//!
//! Every table emitted by one compaction round is stamped with the same
//! header timestamp (the maximum across its inputs), though each gets a
//! distinct filename from the store's counter — see `SPEC_FULL.md` §3 and
//! `DESIGN.md`'s Open Question (i).

use crate::memtable::{MemTable, TOMBSTONE};
use crate::sstable::{self, SSTable, SSTableError};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum CompactionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sstable error: {0}")]
    SSTable(#[from] SSTableError),
}

/// Maximum number of tables level `level` may hold before it overflows.
pub const fn level_capacity(level: usize) -> usize {
    1usize << (level + 1)
}

pub fn level_dir_name(level: usize) -> String {
    format!("Level{level}")
}

/// Repeatedly compacts overflowing levels, cascading downward, until every
/// level is within capacity (or does not exist).
pub fn maybe_compact(
    levels: &mut Vec<Vec<SSTable>>,
    base_dir: &Path,
    counter: &mut u64,
) -> Result<(), CompactionError> {
    let mut level = 0;
    while level < levels.len() {
        if levels[level].len() > level_capacity(level) {
            compact_level(levels, base_dir, counter, level)?;
            level += 1;
        } else {
            break;
        }
    }
    Ok(())
}

pub(crate) fn compact_level(
    levels: &mut Vec<Vec<SSTable>>,
    base_dir: &Path,
    counter: &mut u64,
    level: usize,
) -> Result<(), CompactionError> {
    let capacity = level_capacity(level);
    let current = std::mem::take(&mut levels[level]);
    let (victims, keep) = select_victims(current, level, capacity);
    levels[level] = keep;

    if victims.is_empty() {
        return Ok(());
    }

    let kmin = victims.iter().map(SSTable::min_key).min().unwrap();
    let kmax = victims.iter().map(SSTable::max_key).max().unwrap();

    let level_existed = levels.len() > level + 1;
    if !level_existed {
        levels.push(Vec::new());
    }
    let next_level_tables = std::mem::take(&mut levels[level + 1]);
    let mut overlap = Vec::new();
    let mut keep_next = Vec::new();
    for table in next_level_tables {
        if table.overlaps(kmin, kmax) {
            overlap.push(table);
        } else {
            keep_next.push(table);
        }
    }

    let drop_tombstones = !level_existed;
    let participants: Vec<&SSTable> = victims.iter().chain(overlap.iter()).collect();
    let max_input_ts = participants.iter().map(|t| t.time_stamp()).max().unwrap();

    info!(
        level,
        victims = victims.len(),
        overlap = overlap.len(),
        drop_tombstones,
        kmin,
        kmax,
        "compacting level"
    );

    let merged = merge_tables(&participants, drop_tombstones);

    let dest_dir = base_dir.join(level_dir_name(level + 1));
    std::fs::create_dir_all(&dest_dir)?;

    let mut out = MemTable::new();
    let mut new_tables = Vec::new();
    for (key, value) in merged {
        if out.would_exceed(key, value.len()) {
            flush_output(&mut out, max_input_ts, counter, &dest_dir, &mut new_tables)?;
        }
        out.put_raw(key, value);
    }
    flush_output(&mut out, max_input_ts, counter, &dest_dir, &mut new_tables)?;

    debug!(
        level = level + 1,
        new_tables = new_tables.len(),
        "compaction merge produced tables"
    );

    for table in victims.into_iter().chain(overlap.into_iter()) {
        table.remove()?;
    }

    keep_next.extend(new_tables);
    levels[level + 1] = keep_next;

    Ok(())
}

/// Splits `tables` into (victims, survivors) for the given level.
///
/// Level 0 always sends every table to the merge. Higher levels send only
/// the oldest `count - capacity` tables, so the level settles back to
/// exactly `capacity` tables.
fn select_victims(mut tables: Vec<SSTable>, level: usize, capacity: usize) -> (Vec<SSTable>, Vec<SSTable>) {
    if level == 0 {
        return (tables, Vec::new());
    }
    let victim_count = tables.len().saturating_sub(capacity);
    if victim_count == 0 {
        return (Vec::new(), tables);
    }
    tables.sort_by_key(|t| (t.time_stamp(), t.min_key()));
    let victims: Vec<SSTable> = tables.drain(0..victim_count).collect();
    (victims, tables)
}

/// K-way merges every participating table's contents into one ascending
/// stream. Where multiple tables share a key, the value from the table with
/// the greatest timestamp wins.
fn merge_tables(tables: &[&SSTable], drop_tombstones: bool) -> Vec<(u64, Vec<u8>)> {
    struct Lane {
        entries: Vec<(u64, Vec<u8>)>,
        pos: usize,
        timestamp: u64,
    }

    let mut lanes: Vec<Lane> = tables
        .iter()
        .map(|table| {
            let mut entries: Vec<(u64, Vec<u8>)> = table.iter().collect();
            if drop_tombstones {
                entries.retain(|(_, v)| v.as_slice() != TOMBSTONE);
            }
            Lane {
                entries,
                pos: 0,
                timestamp: table.time_stamp(),
            }
        })
        .collect();

    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = BinaryHeap::new();
    for (idx, lane) in lanes.iter().enumerate() {
        if !lane.entries.is_empty() {
            heap.push(Reverse((lane.entries[0].0, idx)));
        }
    }

    let mut out = Vec::new();
    while let Some(&Reverse((key, _))) = heap.peek() {
        let mut group = Vec::new();
        while let Some(&Reverse((k, idx))) = heap.peek() {
            if k != key {
                break;
            }
            heap.pop();
            group.push(idx);
        }

        let winner = *group
            .iter()
            .max_by_key(|&&idx| (lanes[idx].timestamp, Reverse(idx)))
            .unwrap();
        let value = lanes[winner].entries[lanes[winner].pos].1.clone();
        out.push((key, value));

        for idx in group {
            let lane = &mut lanes[idx];
            lane.pos += 1;
            if lane.pos < lane.entries.len() {
                heap.push(Reverse((lane.entries[lane.pos].0, idx)));
            }
        }
    }

    out
}

fn flush_output(
    out: &mut MemTable,
    time_stamp: u64,
    counter: &mut u64,
    dest_dir: &Path,
    new_tables: &mut Vec<SSTable>,
) -> Result<(), CompactionError> {
    if out.is_empty() {
        return Ok(());
    }
    let n = *counter;
    *counter += 1;
    let path = dest_dir.join(format!("sstable{n}.sst"));
    if let Some(table) = sstable::build_from_memtable(out, time_stamp, &path)? {
        new_tables.push(table);
    }
    out.reset();
    Ok(())
}

#[cfg(test)]
mod tests;
