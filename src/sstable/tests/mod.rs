
use crate::memtable::MemTable;
use crate::sstable::SSTable;
use tempfile::TempDir;

pub(super) fn flush(entries: &[(u64, &[u8])], time_stamp: u64) -> (TempDir, SSTable) {
    let dir = TempDir::new().unwrap();
    let mut mt = MemTable::new();
    for &(k, v) in entries {
        mt.put(k, v.to_vec()).unwrap();
    }
    let path = dir.path().join("sstable1.sst");
    let table = super::build_from_memtable(&mt, time_stamp, &path)
        .unwrap()
        .expect("non-empty memtable must produce a table");
    (dir, table)
}
