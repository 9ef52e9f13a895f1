
use crate::memtable::MemTable;
use crate::sstable::SSTable;
use std::path::Path;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber controlled by `RUST_LOG` env var.
/// Safe to call multiple times — only the first call takes effect.
pub(super) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub(super) fn write_table(
    dir: &Path,
    name: &str,
    entries: &[(u64, &[u8])],
    time_stamp: u64,
) -> SSTable {
    let mut mt = MemTable::new();
    for &(k, v) in entries {
        mt.put_raw(k, v.to_vec());
    }
    let path = dir.join(name);
    crate::sstable::build_from_memtable(&mt, time_stamp, &path)
        .unwrap()
        .unwrap()
}

pub(super) fn scratch_dir() -> TempDir {
    init_tracing();
    TempDir::new().unwrap()
}
