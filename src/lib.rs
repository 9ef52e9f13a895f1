//! # basaltdb
//!
//! An embeddable, single-process key-value store built on a **log-structured
//! merge tree (LSM-tree)**. Keys are fixed-width 64-bit unsigned integers;
//! values are arbitrary byte strings.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                          Store                              │
//! │  ┌────────────┐        ┌──────────────────────────────┐    │
//! │  │  MemTable   │ flush  │  Levels (on disk)             │    │
//! │  │ (skip list) │───────►│  Level0  Level1  Level2  ...  │    │
//! │  └────────────┘        │  (SSTables, each bloom+mmap'd) │    │
//! │                        └───────────────┬────────────────┘    │
//! │                                        │                     │
//! │                        ┌───────────────▼────────────────┐    │
//! │                        │   Compactor (leveled, k-way)    │    │
//! │                        └─────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`store`] | Top-level orchestrator — open, put, get, del, scan, reset |
//! | [`memtable`] | Skip-list write buffer with deterministic level generation |
//! | [`sstable`] | Immutable, memory-mapped on-disk sorted runs with a bloom filter |
//! | [`bloom`] | Fixed-capacity bloom filter (MurmurHash3 x64 128) |
//! | [`compaction`] | Leveled compaction: victim selection, overlap merge, tombstone elimination |
//!
//! ## Key properties
//!
//! - **No write-ahead log.** Recovery is a directory rescan on `open`; there
//!   is no crash-safe durability for an in-flight write (see `SPEC_FULL.md`
//!   for the full rationale).
//! - **Tombstone deletes.** A delete writes a reserved 8-byte sentinel rather
//!   than physically removing data; the bottom-most compaction level drops
//!   spent tombstones.
//! - **Single-threaded.** Every mutating `Store` method takes `&mut self` —
//!   there is no internal locking.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use basaltdb::store::Store;
//!
//! let mut store = Store::open("/tmp/my_db").unwrap();
//!
//! store.put(1, b"hello".to_vec()).unwrap();
//! assert_eq!(store.get(1), Some(b"hello".to_vec()));
//!
//! assert!(store.del(1).unwrap());
//! assert_eq!(store.get(1), None);
//!
//! store.put(1, b"a".to_vec()).unwrap();
//! store.put(2, b"b".to_vec()).unwrap();
//! let results = store.scan(1, 2);
//! assert_eq!(results, vec![(1, b"a".to_vec()), (2, b"b".to_vec())]);
//! ```

pub mod bloom;
pub mod compaction;
pub mod memtable;
pub mod sstable;
pub mod store;

pub use store::{Store, StoreError};
