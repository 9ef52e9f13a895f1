//! Forward iterator over an [`SSTable`]'s full contents, ascending by key.
//!
//! Used by compaction to build one merge lane per participating table —
//! the reference's `KVArray` plays the same role.

use super::SSTable;

pub struct SSTableIter<'a> {
    table: &'a SSTable,
    pos: usize,
}

impl<'a> SSTableIter<'a> {
    pub(super) fn new(table: &'a SSTable) -> Self {
        Self { table, pos: 0 }
    }
}

impl<'a> Iterator for SSTableIter<'a> {
    type Item = (u64, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.table.dir_len() {
            return None;
        }
        let key = self.table.key_at(self.pos);
        let value = self.table.value_at(self.pos).to_vec();
        self.pos += 1;
        Some((key, value))
    }
}
