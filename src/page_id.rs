use std::hash::{Hash, Hasher};
use std::path::Path;

/// Identity of a table: the hash of its absolute on-disk path (spec.md
/// §6, "Identity of a table is the hash of its absolute filesystem
/// path.").
pub type TableId = u64;

pub fn table_id_of(path: &Path) -> TableId {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    path.hash(&mut hasher);
    hasher.finish()
}

/// Identity of a page: `(tableId, pageNo)`. Value type, equal and
/// hashed by component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId {
    pub table_id: TableId,
    pub page_no: u32,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: u32) -> Self {
        Self { table_id, page_no }
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page({:x}, {})", self.table_id, self.page_no)
    }
}
