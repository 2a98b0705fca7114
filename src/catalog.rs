use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::page_id::{table_id_of, TableId};
use crate::types::CoreResult;

/// Consumed external contract (spec.md §6): "Given a `tableId`, returns
/// the file-backed store and the schema." This crate's core only needs
/// the file-backed-store half (the path); schema lookup belongs to the
/// heap-file layer (`heap.rs`), which is itself external to the core.
pub struct Catalog {
    paths: HashMap<TableId, PathBuf>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            paths: HashMap::new(),
        }
    }

    /// Register a table backed by `path`, creating an empty file if one
    /// does not already exist. Table identity is the hash of the
    /// absolute path (spec.md §6).
    pub fn register_table(&mut self, path: impl AsRef<Path>) -> CoreResult<TableId> {
        let path = path.as_ref();
        if std::fs::metadata(path).is_err() {
            OpenOptions::new()
                .create(true)
                .write(true)
                .open(path)
                .map_err(CoreError::storage)?;
        }
        let abs = std::fs::canonicalize(path).map_err(CoreError::storage)?;

        let table_id = table_id_of(&abs);
        self.paths.insert(table_id, abs);
        Ok(table_id)
    }

    pub fn path_for(&self, table_id: TableId) -> CoreResult<&Path> {
        self.paths
            .get(&table_id)
            .map(PathBuf::as_path)
            .ok_or_else(|| CoreError::invalid(format!("unknown table id {:x}", table_id)))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
