use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};

use log::debug;

use crate::catalog::Catalog;
use crate::error::CoreError;
use crate::page::{Page, PAGE_SIZE};
use crate::page_id::PageId;
use crate::types::CoreResult;

/// Durable, byte-addressed page I/O against a catalog of tables
/// (spec.md §4.1). Stateless: every operation opens and closes its own
/// file handle (spec.md §5, "no long-lived handle sharing"). I/O errors
/// propagate as `CoreError::Storage`; there is no retry inside the
/// store (spec.md §4.1, "Failure semantics").
pub struct PageStore;

impl PageStore {
    /// Number of whole pages currently on disk for `table_id`.
    pub fn num_pages(catalog: &Catalog, table_id: crate::page_id::TableId) -> CoreResult<u32> {
        let path = catalog.path_for(table_id)?;
        let len = std::fs::metadata(path).map_err(CoreError::storage)?.len();
        Ok((len / PAGE_SIZE as u64) as u32)
    }

    /// Read `pid`. If `pid.page_no` is beyond the file's current extent,
    /// the file is extended with a zero-filled page and an empty page
    /// image is returned (spec.md §4.1).
    pub fn read_page(catalog: &Catalog, pid: PageId) -> CoreResult<Page> {
        let path = catalog.path_for(pid.table_id)?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(CoreError::storage)?;

        let existing_pages = (file.metadata().map_err(CoreError::storage)?.len() / PAGE_SIZE as u64) as u32;

        if pid.page_no < existing_pages {
            debug!("read page {} from disk", pid);
            file.seek(SeekFrom::Start(pid.page_no as u64 * PAGE_SIZE as u64))
                .map_err(CoreError::storage)?;
            let mut buf = [0u8; PAGE_SIZE];
            file.read_exact(&mut buf).map_err(CoreError::storage)?;
            Ok(Page::new(pid, buf))
        } else {
            debug!("extending table {:x} to page {}", pid.table_id, pid.page_no);
            let page = Page::zeroed(pid);
            file.seek(SeekFrom::Start(pid.page_no as u64 * PAGE_SIZE as u64))
                .map_err(CoreError::storage)?;
            file.write_all(page.bytes()).map_err(CoreError::storage)?;
            file.flush().map_err(CoreError::storage)?;
            Ok(page)
        }
    }

    /// Write `page`'s 4096-byte image to disk. Truncation is not
    /// required (spec.md §4.1).
    pub fn write_page(catalog: &Catalog, page: &Page) -> CoreResult<()> {
        let path = catalog.path_for(page.id().table_id)?;
        let mut file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(CoreError::storage)?;

        debug!("write page {} to disk", page.id());
        file.seek(SeekFrom::Start(page.id().page_no as u64 * PAGE_SIZE as u64))
            .map_err(CoreError::storage)?;
        file.write_all(page.bytes()).map_err(CoreError::storage)?;
        file.flush().map_err(CoreError::storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_id::PageId;
    use tempfile_like::TempPath;

    mod tempfile_like {
        use std::path::PathBuf;

        /// Minimal scoped temp-file helper (std-only, no new
        /// dev-dependency): creates a unique path under the OS temp
        /// dir and removes it on drop.
        pub struct TempPath(pub PathBuf);

        impl TempPath {
            pub fn new(name: &str) -> Self {
                let mut p = std::env::temp_dir();
                let unique = format!(
                    "{}-{}-{:?}",
                    name,
                    std::process::id(),
                    std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap()
                        .as_nanos()
                );
                p.push(unique);
                TempPath(p)
            }
        }

        impl Drop for TempPath {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.0);
            }
        }
    }

    #[test]
    fn extends_file_with_zero_page_and_increments_count() {
        let tmp = TempPath::new("page_store_extend");
        let mut catalog = Catalog::new();
        let table_id = catalog.register_table(&tmp.0).unwrap();

        assert_eq!(PageStore::num_pages(&catalog, table_id).unwrap(), 0);

        let pid = PageId::new(table_id, 0);
        let page = PageStore::read_page(&catalog, pid).unwrap();
        assert!(!page.is_dirty());
        assert_eq!(page.bytes(), &[0u8; PAGE_SIZE]);
        assert_eq!(PageStore::num_pages(&catalog, table_id).unwrap(), 1);
    }

    #[test]
    fn write_then_read_round_trips() {
        let tmp = TempPath::new("page_store_roundtrip");
        let mut catalog = Catalog::new();
        let table_id = catalog.register_table(&tmp.0).unwrap();

        let pid = PageId::new(table_id, 0);
        let mut page = PageStore::read_page(&catalog, pid).unwrap();
        page.bytes_mut()[0] = 0xAB;
        PageStore::write_page(&catalog, &page).unwrap();

        let reread = PageStore::read_page(&catalog, pid).unwrap();
        assert_eq!(reread.bytes()[0], 0xAB);
    }
}
