use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;

use crate::error::CoreError;
use crate::page::Page;
use crate::page_id::PageId;
use crate::types::CoreResult;

/// A cache-resident page. Pages are shared (`Arc<Mutex<Page>>`) rather
/// than owned by value so that a transaction holding an exclusive lock
/// can mutate its page in place and have the dirty flag visible
/// immediately to the eviction scan and to later `getPage` calls on the
/// same page (spec.md §8, "Read-your-writes"), without requiring the
/// coordinator's own mutex to stay held for the lifetime of the edit.
pub type PageHandle = Arc<Mutex<Page>>;

/// Capacity-bounded mapping from page identity to in-memory page, with
/// LRU recency ordering and NO-STEAL eviction (spec.md §4.4). Per the
/// design notes (spec.md §9), the intrusive doubly-linked list is
/// modelled as an ordered `Vec<PageId>` (LRU at the front, MRU at the
/// back) alongside the page store itself.
pub struct PageCache {
    capacity: usize,
    recency: Vec<PageId>,
    pages: HashMap<PageId, PageHandle>,
}

impl PageCache {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "page cache capacity must be positive");
        Self {
            capacity,
            recency: Vec::new(),
            pages: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_full(&self) -> bool {
        self.pages.len() >= self.capacity
    }

    pub fn contains(&self, pid: PageId) -> bool {
        self.pages.contains_key(&pid)
    }

    /// Move `pid` to the MRU end, if resident.
    fn touch(&mut self, pid: PageId) {
        if let Some(idx) = self.recency.iter().position(|p| *p == pid) {
            let p = self.recency.remove(idx);
            self.recency.push(p);
        }
    }

    /// If resident, move to MRU and return the handle.
    pub fn get(&mut self, pid: PageId) -> Option<PageHandle> {
        if self.pages.contains_key(&pid) {
            self.touch(pid);
            self.pages.get(&pid).cloned()
        } else {
            None
        }
    }

    /// Look up without disturbing recency order; used by commit/abort,
    /// which do not count as a page "use".
    pub fn peek(&self, pid: PageId) -> Option<PageHandle> {
        self.pages.get(&pid).cloned()
    }

    /// Insert `handle` for `pid` as MRU, evicting a clean victim first
    /// if the cache is already at capacity (spec.md §4.4). Fails with
    /// `CoreError::Storage` if every resident page is dirty.
    pub fn put(&mut self, pid: PageId, handle: PageHandle) -> CoreResult<()> {
        if self.pages.contains_key(&pid) {
            self.pages.insert(pid, handle);
            self.touch(pid);
            return Ok(());
        }

        if self.is_full() {
            self.evict_one()?;
        }

        self.pages.insert(pid, handle);
        self.recency.push(pid);
        Ok(())
    }

    pub fn remove(&mut self, pid: PageId) -> Option<PageHandle> {
        self.recency.retain(|p| *p != pid);
        self.pages.remove(&pid)
    }

    /// Scan LRU-to-MRU and evict the first clean page (spec.md §4.4,
    /// "NO-STEAL"). Dirty pages are never chosen: that is what lets
    /// abort discard a transaction's writes by re-reading from
    /// `PageStore` instead of undoing them.
    fn evict_one(&mut self) -> CoreResult<()> {
        let victim = self
            .recency
            .iter()
            .find(|pid| {
                let handle = self.pages.get(pid).expect("recency/pages out of sync");
                !handle.lock().unwrap().is_dirty()
            })
            .copied();

        match victim {
            Some(pid) => {
                debug!("evicting clean page {}", pid);
                self.remove(pid);
                Ok(())
            }
            None => Err(CoreError::storage(std::io::Error::new(
                std::io::ErrorKind::Other,
                "page cache eviction failed: every resident page is dirty",
            ))),
        }
    }
}
