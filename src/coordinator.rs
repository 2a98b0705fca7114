use std::sync::{Condvar, Mutex};

use log::{debug, error, warn};

use crate::catalog::Catalog;
use crate::error::CoreError;
use crate::lock_table::{AcquireOutcome, LockTable};
use crate::page_cache::{PageCache, PageHandle};
use crate::page_id::{PageId, TableId};
use crate::page_store::PageStore;
use crate::permission::Permission;
use crate::transaction_id::TransactionId;
use crate::types::{CoreResult, VoidResult};
use crate::waits_for_graph::WaitsForGraph;

struct CoordinatorState {
    catalog: Catalog,
    lock_table: LockTable,
    cache: PageCache,
}

/// Orchestrates `getPage`, `transactionComplete`, `insertTuple`,
/// `deleteTuple` over `LockTable`, `WaitsForGraph`, `PageCache`, and
/// `PageStore` under a single mutex (spec.md §4.5, §5). The only
/// suspension point in the core is the condition-variable wait inside
/// `get_page`; every other public operation runs to completion while
/// holding `state`.
pub struct TransactionCoordinator {
    state: Mutex<CoordinatorState>,
    grant: Condvar,
}

impl TransactionCoordinator {
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            state: Mutex::new(CoordinatorState {
                catalog: Catalog::new(),
                lock_table: LockTable::new(),
                cache: PageCache::new(cache_capacity),
            }),
            grant: Condvar::new(),
        }
    }

    /// Register a table file with the catalog (spec.md §6, consumed
    /// Catalog contract). Not itself part of the locking/caching
    /// protocol, so it only needs the mutex for the duration of the
    /// insert.
    pub fn register_table(&self, path: impl AsRef<std::path::Path>) -> CoreResult<TableId> {
        let mut state = self.state.lock().unwrap();
        state.catalog.register_table(path)
    }

    /// spec.md §4.5.1.
    pub fn get_page(&self, tid: TransactionId, pid: PageId, perm: Permission) -> CoreResult<PageHandle> {
        let mode = perm.to_lock_mode();
        let mut state = self.state.lock().unwrap();

        // Step 1: record the want.
        state.lock_table.record_want(tid, pid, mode);

        // Step 2: one-shot cycle check; the requester is always the
        // victim (spec.md §4.3).
        let graph = WaitsForGraph::build(&state.lock_table);
        if graph.has_cycle() {
            state.lock_table.clear_want(tid);
            let err = CoreError::aborted(tid);
            warn!("{}", err.with_backtrace());
            return Err(err);
        }

        // Step 3: acquire, blocking on the shared condition variable
        // while releasing `state` (spec.md §4.2, §5).
        loop {
            match state.lock_table.acquire(tid, pid, mode) {
                AcquireOutcome::Granted => break,
                AcquireOutcome::WouldBlock => {
                    debug!("{} blocked on {:?}, waiting for {}", tid, state.lock_table.want_of(tid), pid);
                    state = self.grant.wait(state).unwrap();
                }
            }
        }

        // Step 4: clear the want.
        state.lock_table.clear_want(tid);

        // Step 5: serve from cache, or fetch from the store (evicting
        // first if necessary).
        if let Some(handle) = state.cache.get(pid) {
            debug!("getPage {} for {}: cache hit", pid, tid);
            return Ok(handle);
        }

        let page = PageStore::read_page(&state.catalog, pid).map_err(log_storage_error)?;
        let handle: PageHandle = std::sync::Arc::new(std::sync::Mutex::new(page));
        state.cache.put(pid, handle.clone()).map_err(log_storage_error)?;
        Ok(handle)
    }

    /// Mark the resident page `pid` dirty with `tid`. Requires `tid` to
    /// already hold it *exclusively* (spec.md §3 invariant 3: a dirty
    /// page's `LockEntry` must be `Exclusive(tid)`) — a shared holder is
    /// not enough, since two transactions could then both "dirty" a page
    /// neither is allowed to write to.
    pub fn mark_dirty(&self, tid: TransactionId, pid: PageId) -> VoidResult {
        let mut state = self.state.lock().unwrap();
        if state.lock_table.exclusive_holder(pid) != Some(tid) {
            return Err(CoreError::invalid(format!(
                "{} cannot mark {} dirty without holding it exclusively",
                tid, pid
            )));
        }
        let handle = state
            .cache
            .peek(pid)
            .ok_or_else(|| CoreError::invalid(format!("{} is not cache-resident", pid)))?;
        handle.lock().unwrap().mark_dirty(tid);
        Ok(())
    }

    /// spec.md §4.5.4. Flush (commit) or revert (abort) every page
    /// `tid` dirtied, then release every lock it holds. Flush/revert
    /// completes before locks are released, so a subsequent transaction
    /// never observes partially-written state (spec.md §4.5.4, "Order
    /// matters").
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> VoidResult {
        let mut state = self.state.lock().unwrap();

        let held = state.lock_table.held_pages(tid);
        for pid in held {
            let handle = match state.cache.peek(pid) {
                Some(h) => h,
                None => continue,
            };
            let mut page = handle.lock().unwrap();
            if page.dirtier() != Some(tid) {
                continue;
            }

            if commit {
                debug!("committing {}: flushing {}", tid, pid);
                PageStore::write_page(&state.catalog, &page).map_err(log_storage_error)?;
                page.mark_clean();
            } else {
                debug!("aborting {}: reverting {}", tid, pid);
                let fresh = PageStore::read_page(&state.catalog, pid).map_err(log_storage_error)?;
                *page = fresh;
            }
        }

        state.lock_table.release_all(tid);
        self.grant.notify_all();
        Ok(())
    }

    /// spec.md §4.5.2. Delegates page-level work to `heap`, then marks
    /// every page it touched dirty with `tid`.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        heap: &dyn crate::heap::HeapFile,
        tuple: &[u8],
    ) -> VoidResult {
        let dirtied = heap.add_tuple(self, tid, tuple)?;
        for pid in dirtied {
            self.mark_dirty(tid, pid)?;
        }
        Ok(())
    }

    /// spec.md §4.5.3.
    pub fn delete_tuple(
        &self,
        tid: TransactionId,
        heap: &dyn crate::heap::HeapFile,
        record_id: crate::heap::RecordId,
    ) -> VoidResult {
        let pid = heap.delete_tuple(self, tid, record_id)?;
        self.mark_dirty(tid, pid)
    }

    /// Number of pages currently cache-resident; exposed so callers can
    /// monitor cache pressure without reaching into internals.
    pub fn cache_len(&self) -> usize {
        self.state.lock().unwrap().cache.len()
    }

    pub fn holds(&self, tid: TransactionId, pid: PageId) -> bool {
        self.state.lock().unwrap().lock_table.holds(tid, pid)
    }
}

/// Log a storage failure, with backtrace, at `error` level before the
/// caller propagates it (spec.md §7: storage failures log at `error`).
fn log_storage_error(err: CoreError) -> CoreError {
    error!("{}", err.with_backtrace());
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(table_id: u64, n: u32) -> PageId {
        PageId::new(table_id, n)
    }

    #[test]
    fn cache_len_tracks_resident_pages_up_to_capacity() {
        let coordinator = TransactionCoordinator::new(2);
        let table_id = 7u64;
        let tid = TransactionId::new();

        assert_eq!(coordinator.cache_len(), 0);
        coordinator.get_page(tid, pid(table_id, 0), Permission::ReadOnly).unwrap();
        assert_eq!(coordinator.cache_len(), 1);
        coordinator.get_page(tid, pid(table_id, 1), Permission::ReadOnly).unwrap();
        assert_eq!(coordinator.cache_len(), 2);
    }
}

