use std::collections::{HashMap, HashSet};

use log::debug;

use crate::page_id::PageId;
use crate::permission::LockMode;
use crate::transaction_id::TransactionId;

/// Per-page lock state: either an exclusive holder, a set of shared
/// holders, or unlocked (spec.md §3, `LockEntry`). `Shared` is
/// canonicalised away (the map entry is removed) once its holder set is
/// empty, so "unlocked" is represented by the absence of a map entry.
#[derive(Debug, Clone)]
enum LockEntry {
    Shared(HashSet<TransactionId>),
    Exclusive(TransactionId),
}

/// Outcome of a non-blocking attempt to acquire a lock.
pub enum AcquireOutcome {
    Granted,
    WouldBlock,
}

/// Per-page lock state plus per-transaction holds/wants maps (spec.md
/// §2 item 2, §3, §4.2). This type holds no internal synchronization of
/// its own: it is manipulated by `TransactionCoordinator` while the
/// coordinator's single mutex is held, and the actual suspension (when
/// `acquire` would block) happens in the coordinator via its condition
/// variable (spec.md §4.5, §5).
#[derive(Debug, Default)]
pub struct LockTable {
    entries: HashMap<PageId, LockEntry>,
    holds: HashMap<TransactionId, HashSet<(PageId, LockMode)>>,
    wants: HashMap<TransactionId, (PageId, LockMode)>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_want(&mut self, tid: TransactionId, pid: PageId, mode: LockMode) {
        self.wants.insert(tid, (pid, mode));
    }

    pub fn clear_want(&mut self, tid: TransactionId) {
        self.wants.remove(&tid);
    }

    pub fn want_of(&self, tid: TransactionId) -> Option<(PageId, LockMode)> {
        self.wants.get(&tid).copied()
    }

    pub fn wanters(&self) -> impl Iterator<Item = (TransactionId, PageId, LockMode)> + '_ {
        self.wants.iter().map(|(&tid, &(pid, mode))| (tid, pid, mode))
    }

    pub fn holders_of(&self, pid: PageId) -> Vec<TransactionId> {
        match self.entries.get(&pid) {
            Some(LockEntry::Exclusive(tid)) => vec![*tid],
            Some(LockEntry::Shared(tids)) => tids.iter().copied().collect(),
            None => Vec::new(),
        }
    }

    pub fn exclusive_holder(&self, pid: PageId) -> Option<TransactionId> {
        match self.entries.get(&pid) {
            Some(LockEntry::Exclusive(tid)) => Some(*tid),
            _ => None,
        }
    }

    /// All transactions participating in lock state, as holder or
    /// wanter, for waits-for-graph construction (spec.md §4.3).
    pub fn participants(&self) -> HashSet<TransactionId> {
        let mut out: HashSet<TransactionId> = self.holds.keys().copied().collect();
        out.extend(self.wants.keys().copied());
        out
    }

    /// Every page `tid` currently holds a lock on (spec.md §4.5.4 needs
    /// this to flush/revert before releasing).
    pub fn held_pages(&self, tid: TransactionId) -> Vec<PageId> {
        self.holds
            .get(&tid)
            .map(|set| set.iter().map(|&(pid, _)| pid).collect())
            .unwrap_or_default()
    }

    pub fn holds(&self, tid: TransactionId, pid: PageId) -> bool {
        match self.entries.get(&pid) {
            Some(LockEntry::Exclusive(holder)) => *holder == tid,
            Some(LockEntry::Shared(tids)) => tids.contains(&tid),
            None => false,
        }
    }

    fn record_hold(&mut self, tid: TransactionId, pid: PageId, mode: LockMode) {
        self.holds.entry(tid).or_default().insert((pid, mode));
    }

    fn drop_hold_record(&mut self, tid: TransactionId, pid: PageId) {
        if let Some(set) = self.holds.get_mut(&tid) {
            set.retain(|&(p, _)| p != pid);
            if set.is_empty() {
                self.holds.remove(&tid);
            }
        }
    }

    /// Attempt to acquire `mode` on `pid` for `tid` without blocking.
    /// Handles reentrance and in-place upgrade (spec.md §4.2). Cross-
    /// transaction grants go through `LockMode::compatible_with`;
    /// same-transaction reentrance goes through `LockMode::satisfies`.
    pub fn acquire(&mut self, tid: TransactionId, pid: PageId, mode: LockMode) -> AcquireOutcome {
        match self.entries.get(&pid) {
            None => {
                let entry = match mode {
                    LockMode::Shared => LockEntry::Shared(HashSet::from([tid])),
                    LockMode::Exclusive => LockEntry::Exclusive(tid),
                };
                self.entries.insert(pid, entry);
                self.record_hold(tid, pid, mode);
                AcquireOutcome::Granted
            }
            Some(LockEntry::Exclusive(holder)) => {
                if *holder == tid {
                    // Reentrant: Exclusive satisfies any requested mode.
                    debug_assert!(LockMode::Exclusive.satisfies(mode));
                    AcquireOutcome::Granted
                } else {
                    AcquireOutcome::WouldBlock
                }
            }
            Some(LockEntry::Shared(holders)) => {
                if holders.contains(&tid) && LockMode::Shared.satisfies(mode) {
                    // Reentrant: already hold at least the requested mode.
                    AcquireOutcome::Granted
                } else if mode == LockMode::Exclusive && holders.contains(&tid) && holders.len() == 1 {
                    debug!("upgrading {:?} on {} to exclusive", tid, pid);
                    self.entries.insert(pid, LockEntry::Exclusive(tid));
                    self.drop_hold_record(tid, pid);
                    self.record_hold(tid, pid, LockMode::Exclusive);
                    AcquireOutcome::Granted
                } else if LockMode::Shared.compatible_with(mode) {
                    self.entries
                        .get_mut(&pid)
                        .and_then(|e| match e {
                            LockEntry::Shared(set) => {
                                set.insert(tid);
                                Some(())
                            }
                            _ => None,
                        });
                    self.record_hold(tid, pid, mode);
                    AcquireOutcome::Granted
                } else {
                    AcquireOutcome::WouldBlock
                }
            }
        }
    }

    /// Release `tid`'s lock on `pid`, whichever role it holds. No-op if
    /// `tid` does not hold the page (spec.md §4.2).
    pub fn release(&mut self, tid: TransactionId, pid: PageId) {
        let became_unlocked = match self.entries.get_mut(&pid) {
            Some(LockEntry::Exclusive(holder)) if *holder == tid => true,
            Some(LockEntry::Shared(holders)) => {
                holders.remove(&tid);
                holders.is_empty()
            }
            _ => false,
        };
        if became_unlocked {
            self.entries.remove(&pid);
        }
        self.drop_hold_record(tid, pid);
    }

    /// Release every page `tid` holds, returning the pages that were
    /// released (spec.md §4.2, `releaseAll`).
    pub fn release_all(&mut self, tid: TransactionId) -> Vec<PageId> {
        let held: Vec<PageId> = self
            .holds
            .get(&tid)
            .map(|s| s.iter().map(|&(pid, _)| pid).collect())
            .unwrap_or_default();
        for &pid in &held {
            self.release(tid, pid);
        }
        self.holds.remove(&tid);
        held
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u32) -> PageId {
        PageId::new(1, n)
    }

    #[test]
    fn shared_locks_coexist() {
        let mut lt = LockTable::new();
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        let p = pid(0);

        assert!(matches!(lt.acquire(t1, p, LockMode::Shared), AcquireOutcome::Granted));
        assert!(matches!(lt.acquire(t2, p, LockMode::Shared), AcquireOutcome::Granted));
        assert!(lt.holds(t1, p));
        assert!(lt.holds(t2, p));
    }

    #[test]
    fn exclusive_blocks_shared_and_exclusive() {
        let mut lt = LockTable::new();
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        let p = pid(0);

        assert!(matches!(lt.acquire(t1, p, LockMode::Exclusive), AcquireOutcome::Granted));
        assert!(matches!(lt.acquire(t2, p, LockMode::Shared), AcquireOutcome::WouldBlock));
        assert!(matches!(lt.acquire(t2, p, LockMode::Exclusive), AcquireOutcome::WouldBlock));
    }

    #[test]
    fn sole_shared_holder_upgrades_in_place() {
        let mut lt = LockTable::new();
        let t1 = TransactionId::new();
        let p = pid(0);

        assert!(matches!(lt.acquire(t1, p, LockMode::Shared), AcquireOutcome::Granted));
        assert!(matches!(lt.acquire(t1, p, LockMode::Exclusive), AcquireOutcome::Granted));
        assert_eq!(lt.exclusive_holder(p), Some(t1));
    }

    #[test]
    fn upgrade_blocks_with_other_shared_holders() {
        let mut lt = LockTable::new();
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        let p = pid(0);

        lt.acquire(t1, p, LockMode::Shared);
        lt.acquire(t2, p, LockMode::Shared);
        assert!(matches!(lt.acquire(t1, p, LockMode::Exclusive), AcquireOutcome::WouldBlock));
    }

    #[test]
    fn release_all_frees_every_held_page() {
        let mut lt = LockTable::new();
        let t1 = TransactionId::new();
        let p0 = pid(0);
        let p1 = pid(1);

        lt.acquire(t1, p0, LockMode::Shared);
        lt.acquire(t1, p1, LockMode::Exclusive);
        let released = lt.release_all(t1);
        assert_eq!(released.len(), 2);
        assert!(!lt.holds(t1, p0));
        assert!(!lt.holds(t1, p1));
    }

    #[test]
    fn release_on_unheld_page_is_noop() {
        let mut lt = LockTable::new();
        let t1 = TransactionId::new();
        lt.release(t1, pid(5));
    }
}
