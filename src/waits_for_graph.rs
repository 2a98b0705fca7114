use std::collections::{HashMap, HashSet};

use crate::lock_table::LockTable;
use crate::permission::LockMode;
use crate::transaction_id::TransactionId;

/// Directed graph built fresh from `LockTable` state immediately before a
/// transaction would block (spec.md §4.3). Not persisted across calls:
/// each `getPage` builds and discards its own graph.
pub struct WaitsForGraph {
    edges: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl WaitsForGraph {
    /// `V` = every transaction currently holding or wanting a lock.
    /// For each wanter, add an edge to every transaction it would have
    /// to wait for under the compatibility rules in spec.md §4.3.
    pub fn build(lock_table: &LockTable) -> Self {
        let mut edges: HashMap<TransactionId, HashSet<TransactionId>> = HashMap::new();
        for tid in lock_table.participants() {
            edges.entry(tid).or_default();
        }

        for (tid, pid, mode) in lock_table.wanters() {
            let blockers: Vec<TransactionId> = match mode {
                LockMode::Exclusive => lock_table.holders_of(pid),
                LockMode::Shared => lock_table.exclusive_holder(pid).into_iter().collect(),
            };
            for holder in blockers {
                if holder != tid {
                    edges.entry(tid).or_default().insert(holder);
                }
            }
        }

        Self { edges }
    }

    /// Iterative DFS with `marked`/`on_stack` sets (spec.md §4.3,
    /// §9 "Recursive DFS... convert to an explicit stack"). A back-edge
    /// to a vertex still `on_stack` is a cycle.
    pub fn has_cycle(&self) -> bool {
        let mut marked: HashSet<TransactionId> = HashSet::new();

        for &start in self.edges.keys() {
            if marked.contains(&start) {
                continue;
            }

            // Explicit DFS stack of (vertex, next-neighbor-index).
            let mut on_stack: HashSet<TransactionId> = HashSet::new();
            let mut stack: Vec<(TransactionId, Vec<TransactionId>, usize)> = Vec::new();

            marked.insert(start);
            on_stack.insert(start);
            stack.push((start, self.neighbors(start), 0));

            while let Some((node, neighbors, idx)) = stack.last_mut() {
                if *idx >= neighbors.len() {
                    on_stack.remove(node);
                    stack.pop();
                    continue;
                }
                let next = neighbors[*idx];
                *idx += 1;

                if on_stack.contains(&next) {
                    return true;
                }
                if !marked.contains(&next) {
                    marked.insert(next);
                    on_stack.insert(next);
                    let next_neighbors = self.neighbors(next);
                    stack.push((next, next_neighbors, 0));
                }
            }
        }

        false
    }

    fn neighbors(&self, tid: TransactionId) -> Vec<TransactionId> {
        self.edges
            .get(&tid)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_id::PageId;

    fn pid(n: u32) -> PageId {
        PageId::new(1, n)
    }

    #[test]
    fn no_cycle_when_single_wanter() {
        let mut lt = LockTable::new();
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        lt.acquire(t1, pid(0), LockMode::Exclusive);
        lt.record_want(t2, pid(0), LockMode::Shared);

        let graph = WaitsForGraph::build(&lt);
        assert!(!graph.has_cycle());
    }

    #[test]
    fn detects_two_cycle_deadlock() {
        // T1 holds A, wants B; T2 holds B, wants A.
        let mut lt = LockTable::new();
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        let a = pid(0);
        let b = pid(1);

        lt.acquire(t1, a, LockMode::Exclusive);
        lt.acquire(t2, b, LockMode::Exclusive);
        lt.record_want(t1, b, LockMode::Shared);
        lt.record_want(t2, a, LockMode::Shared);

        let graph = WaitsForGraph::build(&lt);
        assert!(graph.has_cycle());
    }

    #[test]
    fn chain_without_cycle_is_fine() {
        let mut lt = LockTable::new();
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        let t3 = TransactionId::new();
        let a = pid(0);
        let b = pid(1);

        lt.acquire(t1, a, LockMode::Exclusive);
        lt.acquire(t2, b, LockMode::Exclusive);
        lt.record_want(t2, a, LockMode::Shared);
        lt.record_want(t3, b, LockMode::Shared);

        let graph = WaitsForGraph::build(&lt);
        assert!(!graph.has_cycle());
    }
}
