use crate::coordinator::TransactionCoordinator;
use crate::error::CoreError;
use crate::page_id::{PageId, TableId};
use crate::permission::Permission;
use crate::transaction_id::TransactionId;
use crate::page::PAGE_SIZE;
use crate::types::CoreResult;

/// Identifies one tuple slot within a heap file (consumed external
/// contract, spec.md §6: "the format of the returned byte slices ...
/// is defined by the heap-file layer, not by the core").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u32,
}

/// External contract `TransactionCoordinator::insert_tuple` and
/// `delete_tuple` delegate to (spec.md §4.5.2, §4.5.3). The core only
/// needs page identities back; how tuples are laid out within a page is
/// entirely this layer's business.
pub trait HeapFile {
    /// Insert `tuple`, returning every page the insert touched (so the
    /// caller can mark them dirty).
    fn add_tuple(
        &self,
        coordinator: &TransactionCoordinator,
        tid: TransactionId,
        tuple: &[u8],
    ) -> CoreResult<Vec<PageId>>;

    /// Delete the tuple at `record_id`, returning the page it lived on.
    fn delete_tuple(
        &self,
        coordinator: &TransactionCoordinator,
        tid: TransactionId,
        record_id: RecordId,
    ) -> CoreResult<PageId>;
}

fn bit_at(bytes: &[u8], idx: usize) -> bool {
    bytes[idx / 8] & (1 << (idx % 8)) != 0
}

fn set_bit(bytes: &mut [u8], idx: usize, value: bool) {
    if value {
        bytes[idx / 8] |= 1 << (idx % 8);
    } else {
        bytes[idx / 8] &= !(1 << (idx % 8));
    }
}

/// Fixed-width slotted heap page with a bitmap header, one bit per slot
/// (present/absent), grounded on `HeapTable`/`create_random_heap_table`
/// in the teacher's `src/table.rs`: a ceil-divided header followed by
/// fixed-width rows and zero padding. Not part of the specified core
/// (spec.md §1, §6) — this exists only so `insertTuple`/`deleteTuple`
/// have a concrete page format to delegate to, and so the integration
/// tests in §8 have tuples to write.
pub struct SlottedHeapFile {
    table_id: TableId,
    tuple_size: usize,
    slots_per_page: usize,
    header_bytes: usize,
}

impl SlottedHeapFile {
    pub fn new(table_id: TableId, tuple_size: usize) -> Self {
        assert!(tuple_size > 0, "tuple size must be positive");
        let slots_per_page = (PAGE_SIZE * 8) / (tuple_size * 8 + 1);
        assert!(slots_per_page > 0, "tuple size too large to fit any slot in a page");
        let header_bytes = (slots_per_page + 7) / 8;
        Self {
            table_id,
            tuple_size,
            slots_per_page,
            header_bytes,
        }
    }

    fn slot_offset(&self, slot: usize) -> usize {
        self.header_bytes + slot * self.tuple_size
    }
}

impl HeapFile for SlottedHeapFile {
    fn add_tuple(
        &self,
        coordinator: &TransactionCoordinator,
        tid: TransactionId,
        tuple: &[u8],
    ) -> CoreResult<Vec<PageId>> {
        if tuple.len() != self.tuple_size {
            return Err(CoreError::invalid(format!(
                "tuple is {} bytes, expected {}",
                tuple.len(),
                self.tuple_size
            )));
        }

        let mut page_no = 0u32;
        loop {
            let pid = PageId::new(self.table_id, page_no);
            let handle = coordinator.get_page(tid, pid, Permission::ReadWrite)?;
            let mut page = handle.lock().unwrap();

            let free_slot = (0..self.slots_per_page)
                .find(|&slot| !bit_at(page.bytes(), slot));

            if let Some(slot) = free_slot {
                set_bit(page.bytes_mut(), slot, true);
                let offset = self.slot_offset(slot);
                page.bytes_mut()[offset..offset + self.tuple_size].copy_from_slice(tuple);
                return Ok(vec![pid]);
            }

            page_no += 1;
        }
    }

    fn delete_tuple(
        &self,
        coordinator: &TransactionCoordinator,
        tid: TransactionId,
        record_id: RecordId,
    ) -> CoreResult<PageId> {
        if record_id.page_id.table_id != self.table_id {
            return Err(CoreError::invalid(format!(
                "record {:?} does not belong to table {:x}",
                record_id, self.table_id
            )));
        }
        let handle = coordinator.get_page(tid, record_id.page_id, Permission::ReadWrite)?;
        let mut page = handle.lock().unwrap();
        set_bit(page.bytes_mut(), record_id.slot as usize, false);
        Ok(record_id.page_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct TempPath(PathBuf);

    impl TempPath {
        fn new(name: &str) -> Self {
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

    #[test]
    fn insert_then_delete_round_trips() {
        let tmp = TempPath::new("heap_roundtrip");
        let coordinator = TransactionCoordinator::new(8);
        let table_id = coordinator.register_table(&tmp.0).unwrap();
        let heap = SlottedHeapFile::new(table_id, 16);

        let tid = TransactionId::new();
        let tuple = [7u8; 16];
        let dirtied = heap.add_tuple(&coordinator, tid, &tuple).unwrap();
        assert_eq!(dirtied.len(), 1);
        coordinator.transaction_complete(tid, true).unwrap();

        let tid2 = TransactionId::new();
        let pid = dirtied[0];
        let record_id = RecordId { page_id: pid, slot: 0 };
        let victim = heap.delete_tuple(&coordinator, tid2, record_id).unwrap();
        assert_eq!(victim, pid);
        coordinator.transaction_complete(tid2, true).unwrap();
    }

    #[test]
    fn fills_page_then_spills_to_next() {
        let tmp = TempPath::new("heap_spill");
        let coordinator = TransactionCoordinator::new(64);
        let table_id = coordinator.register_table(&tmp.0).unwrap();
        let heap = SlottedHeapFile::new(table_id, 4000);
        // a tuple this large leaves room for exactly one slot per page.

        let tid = TransactionId::new();
        let first = heap.add_tuple(&coordinator, tid, &[1u8; 4000]).unwrap();
        let second = heap.add_tuple(&coordinator, tid, &[2u8; 4000]).unwrap();
        assert_ne!(first[0], second[0]);
    }
}
